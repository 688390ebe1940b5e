pub mod donor_loader;
pub mod onnx_face_swapper;
