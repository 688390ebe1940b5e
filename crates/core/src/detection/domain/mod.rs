pub mod face_detector;
pub mod face_locator;
pub mod face_region;
pub mod landmark_predictor;
pub mod landmark_set;
