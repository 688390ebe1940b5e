//! Learned face swap through two ONNX models: an identity encoder that
//! turns the donor face into an embedding, and a generator that redraws an
//! aligned target crop with that identity.
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use crate::compositing::affine::{warp_affine, AffineTransform, Border, Point};
use crate::compositing::gaussian::gaussian_blur;
use crate::detection::domain::face_region::FaceRegion;
use crate::detection::infrastructure::execution_provider::{load_session, square_input_size};
use crate::shared::error::BoxError;
use crate::shared::frame::Frame;
use crate::swapping::domain::donor_face::DonorFace;
use crate::swapping::domain::neural_swap::NeuralSwap;

/// Five-point template (eyes, nose tip, mouth corners) for a 112 px crop.
const REFERENCE_LANDMARKS_112: [Point; 5] = [
    (38.2946, 51.6963),
    (73.5318, 51.5014),
    (56.0252, 71.7366),
    (41.5493, 92.3655),
    (70.7299, 92.2041),
];

const EMBEDDING_INPUT_SIZE: u32 = 112;
const DEFAULT_SWAP_INPUT_SIZE: u32 = 128;
const EMBEDDING_MEAN: f32 = 127.5;
const EMBEDDING_STD: f32 = 127.5;

/// Share of the generated crop, measured in from each edge, that fades out
/// when pasted back.
const PASTE_MARGIN_FRACTION: f64 = 0.08;

/// ONNX implementation of [`NeuralSwap`].
///
/// One instance serves one donor: the identity embedding is computed on
/// the first call and reused for every later frame.
pub struct OnnxFaceSwapper {
    swap_session: Mutex<ort::session::Session>,
    embedding_session: Mutex<ort::session::Session>,
    swap_size: u32,
    donor_embedding: OnceLock<Vec<f32>>,
}

impl OnnxFaceSwapper {
    pub fn new(
        swap_model: &Path,
        embedding_model: &Path,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let swap_session = load_session(swap_model)?;
        let embedding_session = load_session(embedding_model)?;
        let swap_size = square_input_size(&swap_session).unwrap_or(DEFAULT_SWAP_INPUT_SIZE);
        log::info!("Neural swap ready ({swap_size} px crops)");
        Ok(Self {
            swap_session: Mutex::new(swap_session),
            embedding_session: Mutex::new(embedding_session),
            swap_size,
            donor_embedding: OnceLock::new(),
        })
    }

    fn embedding(&self, donor: &DonorFace) -> Result<&[f32], BoxError> {
        if let Some(cached) = self.donor_embedding.get() {
            return Ok(cached.as_slice());
        }
        let computed = self.compute_embedding(donor)?;
        Ok(self.donor_embedding.get_or_init(|| computed).as_slice())
    }

    fn compute_embedding(&self, donor: &DonorFace) -> Result<Vec<f32>, BoxError> {
        let keypoints = donor
            .region()
            .and_then(|r| r.keypoints)
            .ok_or("donor landmarks lack the five alignment points")?;
        let align = alignment(&keypoints, EMBEDDING_INPUT_SIZE)
            .ok_or("donor keypoints are degenerate")?;
        let crop = warp_affine(
            donor.frame(),
            &align,
            EMBEDDING_INPUT_SIZE,
            EMBEDDING_INPUT_SIZE,
            Border::Constant,
        );
        let tensor = to_nchw(&crop, EMBEDDING_MEAN, EMBEDDING_STD);
        let input_value = ort::value::Tensor::from_array(tensor)?;

        let mut session = self
            .embedding_session
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input_value])?;
        let output = outputs[0].try_extract_array::<f32>()?;
        let values = output.as_slice().ok_or("Cannot get embedding slice")?;
        l2_normalize(values).ok_or_else(|| "donor embedding is all zeros".into())
    }
}

impl NeuralSwap for OnnxFaceSwapper {
    fn apply(
        &self,
        frame: &Frame,
        target: &FaceRegion,
        donor: &DonorFace,
    ) -> Result<Frame, BoxError> {
        let keypoints = target
            .keypoints
            .ok_or("target landmarks lack the five alignment points")?;
        let align =
            alignment(&keypoints, self.swap_size).ok_or("target keypoints are degenerate")?;
        let embedding = self.embedding(donor)?;

        let crop = warp_affine(frame, &align, self.swap_size, self.swap_size, Border::Constant);
        let crop_value = ort::value::Tensor::from_array(to_nchw(&crop, 0.0, 255.0))?;
        let latent = ndarray::Array2::from_shape_vec((1, embedding.len()), embedding.to_vec())?;
        let latent_value = ort::value::Tensor::from_array(latent)?;

        let swapped = {
            let mut session = self
                .swap_session
                .lock()
                .map_err(|e| format!("Lock poisoned: {e}"))?;
            let outputs = session.run(ort::inputs![crop_value, latent_value])?;
            let output = outputs[0].try_extract_array::<f32>()?;
            let values = output.as_slice().ok_or("Cannot get swap output slice")?;
            from_nchw(values, self.swap_size, frame.index())?
        };

        paste_back(frame, &swapped, &align)
    }
}

/// Similarity transform taking frame keypoints onto the template scaled to
/// a `size` px crop.
fn alignment(keypoints: &[Point; 5], size: u32) -> Option<AffineTransform> {
    let scale = size as f64 / EMBEDDING_INPUT_SIZE as f64;
    let reference: Vec<Point> = REFERENCE_LANDMARKS_112
        .iter()
        .map(|&(x, y)| (x * scale, y * scale))
        .collect();
    AffineTransform::similarity(keypoints, &reference)
}

/// RGB frame → `[1, 3, H, W]` tensor of `(v - mean) / std`.
fn to_nchw(frame: &Frame, mean: f32, std: f32) -> ndarray::Array4<f32> {
    let (h, w) = (frame.height() as usize, frame.width() as usize);
    let src = frame.as_ndarray();
    ndarray::Array4::from_shape_fn((1, 3, h, w), |(_, c, y, x)| {
        (src[[y, x, c]] as f32 - mean) / std
    })
}

/// `[1, 3, size, size]` values in [0, 1] → RGB frame.
fn from_nchw(values: &[f32], size: u32, index: usize) -> Result<Frame, BoxError> {
    let plane = size as usize * size as usize;
    if values.len() != 3 * plane {
        return Err(format!(
            "swap model returned {} values, expected {}",
            values.len(),
            3 * plane
        )
        .into());
    }
    let mut data = vec![0u8; 3 * plane];
    for (i, px) in data.chunks_exact_mut(3).enumerate() {
        for (c, slot) in px.iter_mut().enumerate() {
            *slot = (values[c * plane + i] * 255.0).round().clamp(0.0, 255.0) as u8;
        }
    }
    Ok(Frame::new(data, size, size, 3, index))
}

fn l2_normalize(values: &[f32]) -> Option<Vec<f32>> {
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    (norm > f32::EPSILON).then(|| values.iter().map(|v| v / norm).collect())
}

/// Warp the generated crop back into frame space and blend it in through a
/// mask whose edge fades out over the outer margin of the crop.
fn paste_back(frame: &Frame, swapped: &Frame, align: &AffineTransform) -> Result<Frame, BoxError> {
    let inverse = align.inverse().ok_or("alignment is not invertible")?;
    let (fw, fh) = (frame.width(), frame.height());
    let size = swapped.width();

    let margin = ((size as f64 * PASTE_MARGIN_FRACTION).round() as u32).max(1);
    let mut crop_mask = vec![0u8; size as usize * size as usize];
    for y in margin..size.saturating_sub(margin) {
        let row = y as usize * size as usize;
        crop_mask[row + margin as usize..row + (size - margin) as usize].fill(255);
    }
    let crop_mask = Frame::new(crop_mask, size, size, 1, 0);

    let warped = warp_affine(swapped, &inverse, fw, fh, Border::Constant);
    let mut alpha = warp_affine(&crop_mask, &inverse, fw, fh, Border::Constant);
    let kernel = 2 * margin as usize + 1;
    gaussian_blur(alpha.data_mut(), fw as usize, fh as usize, 1, kernel);

    let mut out = frame.clone();
    for ((dst, src), &a) in out
        .data_mut()
        .chunks_exact_mut(3)
        .zip(warped.data().chunks_exact(3))
        .zip(alpha.data())
    {
        if a == 0 {
            continue;
        }
        let a = a as f32 / 255.0;
        for c in 0..3 {
            dst[c] = (src[c] as f32 * a + dst[c] as f32 * (1.0 - a)).round() as u8;
        }
    }
    Ok(out)
}
