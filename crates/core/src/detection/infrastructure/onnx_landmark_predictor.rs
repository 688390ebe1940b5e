/// 68-point facial landmark regressor using ONNX Runtime via `ort`.
///
/// The face box is expanded to a square with a 10 % margin, resampled to
/// the model input, and the model's normalized coordinates are mapped back
/// to frame space.
use std::path::Path;
use std::sync::Mutex;

use crate::detection::domain::face_detector::Detection;
use crate::detection::domain::landmark_predictor::LandmarkPredictor;
use crate::detection::domain::landmark_set::{LandmarkSet, CANONICAL_POINTS};
use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

use super::execution_provider::{load_session, square_input_size};

const DEFAULT_INPUT_SIZE: u32 = 112;

/// Margin added on every side of the detected box.
const CROP_MARGIN: f64 = 0.1;

pub struct OnnxLandmarkPredictor {
    session: Mutex<ort::session::Session>,
    input_size: u32,
}

/// Square frame-space window the model sees.
#[derive(Clone, Copy, Debug, PartialEq)]
struct CropWindow {
    left: f64,
    top: f64,
    side: f64,
}

impl OnnxLandmarkPredictor {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let session = load_session(model_path)?;
        let input_size = square_input_size(&session).unwrap_or(DEFAULT_INPUT_SIZE);
        Ok(Self {
            session: Mutex::new(session),
            input_size,
        })
    }
}

impl LandmarkPredictor for OnnxLandmarkPredictor {
    fn predict(&self, frame: &Frame, face: &Detection) -> Result<LandmarkSet, BoxError> {
        let window = crop_window(face);
        if window.side <= 0.0 {
            return Ok(LandmarkSet::empty());
        }
        let tensor = preprocess(frame, window, self.input_size);
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let mut session = self
            .session
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input_value])?;
        let output = outputs[0].try_extract_array::<f32>()?;
        let values = output.as_slice().ok_or("Cannot get landmark slice")?;
        to_landmarks(values, window)
    }
}

fn crop_window(face: &Detection) -> CropWindow {
    let side = face.width().max(face.height()) * (1.0 + 2.0 * CROP_MARGIN);
    let cx = (face.x1 + face.x2) / 2.0;
    let cy = (face.y1 + face.y2) / 2.0;
    CropWindow {
        left: cx - side / 2.0,
        top: cy - side / 2.0,
        side,
    }
}

/// Sample the window into a `[1, 3, size, size]` tensor in [0,1].
/// Samples falling outside the frame are zero.
fn preprocess(frame: &Frame, window: CropWindow, size: u32) -> ndarray::Array4<f32> {
    let s = size as usize;
    let src = frame.as_ndarray();
    let (fw, fh) = (frame.width() as i64, frame.height() as i64);
    let step = window.side / s as f64;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));
    for y in 0..s {
        let sy = (window.top + (y as f64 + 0.5) * step).floor() as i64;
        if sy < 0 || sy >= fh {
            continue;
        }
        for x in 0..s {
            let sx = (window.left + (x as f64 + 0.5) * step).floor() as i64;
            if sx < 0 || sx >= fw {
                continue;
            }
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[sy as usize, sx as usize, c]] as f32 / 255.0;
            }
        }
    }
    tensor
}

fn to_landmarks(values: &[f32], window: CropWindow) -> Result<LandmarkSet, BoxError> {
    if values.len() != CANONICAL_POINTS * 2 {
        return Err(format!(
            "landmark model returned {} values, expected {}",
            values.len(),
            CANONICAL_POINTS * 2
        )
        .into());
    }
    let points = values
        .chunks_exact(2)
        .map(|p| {
            (
                window.left + p[0] as f64 * window.side,
                window.top + p[1] as f64 * window.side,
            )
        })
        .collect();
    Ok(LandmarkSet::new(points))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn det(x1: f64, y1: f64, x2: f64, y2: f64) -> Detection {
        Detection {
            x1,
            y1,
            x2,
            y2,
            score: 1.0,
        }
    }

    #[test]
    fn test_crop_window_is_expanded_square() {
        let w = crop_window(&det(10.0, 20.0, 60.0, 120.0));
        assert_relative_eq!(w.side, 120.0);
        assert_relative_eq!(w.left, -25.0);
        assert_relative_eq!(w.top, 10.0);
    }

    #[test]
    fn test_preprocess_pads_outside_frame_with_zero() {
        let frame = Frame::filled(20, 20, [255, 255, 255], 0);
        let window = CropWindow {
            left: -20.0,
            top: 0.0,
            side: 40.0,
        };
        let t = preprocess(&frame, window, 8);
        assert_eq!(t.shape(), &[1, 3, 8, 8]);
        assert_eq!(t[[0, 0, 2, 0]], 0.0);
        assert!((t[[0, 0, 2, 7]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_to_landmarks_maps_into_window() {
        let mut values = vec![0.0f32; CANONICAL_POINTS * 2];
        values[0] = 0.5;
        values[1] = 0.25;
        let window = CropWindow {
            left: 10.0,
            top: 20.0,
            side: 100.0,
        };
        let set = to_landmarks(&values, window).unwrap();
        assert_eq!(set.len(), CANONICAL_POINTS);
        assert_relative_eq!(set.points()[0].0, 60.0);
        assert_relative_eq!(set.points()[0].1, 45.0);
        assert_eq!(set.points()[1], (10.0, 20.0));
    }

    #[test]
    fn test_to_landmarks_rejects_wrong_length() {
        let window = CropWindow {
            left: 0.0,
            top: 0.0,
            side: 1.0,
        };
        assert!(to_landmarks(&[0.0; 10], window).is_err());
    }
}
