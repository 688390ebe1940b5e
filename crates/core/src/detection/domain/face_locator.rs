use crate::shared::frame::Frame;

use super::face_detector::FaceDetector;
use super::landmark_predictor::LandmarkPredictor;
use super::landmark_set::LandmarkSet;

/// Finds the face to replace in a frame.
///
/// Returns an empty set when no face is found. That is a normal outcome,
/// never an error.
pub trait FaceLocator: Send + Sync {
    fn locate(&self, frame: &Frame) -> LandmarkSet;
}

/// Detector + landmark regressor pair. Picks the largest detection.
pub struct LandmarkFaceLocator {
    detector: Box<dyn FaceDetector>,
    predictor: Box<dyn LandmarkPredictor>,
    multiscale: bool,
}

impl LandmarkFaceLocator {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        predictor: Box<dyn LandmarkPredictor>,
        multiscale: bool,
    ) -> Self {
        Self {
            detector,
            predictor,
            multiscale,
        }
    }
}

impl FaceLocator for LandmarkFaceLocator {
    fn locate(&self, frame: &Frame) -> LandmarkSet {
        let detections = match self.detector.detect(frame, self.multiscale) {
            Ok(d) => d,
            Err(e) => {
                log::warn!("Face detection failed on frame {}: {e}", frame.index());
                return LandmarkSet::empty();
            }
        };
        let Some(largest) = detections.iter().max_by(|a, b| {
            a.area()
                .partial_cmp(&b.area())
                .unwrap_or(std::cmp::Ordering::Equal)
        }) else {
            log::debug!("No face in frame {}", frame.index());
            return LandmarkSet::empty();
        };
        match self.predictor.predict(frame, largest) {
            Ok(set) => set,
            Err(e) => {
                log::warn!("Landmark prediction failed on frame {}: {e}", frame.index());
                LandmarkSet::empty()
            }
        }
    }
}
