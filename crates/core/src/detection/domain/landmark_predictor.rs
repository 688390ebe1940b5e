use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

use super::face_detector::Detection;
use super::landmark_set::LandmarkSet;

/// Regresses the canonical landmark layout inside a detected face box.
pub trait LandmarkPredictor: Send + Sync {
    fn predict(&self, frame: &Frame, face: &Detection) -> Result<LandmarkSet, BoxError>;
}
