use crate::detection::domain::face_region::FaceRegion;
use crate::detection::domain::landmark_set::LandmarkSet;
use crate::shared::frame::Frame;

/// The identity pasted into every frame: a still image and its landmarks.
///
/// Loaded once per job and shared read-only (behind an `Arc`) by every
/// worker.
#[derive(Clone, Debug)]
pub struct DonorFace {
    frame: Frame,
    landmarks: LandmarkSet,
}

impl DonorFace {
    pub fn new(frame: Frame, landmarks: LandmarkSet) -> Self {
        Self { frame, landmarks }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn landmarks(&self) -> &LandmarkSet {
        &self.landmarks
    }

    pub fn region(&self) -> Option<FaceRegion> {
        FaceRegion::from_landmarks(&self.landmarks)
    }
}
