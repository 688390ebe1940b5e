use crate::detection::domain::face_region::FaceRegion;
use crate::shared::error::BoxError;
use crate::shared::frame::Frame;

use super::donor_face::DonorFace;

/// Opaque learned face-swap capability.
///
/// Any error is treated by the chain as "unavailable" and escalates to the
/// geometric strategy. The returned frame must match the input's layout.
pub trait NeuralSwap: Send + Sync {
    fn apply(
        &self,
        frame: &Frame,
        target: &FaceRegion,
        donor: &DonorFace,
    ) -> Result<Frame, BoxError>;
}
