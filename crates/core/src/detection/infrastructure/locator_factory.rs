use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_locator::{FaceLocator, LandmarkFaceLocator};
use crate::shared::swap_config::DetectorKind;

use super::onnx_blazeface_detector::{self, OnnxBlazefaceDetector};
use super::onnx_landmark_predictor::OnnxLandmarkPredictor;
use super::onnx_yolo_detector::{self, OnnxYoloDetector};

/// Model files needed to build a locator.
#[derive(Clone, Copy, Debug)]
pub struct LocatorModels<'a> {
    pub detector: &'a Path,
    pub landmarks: &'a Path,
}

/// Builds the face locator for the configured provider.
pub fn create_locator(
    kind: DetectorKind,
    models: LocatorModels<'_>,
    multiscale: bool,
) -> Result<Box<dyn FaceLocator>, Box<dyn std::error::Error>> {
    let detector: Box<dyn FaceDetector> = match kind {
        DetectorKind::Fine => Box::new(OnnxYoloDetector::new(
            models.detector,
            onnx_yolo_detector::DEFAULT_CONFIDENCE,
        )?),
        DetectorKind::Coarse => Box::new(OnnxBlazefaceDetector::new(
            models.detector,
            onnx_blazeface_detector::DEFAULT_CONFIDENCE,
        )?),
    };
    let predictor = OnnxLandmarkPredictor::new(models.landmarks)?;
    log::info!("Using {kind} face detector (multiscale={multiscale})");
    Ok(Box::new(LandmarkFaceLocator::new(
        detector,
        Box::new(predictor),
        multiscale,
    )))
}
