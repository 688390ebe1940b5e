use std::path::Path;

use crate::compositing::resize::limit_height;
use crate::detection::domain::face_locator::FaceLocator;
use crate::shared::error::JobError;
use crate::swapping::domain::donor_face::DonorFace;
use crate::video::infrastructure::image_file_reader::read_image;

/// Decode the donor image, cap its height and locate its face.
///
/// Runs before any video is opened so a bad donor fails the job up front.
pub fn load_donor(
    path: &Path,
    locator: &dyn FaceLocator,
    max_height: u32,
) -> Result<DonorFace, JobError> {
    let image = read_image(path).map_err(|e| JobError::DonorUnreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let image = limit_height(&image, max_height);

    let landmarks = locator.locate(&image);
    if landmarks.is_empty() {
        return Err(JobError::DonorNoFace {
            path: path.to_path_buf(),
        });
    }

    log::info!(
        "Donor {}: {}x{}, {} landmarks",
        path.display(),
        image.width(),
        image.height(),
        landmarks.len()
    );
    Ok(DonorFace::new(image, landmarks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::landmark_set::LandmarkSet;
    use crate::shared::frame::Frame;
    use std::sync::Mutex;

    /// Returns fixed landmarks and records the size of every frame it saw.
    struct RecordingLocator {
        landmarks: LandmarkSet,
        seen: Mutex<Vec<(u32, u32)>>,
    }

    impl RecordingLocator {
        fn new(landmarks: LandmarkSet) -> Self {
            Self {
                landmarks,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl FaceLocator for RecordingLocator {
        fn locate(&self, frame: &Frame) -> LandmarkSet {
            self.seen
                .lock()
                .unwrap()
                .push((frame.width(), frame.height()));
            self.landmarks.clone()
        }
    }

    fn write_png(dir: &Path, width: u32, height: u32) -> std::path::PathBuf {
        let path = dir.join("donor.png");
        image::RgbImage::from_pixel(width, height, image::Rgb([90, 90, 90]))
            .save(&path)
            .unwrap();
        path
    }

    fn some_landmarks() -> LandmarkSet {
        LandmarkSet::new(vec![(1.0, 1.0), (5.0, 1.0), (3.0, 4.0)])
    }

    #[test]
    fn test_loads_face() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), 40, 30);
        let locator = RecordingLocator::new(some_landmarks());

        let donor = load_donor(&path, &locator, 720).unwrap();
        assert_eq!(donor.frame().width(), 40);
        assert_eq!(donor.landmarks().len(), 3);
    }

    #[test]
    fn test_tall_donor_is_downscaled_before_locating() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), 100, 200);
        let locator = RecordingLocator::new(some_landmarks());

        let donor = load_donor(&path, &locator, 50).unwrap();
        assert_eq!((donor.frame().width(), donor.frame().height()), (25, 50));
        assert_eq!(*locator.seen.lock().unwrap(), vec![(25, 50)]);
    }

    #[test]
    fn test_unreadable_donor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("donor.jpg");
        std::fs::write(&path, b"garbage").unwrap();
        let locator = RecordingLocator::new(some_landmarks());

        let err = load_donor(&path, &locator, 720).unwrap_err();
        assert!(matches!(err, JobError::DonorUnreadable { .. }));
        assert!(locator.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_donor_without_face() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), 40, 30);
        let locator = RecordingLocator::new(LandmarkSet::empty());

        let err = load_donor(&path, &locator, 720).unwrap_err();
        assert!(matches!(err, JobError::DonorNoFace { .. }));
    }
}
