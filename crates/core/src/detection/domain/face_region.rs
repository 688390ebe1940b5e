use crate::compositing::affine::Point;
use crate::shared::rect::Rect;

use super::landmark_set::LandmarkSet;

/// Geometry of one located face, derived from its landmark set.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceRegion {
    pub bbox: Rect,
    pub hull: Vec<Point>,
    pub keypoints: Option<[Point; 5]>,
}

impl FaceRegion {
    /// `None` for an empty landmark set.
    pub fn from_landmarks(landmarks: &LandmarkSet) -> Option<Self> {
        let bbox = landmarks.bounding_rect()?;
        Some(Self {
            bbox,
            hull: landmarks.convex_hull(),
            keypoints: landmarks.five_point(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_empty_landmarks_is_none() {
        assert!(FaceRegion::from_landmarks(&LandmarkSet::empty()).is_none());
    }

    #[test]
    fn test_from_landmarks_without_canonical_layout() {
        let set = LandmarkSet::new(vec![(2.0, 2.0), (8.0, 2.0), (5.0, 9.0)]);
        let region = FaceRegion::from_landmarks(&set).unwrap();
        assert_eq!(region.bbox, Rect::new(2, 2, 7, 8));
        assert_eq!(region.hull.len(), 3);
        assert!(region.keypoints.is_none());
    }
}
