//! Piecewise-affine face transfer over a Delaunay triangulation of the
//! target landmarks, finished with a gradient-domain blend.

use crate::compositing::affine::{warp_affine, AffineTransform, Border, Point};
use crate::compositing::delaunay::triangulate;
use crate::compositing::mask::Mask;
use crate::compositing::seamless::seamless_blend;
use crate::detection::domain::landmark_set::LandmarkSet;
use crate::shared::frame::Frame;
use crate::shared::rect::Rect;

use super::donor_face::DonorFace;
use super::strategy_chain::{Candidate, EscalationReason};

pub struct GeometricWarp {
    min_triangles: usize,
}

impl GeometricWarp {
    pub fn new(min_triangles: usize) -> Self {
        Self { min_triangles }
    }

    pub fn swap(
        &self,
        frame: &Frame,
        target: &LandmarkSet,
        donor: &DonorFace,
    ) -> Result<Candidate, EscalationReason> {
        let src_points = target.points();
        let donor_points = donor.landmarks().points();
        if src_points.len() != donor_points.len() {
            return Err(EscalationReason::Degenerate(format!(
                "landmark layouts differ ({} vs {} points)",
                src_points.len(),
                donor_points.len()
            )));
        }

        let hull = target.convex_hull();
        if hull.len() < 3 {
            return Err(EscalationReason::Degenerate(format!(
                "hull has {} distinct vertices",
                hull.len()
            )));
        }
        let mut mask = Mask::new(frame.width(), frame.height());
        mask.fill_convex_polygon(&hull);

        let triangles = triangulate(src_points);
        if triangles.len() < self.min_triangles {
            return Err(EscalationReason::Degenerate(format!(
                "{} triangles, need {}",
                triangles.len(),
                self.min_triangles
            )));
        }

        let mut composite = frame.clone();
        let mut pasted = 0usize;
        for tri in &triangles {
            let src_tri = tri.map(|i| donor_points[i]);
            let dst_tri = tri.map(|i| src_points[i]);
            if paste_triangle(donor.frame(), &src_tri, &mut composite, &dst_tri) {
                pasted += 1;
            }
        }
        if pasted == 0 {
            return Err(EscalationReason::Degenerate(
                "no triangle fell inside both images".into(),
            ));
        }

        let blended = match hull_centroid(&hull) {
            Some((cx, cy))
                if !mask.is_empty()
                    && cx >= 0.0
                    && cy >= 0.0
                    && cx < frame.width() as f64
                    && cy < frame.height() as f64 =>
            {
                seamless_blend(&composite, frame, &mask)
            }
            _ => composite,
        };

        Ok(Candidate {
            frame: blended,
            mask,
        })
    }
}

/// Warp the donor triangle `src` onto `dst` inside `canvas`, replacing the
/// pixels the destination triangle covers. Returns false when the triangle
/// was skipped.
fn paste_triangle(donor: &Frame, src: &[Point; 3], canvas: &mut Frame, dst: &[Point; 3]) -> bool {
    let (Some(r1), Some(r2)) = (Rect::bounding(src), Rect::bounding(dst)) else {
        return false;
    };
    if !r1.fits_within(donor.width(), donor.height())
        || !r2.fits_within(canvas.width(), canvas.height())
    {
        return false;
    }
    let Some(crop) = donor.crop(r1) else {
        return false;
    };
    let local = |tri: &[Point; 3], r: Rect| tri.map(|(x, y)| (x - r.x as f64, y - r.y as f64));
    let dst_local = local(dst, r2);
    let Some(transform) = AffineTransform::from_triangles(&local(src, r1), &dst_local) else {
        return false;
    };
    let warped = warp_affine(
        &crop,
        &transform,
        r2.width as u32,
        r2.height as u32,
        Border::Replicate,
    );
    let mut tri_mask = Mask::new(r2.width as u32, r2.height as u32);
    tri_mask.fill_convex_polygon(&dst_local);

    let channels = canvas.channels() as usize;
    let cw = canvas.width() as usize;
    let data = canvas.data_mut();
    for y in 0..r2.height as u32 {
        for x in 0..r2.width as u32 {
            if !tri_mask.is_set(x, y) {
                continue;
            }
            let o = ((r2.y as usize + y as usize) * cw + r2.x as usize + x as usize) * channels;
            data[o..o + channels].copy_from_slice(warped.pixel(x, y));
        }
    }
    true
}

/// Area centroid of a simple polygon; vertex mean when the area vanishes.
fn hull_centroid(hull: &[Point]) -> Option<Point> {
    if hull.is_empty() {
        return None;
    }
    let n = hull.len();
    let (mut a, mut cx, mut cy) = (0.0, 0.0, 0.0);
    for i in 0..n {
        let (x0, y0) = hull[i];
        let (x1, y1) = hull[(i + 1) % n];
        let cross = x0 * y1 - x1 * y0;
        a += cross;
        cx += (x0 + x1) * cross;
        cy += (y0 + y1) * cross;
    }
    if a.abs() < 1e-9 {
        let (sx, sy) = hull.iter().fold((0.0, 0.0), |(ax, ay), &(x, y)| (ax + x, ay + y));
        return Some((sx / n as f64, sy / n as f64));
    }
    Some((cx / (3.0 * a), cy / (3.0 * a)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_fixtures::{
        donor_frame, face_frame, grid_landmarks, striped_donor_frame, FACE_COLOR,
    };
    use approx::assert_relative_eq;

    fn donor(frame: Frame) -> DonorFace {
        DonorFace::new(frame, grid_landmarks())
    }

    #[test]
    fn test_hull_centroid_of_square() {
        let c = hull_centroid(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]).unwrap();
        assert_relative_eq!(c.0, 5.0);
        assert_relative_eq!(c.1, 5.0);
    }

    #[test]
    fn test_paste_triangle_copies_identity_region() {
        let donor = striped_donor_frame();
        let mut canvas = face_frame(0);
        let tri = [(20.0, 20.0), (40.0, 20.0), (20.0, 40.0)];
        assert!(paste_triangle(&donor, &tri, &mut canvas, &tri));
        assert_eq!(canvas.pixel(22, 22), donor.pixel(22, 22));
        assert_eq!(canvas.pixel(23, 22), donor.pixel(23, 22));
        // outside the triangle stays untouched
        assert_eq!(canvas.pixel(39, 39), &FACE_COLOR);
    }

    #[test]
    fn test_paste_triangle_skips_out_of_bounds() {
        let donor = donor_frame();
        let mut canvas = face_frame(0);
        let before = canvas.clone();
        let tri = [(-5.0, 20.0), (40.0, 20.0), (20.0, 40.0)];
        assert!(!paste_triangle(&donor, &tri, &mut canvas, &tri));
        assert_eq!(canvas, before);
    }

    #[test]
    fn test_textured_donor_changes_the_face() {
        let frame = face_frame(0);
        let out = GeometricWarp::new(10)
            .swap(&frame, &grid_landmarks(), &donor(striped_donor_frame()))
            .unwrap();
        assert!(out.frame.mean_abs_diff(&frame).unwrap() > 5.0);
        assert!(out.mask.is_set(32, 32));
        // background far from the hull is untouched
        assert_eq!(out.frame.pixel(2, 2), frame.pixel(2, 2));
    }

    #[test]
    fn test_flat_donor_blends_to_a_no_op() {
        let frame = face_frame(0);
        let out = GeometricWarp::new(10)
            .swap(&frame, &grid_landmarks(), &donor(donor_frame()))
            .unwrap();
        assert!(out.frame.mean_abs_diff(&frame).unwrap() < 1.0);
    }

    #[test]
    fn test_too_few_triangles_is_degenerate() {
        let frame = face_frame(0);
        let set = LandmarkSet::new(vec![(10.0, 10.0), (50.0, 10.0), (30.0, 50.0), (30.0, 25.0)]);
        let donor = DonorFace::new(donor_frame(), set.clone());
        let result = GeometricWarp::new(10).swap(&frame, &set, &donor);
        assert!(matches!(result, Err(EscalationReason::Degenerate(_))));
    }

    #[test]
    fn test_collinear_hull_is_degenerate() {
        let frame = face_frame(0);
        let set = LandmarkSet::new(vec![(10.0, 10.0), (20.0, 20.0), (30.0, 30.0)]);
        let donor = DonorFace::new(donor_frame(), set.clone());
        let result = GeometricWarp::new(1).swap(&frame, &set, &donor);
        assert!(matches!(result, Err(EscalationReason::Degenerate(_))));
    }

    #[test]
    fn test_mismatched_layouts_are_degenerate() {
        let frame = face_frame(0);
        let donor = DonorFace::new(donor_frame(), LandmarkSet::new(vec![(1.0, 1.0)]));
        let result = GeometricWarp::new(10).swap(&frame, &grid_landmarks(), &donor);
        assert!(matches!(result, Err(EscalationReason::Degenerate(_))));
    }
}
