use crate::compositing::affine::Point;
use crate::shared::rect::Rect;

/// Number of points in the canonical 68-point facial layout.
pub const CANONICAL_POINTS: usize = 68;

/// Ordered facial landmarks in a fixed canonical layout.
///
/// An empty set is the sentinel for "no face found" and short-circuits every
/// swap strategy to pass-through.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Point>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Inclusive integer box around every point.
    pub fn bounding_rect(&self) -> Option<Rect> {
        Rect::bounding(&self.points)
    }

    /// Convex hull with distinct vertices in counter-clockwise order
    /// (positive signed area). Collinear boundary points are dropped.
    pub fn convex_hull(&self) -> Vec<Point> {
        let mut pts: Vec<Point> = self
            .points
            .iter()
            .copied()
            .filter(|p| p.0.is_finite() && p.1.is_finite())
            .collect();
        pts.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        });
        pts.dedup();
        if pts.len() < 3 {
            return pts;
        }

        let cross =
            |o: Point, a: Point, b: Point| (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0);
        let mut hull: Vec<Point> = Vec::with_capacity(pts.len() * 2);
        for &p in &pts {
            while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
                hull.pop();
            }
            hull.push(p);
        }
        let lower_len = hull.len() + 1;
        for &p in pts.iter().rev().skip(1) {
            while hull.len() >= lower_len
                && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0
            {
                hull.pop();
            }
            hull.push(p);
        }
        hull.pop();
        hull
    }

    pub fn translated(&self, dx: f64, dy: f64) -> LandmarkSet {
        LandmarkSet::new(self.points.iter().map(|&(x, y)| (x + dx, y + dy)).collect())
    }

    /// Eye centers, nose tip and mouth corners of a 68-point set, in that
    /// order. `None` for any other layout.
    pub fn five_point(&self) -> Option<[Point; 5]> {
        if self.points.len() != CANONICAL_POINTS {
            return None;
        }
        let mean = |range: std::ops::Range<usize>| {
            let n = range.len() as f64;
            let (sx, sy) = self.points[range]
                .iter()
                .fold((0.0, 0.0), |(ax, ay), &(x, y)| (ax + x, ay + y));
            (sx / n, sy / n)
        };
        Some([
            mean(36..42),
            mean(42..48),
            self.points[30],
            self.points[48],
            self.points[54],
        ])
    }
}
