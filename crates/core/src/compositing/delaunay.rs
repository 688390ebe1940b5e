//! Incremental (Bowyer–Watson) Delaunay triangulation over landmark points.

use super::affine::Point;

/// Points closer than this are treated as the same vertex.
const DUPLICATE_EPS: f64 = 0.5;

#[derive(Clone, Copy)]
struct Triangle {
    v: [usize; 3],
    cx: f64,
    cy: f64,
    r2: f64,
}

impl Triangle {
    fn new(v: [usize; 3], pts: &[Point]) -> Self {
        let (ax, ay) = pts[v[0]];
        let (bx, by) = pts[v[1]];
        let (cx, cy) = pts[v[2]];
        let d = 2.0 * (ax * (by - cy) + bx * (cy - ay) + cx * (ay - by));
        if d.abs() < 1e-12 {
            // Degenerate: an infinite circumcircle makes it "bad" for every
            // later insertion, so it never survives.
            return Self {
                v,
                cx: 0.0,
                cy: 0.0,
                r2: f64::INFINITY,
            };
        }
        let a2 = ax * ax + ay * ay;
        let b2 = bx * bx + by * by;
        let c2 = cx * cx + cy * cy;
        let ux = (a2 * (by - cy) + b2 * (cy - ay) + c2 * (ay - by)) / d;
        let uy = (a2 * (cx - bx) + b2 * (ax - cx) + c2 * (bx - ax)) / d;
        Self {
            v,
            cx: ux,
            cy: uy,
            r2: (ax - ux).powi(2) + (ay - uy).powi(2),
        }
    }

    fn circumcircle_contains(&self, (x, y): Point) -> bool {
        let d2 = (x - self.cx).powi(2) + (y - self.cy).powi(2);
        d2 < self.r2 * (1.0 - 1e-12)
    }

    fn edges(&self) -> [(usize, usize); 3] {
        [
            (self.v[0], self.v[1]),
            (self.v[1], self.v[2]),
            (self.v[2], self.v[0]),
        ]
    }
}

/// Triangulate `points`, returning triples of indices into `points`.
///
/// Near-duplicate points are collapsed onto their first occurrence, so every
/// index refers to a distinct location. Fewer than three distinct points, or
/// all points collinear, yields no triangles.
pub fn triangulate(points: &[Point]) -> Vec<[usize; 3]> {
    let mut distinct: Vec<usize> = Vec::with_capacity(points.len());
    for (i, &(x, y)) in points.iter().enumerate() {
        if !x.is_finite() || !y.is_finite() {
            continue;
        }
        let seen = distinct.iter().any(|&j| {
            let (px, py) = points[j];
            (px - x).abs() < DUPLICATE_EPS && (py - y).abs() < DUPLICATE_EPS
        });
        if !seen {
            distinct.push(i);
        }
    }
    if distinct.len() < 3 {
        return Vec::new();
    }

    let mut pts: Vec<Point> = distinct.iter().map(|&i| points[i]).collect();
    let n = pts.len();

    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for &(x, y) in &pts {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    let span = (max_x - min_x).max(max_y - min_y).max(1.0);
    let (mid_x, mid_y) = ((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);
    pts.push((mid_x - 20.0 * span, mid_y - span));
    pts.push((mid_x, mid_y + 20.0 * span));
    pts.push((mid_x + 20.0 * span, mid_y - span));

    let mut triangles = vec![Triangle::new([n, n + 1, n + 2], &pts)];

    for p in 0..n {
        let point = pts[p];
        let (bad, good): (Vec<Triangle>, Vec<Triangle>) = triangles
            .into_iter()
            .partition(|t| t.circumcircle_contains(point));
        triangles = good;

        // Cavity boundary: edges of bad triangles not shared with another bad one.
        let mut boundary: Vec<(usize, usize)> = Vec::new();
        for t in &bad {
            for (a, b) in t.edges() {
                let shared = bad.iter().any(|o| {
                    !std::ptr::eq(o, t)
                        && o.edges().iter().any(|&(c, d)| (c == b && d == a) || (c == a && d == b))
                });
                if !shared {
                    boundary.push((a, b));
                }
            }
        }
        for (a, b) in boundary {
            triangles.push(Triangle::new([a, b, p], &pts));
        }
    }

    triangles
        .into_iter()
        .filter(|t| t.v.iter().all(|&v| v < n) && t.r2.is_finite())
        .map(|t| [distinct[t.v[0]], distinct[t.v[1]], distinct[t.v[2]]])
        .collect()
}
