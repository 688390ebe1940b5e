//! 2×3 affine transforms: exact three-point solutions, least-squares
//! similarity estimation, and bilinear warping.

use crate::shared::frame::Frame;

const SINGULAR_EPS: f64 = 1e-9;

pub type Point = (f64, f64);

/// Maps `(x, y)` to `(a·x + b·y + c, d·x + e·y + f)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AffineTransform {
    m: [f64; 6],
}

/// How samples outside the source image are treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Border {
    /// Out-of-range taps read as zero.
    Constant,
    /// Out-of-range taps read the nearest edge pixel.
    Replicate,
}

impl AffineTransform {
    pub fn new(m: [f64; 6]) -> Self {
        Self { m }
    }

    pub fn identity() -> Self {
        Self::new([1.0, 0.0, 0.0, 0.0, 1.0, 0.0])
    }

    pub fn coefficients(&self) -> [f64; 6] {
        self.m
    }

    pub fn apply(&self, (x, y): Point) -> Point {
        let [a, b, c, d, e, f] = self.m;
        (a * x + b * y + c, d * x + e * y + f)
    }

    /// The unique affine map taking `src[i]` onto `dst[i]` for all three
    /// points. `None` when the source triangle is degenerate.
    pub fn from_triangles(src: &[Point; 3], dst: &[Point; 3]) -> Option<Self> {
        let rows = [
            [src[0].0, src[0].1, 1.0],
            [src[1].0, src[1].1, 1.0],
            [src[2].0, src[2].1, 1.0],
        ];
        let det = det3(&rows);
        if det.abs() < SINGULAR_EPS {
            return None;
        }
        let solve = |rhs: [f64; 3]| -> [f64; 3] {
            let mut out = [0.0; 3];
            for (col, slot) in out.iter_mut().enumerate() {
                let mut replaced = rows;
                for (row, value) in rhs.iter().enumerate() {
                    replaced[row][col] = *value;
                }
                *slot = det3(&replaced) / det;
            }
            out
        };
        let [a, b, c] = solve([dst[0].0, dst[1].0, dst[2].0]);
        let [d, e, f] = solve([dst[0].1, dst[1].1, dst[2].1]);
        Some(Self::new([a, b, c, d, e, f]))
    }

    /// Least-squares similarity (uniform scale, rotation, translation) taking
    /// `src` onto `dst`. Needs at least two point pairs.
    pub fn similarity(src: &[Point], dst: &[Point]) -> Option<Self> {
        if src.len() != dst.len() || src.len() < 2 {
            return None;
        }
        // Unknowns [p, q, tx, ty] with x' = p·x − q·y + tx, y' = q·x + p·y + ty
        let mut ata = [[0.0f64; 4]; 4];
        let mut atb = [0.0f64; 4];
        for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst) {
            let r1 = [sx, -sy, 1.0, 0.0];
            let r2 = [sy, sx, 0.0, 1.0];
            for j in 0..4 {
                for k in 0..4 {
                    ata[j][k] += r1[j] * r1[k] + r2[j] * r2[k];
                }
                atb[j] += r1[j] * dx + r2[j] * dy;
            }
        }
        let [p, q, tx, ty] = solve4(ata, atb)?;
        Some(Self::new([p, -q, tx, q, p, ty]))
    }

    pub fn inverse(&self) -> Option<Self> {
        let [a, b, c, d, e, f] = self.m;
        let det = a * e - b * d;
        if det.abs() < SINGULAR_EPS {
            return None;
        }
        Some(Self::new([
            e / det,
            -b / det,
            (b * f - e * c) / det,
            -d / det,
            a / det,
            (d * c - a * f) / det,
        ]))
    }
}

fn det3(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Gaussian elimination with partial pivoting.
#[allow(clippy::needless_range_loop)]
fn solve4(mut a: [[f64; 4]; 4], mut b: [f64; 4]) -> Option<[f64; 4]> {
    for col in 0..4 {
        let pivot_row = (col..4)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);
        let pivot = a[col][col];
        if pivot.abs() < SINGULAR_EPS {
            return None;
        }
        for row in (col + 1)..4 {
            let factor = a[row][col] / pivot;
            for k in col..4 {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = [0.0f64; 4];
    for i in (0..4).rev() {
        let tail: f64 = ((i + 1)..4).map(|j| a[i][j] * x[j]).sum();
        x[i] = (b[i] - tail) / a[i][i];
    }
    Some(x)
}

/// Warp `src` into an `out_w` × `out_h` image, where `transform` maps
/// source coordinates onto output coordinates.
///
/// Each output pixel is sampled bilinearly through the inverse map. A
/// singular transform yields an all-zero image.
pub fn warp_affine(
    src: &Frame,
    transform: &AffineTransform,
    out_w: u32,
    out_h: u32,
    border: Border,
) -> Frame {
    let channels = src.channels() as usize;
    let mut out = vec![0u8; out_w as usize * out_h as usize * channels];
    let Some(inverse) = transform.inverse() else {
        return Frame::new(out, out_w, out_h, src.channels(), src.index());
    };
    let (sw, sh) = (src.width() as i64, src.height() as i64);
    if sw == 0 || sh == 0 {
        return Frame::new(out, out_w, out_h, src.channels(), src.index());
    }
    let data = src.data();

    let tap = |x: i64, y: i64, c: usize| -> f64 {
        let (x, y) = match border {
            Border::Replicate => (x.clamp(0, sw - 1), y.clamp(0, sh - 1)),
            Border::Constant => {
                if x < 0 || y < 0 || x >= sw || y >= sh {
                    return 0.0;
                }
                (x, y)
            }
        };
        data[(y as usize * sw as usize + x as usize) * channels + c] as f64
    };

    for oy in 0..out_h as usize {
        for ox in 0..out_w as usize {
            let (sx, sy) = inverse.apply((ox as f64, oy as f64));
            let x0 = sx.floor();
            let y0 = sy.floor();
            let fx = sx - x0;
            let fy = sy - y0;
            let (x0, y0) = (x0 as i64, y0 as i64);
            for c in 0..channels {
                let v = tap(x0, y0, c) * (1.0 - fx) * (1.0 - fy)
                    + tap(x0 + 1, y0, c) * fx * (1.0 - fy)
                    + tap(x0, y0 + 1, c) * (1.0 - fx) * fy
                    + tap(x0 + 1, y0 + 1, c) * fx * fy;
                out[(oy * out_w as usize + ox) * channels + c] = v.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    Frame::new(out, out_w, out_h, src.channels(), src.index())
}
