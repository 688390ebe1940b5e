use crate::shared::rect::Rect;

use super::gaussian::gaussian_blur;

const EDGE_EPS: f64 = 1e-6;

/// Single-channel 8-bit mask; any non-zero value counts as foreground.
#[derive(Clone, Debug, PartialEq)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Mask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        self.get(x, y) > 0
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|&v| v == 0)
    }

    /// Fill a convex polygon, including pixels whose centers lie on its edges.
    pub fn fill_convex_polygon(&mut self, polygon: &[(f64, f64)]) {
        if polygon.is_empty() || self.width == 0 || self.height == 0 {
            return;
        }
        let n = polygon.len();
        let min_y = polygon.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let max_y = polygon.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
        let y_start = ((min_y - EDGE_EPS).ceil() as i64).max(0);
        let y_end = ((max_y + EDGE_EPS).floor() as i64).min(self.height as i64 - 1);

        for y in y_start..=y_end {
            let yf = y as f64;
            let mut lo = f64::INFINITY;
            let mut hi = f64::NEG_INFINITY;
            for i in 0..n {
                let (x1, y1) = polygon[i];
                let (x2, y2) = polygon[(i + 1) % n];
                if (y1 - y2).abs() < EDGE_EPS {
                    if (yf - y1).abs() < EDGE_EPS {
                        lo = lo.min(x1.min(x2));
                        hi = hi.max(x1.max(x2));
                    }
                    continue;
                }
                if yf < y1.min(y2) - EDGE_EPS || yf > y1.max(y2) + EDGE_EPS {
                    continue;
                }
                let x = x1 + (yf - y1) / (y2 - y1) * (x2 - x1);
                lo = lo.min(x);
                hi = hi.max(x);
            }
            if lo > hi {
                continue;
            }
            let x_start = ((lo - EDGE_EPS).ceil() as i64).max(0);
            let x_end = ((hi + EDGE_EPS).floor() as i64).min(self.width as i64 - 1);
            if x_start > x_end {
                continue;
            }
            let row = y as usize * self.width as usize;
            self.data[row + x_start as usize..=row + x_end as usize].fill(255);
        }
    }

    /// Fill an axis-aligned ellipse centered at `(cx, cy)` with semi-axes
    /// `(ax, ay)`.
    pub fn fill_ellipse(&mut self, cx: f64, cy: f64, ax: f64, ay: f64) {
        if ax <= 0.0 || ay <= 0.0 {
            return;
        }
        for y in 0..self.height {
            let dy = (y as f64 - cy) / ay;
            if dy.abs() > 1.0 {
                continue;
            }
            for x in 0..self.width {
                let dx = (x as f64 - cx) / ax;
                if dx * dx + dy * dy <= 1.0 {
                    self.data[y as usize * self.width as usize + x as usize] = 255;
                }
            }
        }
    }

    /// Alpha weights in `[0, 1]` after Gaussian feathering of the mask edge.
    pub fn feathered(&self, kernel_size: usize) -> Vec<f32> {
        let mut plane = self.data.clone();
        gaussian_blur(
            &mut plane,
            self.width as usize,
            self.height as usize,
            1,
            kernel_size,
        );
        plane.iter().map(|&v| v as f32 / 255.0).collect()
    }

    /// Binary mask of every alpha strictly above `threshold`.
    pub fn from_alpha(width: u32, height: u32, alpha: &[f32], threshold: f32) -> Self {
        debug_assert_eq!(alpha.len(), width as usize * height as usize);
        Self {
            width,
            height,
            data: alpha
                .iter()
                .map(|&a| if a > threshold { 255 } else { 0 })
                .collect(),
        }
    }

    /// Place this mask at `(x, y)` inside an otherwise empty canvas.
    pub fn embedded(&self, canvas_w: u32, canvas_h: u32, x: i32, y: i32) -> Mask {
        let mut out = Mask::new(canvas_w, canvas_h);
        for my in 0..self.height as i32 {
            let cy = y + my;
            if cy < 0 || cy >= canvas_h as i32 {
                continue;
            }
            for mx in 0..self.width as i32 {
                let cx = x + mx;
                if cx < 0 || cx >= canvas_w as i32 {
                    continue;
                }
                out.data[cy as usize * canvas_w as usize + cx as usize] =
                    self.data[my as usize * self.width as usize + mx as usize];
            }
        }
        out
    }

    /// Tight bounding box of the foreground, or `None` when empty.
    pub fn bounding_rect(&self) -> Option<Rect> {
        let w = self.width as usize;
        let (mut x1, mut y1, mut x2, mut y2) = (usize::MAX, usize::MAX, 0usize, 0usize);
        for (i, _) in self.data.iter().enumerate().filter(|(_, &v)| v > 0) {
            let (x, y) = (i % w, i / w);
            x1 = x1.min(x);
            y1 = y1.min(y);
            x2 = x2.max(x);
            y2 = y2.max(y);
        }
        (x1 != usize::MAX).then(|| {
            Rect::new(x1 as i32, y1 as i32, (x2 - x1 + 1) as i32, (y2 - y1 + 1) as i32)
        })
    }
}
