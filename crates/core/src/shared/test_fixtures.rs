//! Synthetic frames and landmarks shared by swap and pipeline tests.

use crate::detection::domain::landmark_set::LandmarkSet;
use crate::shared::frame::Frame;
use crate::shared::rect::Rect;

pub const SIZE: u32 = 64;
pub const FACE: Rect = Rect {
    x: 8,
    y: 8,
    width: 48,
    height: 48,
};
pub const BACKGROUND: [u8; 3] = [40, 60, 80];
pub const FACE_COLOR: [u8; 3] = [200, 160, 130];
pub const DONOR_COLOR: [u8; 3] = [30, 200, 90];

fn paint(frame: &mut Frame, rect: Rect, mut color: impl FnMut(u32, u32) -> [u8; 3]) {
    let w = frame.width() as usize;
    for y in rect.y..rect.bottom() {
        for x in rect.x..rect.right() {
            let c = color(x as u32, y as u32);
            let o = (y as usize * w + x as usize) * 3;
            frame.data_mut()[o..o + 3].copy_from_slice(&c);
        }
    }
}

/// Uniform background with a solid rectangular "face".
pub fn face_frame(index: usize) -> Frame {
    let mut f = Frame::filled(SIZE, SIZE, BACKGROUND, index);
    paint(&mut f, FACE, |_, _| FACE_COLOR);
    f
}

/// Donor image laid out like [`face_frame`] with a distinct face color.
pub fn donor_frame() -> Frame {
    let mut f = Frame::filled(SIZE, SIZE, BACKGROUND, 0);
    paint(&mut f, FACE, |_, _| DONOR_COLOR);
    f
}

/// Donor whose face carries high-contrast vertical stripes.
pub fn striped_donor_frame() -> Frame {
    let mut f = Frame::filled(SIZE, SIZE, BACKGROUND, 0);
    paint(&mut f, FACE, |x, _| if x % 4 < 2 { [250, 250, 250] } else { [10, 10, 10] });
    f
}

/// 5×5 grid of points spanning the inner face, deterministically jittered
/// so no four points are cocircular.
pub fn grid_landmarks() -> LandmarkSet {
    let mut points = Vec::with_capacity(25);
    for j in 0..5 {
        for i in 0..5 {
            let dx = ((i * 3 + j * 5) % 7) as f64 * 0.3 - 0.9;
            let dy = ((i * 5 + j * 3) % 7) as f64 * 0.3 - 0.9;
            points.push((12.0 + i as f64 * 9.75 + dx, 12.0 + j as f64 * 9.75 + dy));
        }
    }
    LandmarkSet::new(points)
}
