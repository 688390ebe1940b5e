use crate::shared::frame::Frame;

/// Bilinear resize with pixel-center alignment.
///
/// Returns the input unchanged when the size already matches. A zero target
/// dimension yields an empty frame.
pub fn resize_bilinear(src: &Frame, target_w: u32, target_h: u32) -> Frame {
    if src.width() == target_w && src.height() == target_h {
        return src.clone();
    }
    let channels = src.channels() as usize;
    let (sw, sh) = (src.width() as usize, src.height() as usize);
    let (tw, th) = (target_w as usize, target_h as usize);
    let mut out = vec![0u8; tw * th * channels];
    if sw == 0 || sh == 0 {
        return Frame::new(out, target_w, target_h, src.channels(), src.index());
    }

    let scale_x = sw as f32 / tw.max(1) as f32;
    let scale_y = sh as f32 / th.max(1) as f32;
    let data = src.data();

    for y in 0..th {
        let fy = ((y as f32 + 0.5) * scale_y - 0.5).clamp(0.0, (sh - 1) as f32);
        let y0 = fy.floor() as usize;
        let y1 = (y0 + 1).min(sh - 1);
        let wy = fy - y0 as f32;
        for x in 0..tw {
            let fx = ((x as f32 + 0.5) * scale_x - 0.5).clamp(0.0, (sw - 1) as f32);
            let x0 = fx.floor() as usize;
            let x1 = (x0 + 1).min(sw - 1);
            let wx = fx - x0 as f32;
            for c in 0..channels {
                let v00 = data[(y0 * sw + x0) * channels + c] as f32;
                let v10 = data[(y0 * sw + x1) * channels + c] as f32;
                let v01 = data[(y1 * sw + x0) * channels + c] as f32;
                let v11 = data[(y1 * sw + x1) * channels + c] as f32;
                let top = v00 + (v10 - v00) * wx;
                let bottom = v01 + (v11 - v01) * wx;
                let v = top + (bottom - top) * wy;
                out[(y * tw + x) * channels + c] = v.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    Frame::new(out, target_w, target_h, src.channels(), src.index())
}

/// Downscale so the height does not exceed `max_height`, keeping aspect ratio.
pub fn limit_height(src: &Frame, max_height: u32) -> Frame {
    if src.height() <= max_height || src.height() == 0 {
        return src.clone();
    }
    let scale = max_height as f64 / src.height() as f64;
    let new_w = ((src.width() as f64 * scale).round() as u32).max(1);
    resize_bilinear(src, new_w, max_height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_size_is_identity() {
        let frame = Frame::filled(5, 4, [1, 2, 3], 0);
        assert_eq!(resize_bilinear(&frame, 5, 4), frame);
    }

    #[test]
    fn test_uniform_stays_uniform() {
        let frame = Frame::filled(7, 3, [90, 45, 200], 3);
        let out = resize_bilinear(&frame, 20, 11);
        assert_eq!((out.width(), out.height(), out.index()), (20, 11, 3));
        assert!(out.data().chunks(3).all(|p| p == [90, 45, 200]));
    }

    #[test]
    fn test_upscale_interpolates_between_columns() {
        // 2x1: black | white
        let frame = Frame::new(vec![0, 0, 0, 255, 255, 255], 2, 1, 3, 0);
        let out = resize_bilinear(&frame, 4, 1);
        let reds: Vec<u8> = out.data().chunks(3).map(|p| p[0]).collect();
        assert_eq!(reds[0], 0);
        assert_eq!(reds[3], 255);
        assert!(reds[1] > 0 && reds[1] < reds[2] && reds[2] < 255);
    }

    #[test]
    fn test_limit_height_keeps_aspect() {
        let frame = Frame::filled(200, 100, [0, 0, 0], 0);
        let out = limit_height(&frame, 50);
        assert_eq!((out.width(), out.height()), (100, 50));
        let small = limit_height(&frame, 720);
        assert_eq!((small.width(), small.height()), (200, 100));
    }
}
