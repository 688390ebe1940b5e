use ndarray::{ArrayView3, ArrayViewMut3};

use super::rect::Rect;

/// A single video/image frame: contiguous RGB bytes in row-major order.
///
/// The index is assigned by the frame source in read order and travels with
/// the frame through every worker so results can be reordered on output.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    /// A frame of the given size with every pixel set to `color`.
    pub fn filled(width: u32, height: u32, color: [u8; 3], index: usize) -> Self {
        let data = color
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self::new(data, width, height, 3, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// True when both frames share dimensions and channel layout.
    pub fn same_layout(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height && self.channels == other.channels
    }

    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let c = self.channels as usize;
        let offset = (y as usize * self.width as usize + x as usize) * c;
        &self.data[offset..offset + c]
    }

    /// Mean absolute per-channel difference against `other`.
    ///
    /// Returns `None` when the layouts differ.
    pub fn mean_abs_diff(&self, other: &Frame) -> Option<f64> {
        if !self.same_layout(other) {
            return None;
        }
        if self.data.is_empty() {
            return Some(0.0);
        }
        let total: u64 = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(&a, &b)| a.abs_diff(b) as u64)
            .sum();
        Some(total as f64 / self.data.len() as f64)
    }

    /// Copies the pixels under `rect` into a new frame. The rectangle is
    /// clipped to the frame; `None` if nothing remains.
    pub fn crop(&self, rect: Rect) -> Option<Frame> {
        let r = rect.clamp_to(self.width, self.height)?;
        let c = self.channels as usize;
        let fw = self.width as usize;
        let (rx, ry, rw, rh) = (r.x as usize, r.y as usize, r.width as usize, r.height as usize);
        let mut out = Vec::with_capacity(rw * rh * c);
        for row in ry..ry + rh {
            let start = (row * fw + rx) * c;
            out.extend_from_slice(&self.data[start..start + rw * c]);
        }
        Some(Frame::new(out, rw as u32, rh as u32, self.channels, self.index))
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        ArrayViewMut3::from_shape(self.shape(), &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12];
        let frame = Frame::new(data.clone(), 2, 2, 3, 5);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.index(), 5);
        assert_eq!(frame.data(), &data[..]);
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * channels")]
    fn test_mismatched_data_length_panics_in_debug() {
        Frame::new(vec![0u8; 10], 2, 2, 3, 0);
    }

    #[test]
    fn test_filled_sets_every_pixel() {
        let frame = Frame::filled(3, 2, [10, 20, 30], 4);
        assert_eq!(frame.index(), 4);
        for y in 0..2 {
            for x in 0..3 {
                assert_eq!(frame.pixel(x, y), &[10, 20, 30]);
            }
        }
    }

    #[test]
    fn test_with_index_keeps_pixels() {
        let frame = Frame::filled(2, 2, [1, 2, 3], 0).with_index(9);
        assert_eq!(frame.index(), 9);
        assert_eq!(frame.pixel(1, 1), &[1, 2, 3]);
    }

    // ── Difference ───────────────────────────────────────────────────

    #[test]
    fn test_mean_abs_diff_identical_is_zero() {
        let a = Frame::filled(4, 4, [100, 100, 100], 0);
        assert_relative_eq!(a.mean_abs_diff(&a.clone()).unwrap(), 0.0);
    }

    #[test]
    fn test_mean_abs_diff_symmetric() {
        let a = Frame::filled(4, 4, [100, 50, 0], 0);
        let b = Frame::filled(4, 4, [90, 60, 30], 0);
        // (10 + 10 + 30) / 3
        assert_relative_eq!(a.mean_abs_diff(&b).unwrap(), 50.0 / 3.0);
        assert_relative_eq!(b.mean_abs_diff(&a).unwrap(), 50.0 / 3.0);
    }

    #[test]
    fn test_mean_abs_diff_layout_mismatch_is_none() {
        let a = Frame::filled(4, 4, [0, 0, 0], 0);
        let b = Frame::filled(4, 5, [0, 0, 0], 0);
        assert!(a.mean_abs_diff(&b).is_none());
    }

    // ── Crop ─────────────────────────────────────────────────────────

    #[test]
    fn test_crop_copies_region() {
        let mut frame = Frame::filled(4, 4, [0, 0, 0], 2);
        frame.data_mut()[(4 + 2) * 3] = 200; // (x=2, y=1)
        let crop = frame.crop(Rect::new(1, 1, 2, 2)).unwrap();
        assert_eq!(crop.width(), 2);
        assert_eq!(crop.height(), 2);
        assert_eq!(crop.index(), 2);
        assert_eq!(crop.pixel(1, 0)[0], 200);
        assert_eq!(crop.pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_crop_clips_to_frame() {
        let frame = Frame::filled(4, 4, [7, 7, 7], 0);
        let crop = frame.crop(Rect::new(2, 2, 10, 10)).unwrap();
        assert_eq!((crop.width(), crop.height()), (2, 2));
    }

    #[test]
    fn test_crop_outside_is_none() {
        let frame = Frame::filled(4, 4, [7, 7, 7], 0);
        assert!(frame.crop(Rect::new(10, 10, 2, 2)).is_none());
    }

    #[test]
    fn test_as_ndarray_pixel_access() {
        let mut data = vec![0u8; 12];
        data[6] = 255; // row=1, col=0, R
        let frame = Frame::new(data, 2, 2, 3, 0);
        let arr = frame.as_ndarray();
        assert_eq!(arr.shape(), &[2, 2, 3]);
        assert_eq!(arr[[1, 0, 0]], 255);
        assert_eq!(arr[[1, 0, 1]], 0);
    }

    #[test]
    fn test_as_ndarray_mut_modification() {
        let mut frame = Frame::new(vec![0u8; 12], 2, 2, 3, 0);
        {
            let mut arr = frame.as_ndarray_mut();
            arr[[0, 1, 2]] = 128;
        }
        assert_eq!(frame.pixel(1, 0)[2], 128);
    }
}
