use std::path::Path;

use crate::shared::error::BoxError;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

/// Decodes an image file into a single RGB frame with index 0.
///
/// Alpha and grayscale inputs are converted to RGB.
pub fn read_image(path: &Path) -> Result<Frame, BoxError> {
    let img = image::open(path)?.to_rgb8();
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(format!("{} has no pixels", path.display()).into());
    }
    Ok(Frame::new(img.into_raw(), width, height, 3, 0))
}

/// Adapts a single image file to the [`VideoReader`] interface as a
/// one-frame stream with `fps = 0`.
pub struct ImageFileReader {
    frame: Option<Frame>,
}

impl ImageFileReader {
    pub fn new() -> Self {
        Self { frame: None }
    }
}

impl Default for ImageFileReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoReader for ImageFileReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, BoxError> {
        let frame = read_image(path)?;
        let metadata = VideoMetadata::still(frame.width(), frame.height(), Some(path.to_path_buf()));
        self.frame = Some(frame);
        Ok(metadata)
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = Result<Frame, BoxError>> + '_> {
        match self.frame.take() {
            Some(frame) => Box::new(std::iter::once(Ok(frame))),
            None => Box::new(std::iter::once(Err("ImageFileReader: not opened".into()))),
        }
    }

    fn close(&mut self) {
        self.frame = None;
    }
}
