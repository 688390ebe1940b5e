use std::path::Path;

use crate::shared::error::BoxError;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Output sink. Only the ordered writer calls `write`, always in
/// increasing frame-index order.
pub trait VideoWriter: Send {
    fn open(&mut self, path: &Path, metadata: &VideoMetadata) -> Result<(), BoxError>;

    fn write(&mut self, frame: &Frame) -> Result<(), BoxError>;

    /// Audio from the source file is carried over during close.
    fn close(&mut self) -> Result<(), BoxError>;
}
