use std::path::PathBuf;

/// Stream properties reported by a frame source and handed to the sink so
/// the output matches the input's geometry and timing.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Container-reported frame count; zero when unknown.
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    /// Metadata for a single still image treated as a one-frame stream.
    pub fn still(width: u32, height: u32, source_path: Option<PathBuf>) -> Self {
        Self {
            width,
            height,
            fps: 0.0,
            total_frames: 1,
            codec: String::new(),
            source_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_still_is_single_frame() {
        let meta = VideoMetadata::still(800, 600, Some(PathBuf::from("/tmp/a.png")));
        assert_eq!(meta.total_frames, 1);
        assert_eq!(meta.fps, 0.0);
        assert_eq!((meta.width, meta.height), (800, 600));
        assert_eq!(meta.source_path, Some(PathBuf::from("/tmp/a.png")));
    }

    #[test]
    fn test_clone_is_equal() {
        let meta = VideoMetadata {
            width: 640,
            height: 480,
            fps: 24.0,
            total_frames: 100,
            codec: "h264".to_string(),
            source_path: None,
        };
        assert_eq!(meta, meta.clone());
    }
}
