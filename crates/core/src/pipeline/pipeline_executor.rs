use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::shared::error::JobError;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

use super::frame_processor::FrameProcessor;
use super::pipeline_logger::PipelineLogger;

/// Progress callback `(frames_written, total_frames) -> keep_going`.
pub type ProgressCallback = Box<dyn Fn(usize, usize) -> bool + Send>;

/// Settings for one executor run.
pub struct PipelineConfig {
    pub workers: usize,
    /// Cap on frames admitted but not yet written.
    pub max_in_flight: usize,
    pub task_timeout: Option<Duration>,
    pub on_progress: Option<ProgressCallback>,
    pub cancelled: Arc<AtomicBool>,
    pub logger: Box<dyn PipelineLogger>,
}

/// What a finished job did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JobReport {
    pub frames_read: usize,
    pub frames_written: usize,
    pub workers: usize,
    /// Frames per outcome label: strategy stage names plus `faulted` and
    /// `timed_out`.
    pub outcomes: BTreeMap<String, usize>,
    pub peak_in_flight: usize,
}

impl JobReport {
    pub fn count(&self, label: &str) -> usize {
        self.outcomes.get(label).copied().unwrap_or(0)
    }
}

/// Drives read → swap → ordered write for a whole stream.
///
/// This is a port; infrastructure provides the concrete scheduler.
pub trait PipelineExecutor: Send {
    /// Opens the encoder, processes every frame from `reader` and closes
    /// both ends. On success exactly `frames_read` frames were written in
    /// index order.
    fn execute(
        &self,
        reader: Box<dyn VideoReader>,
        writer: Box<dyn VideoWriter>,
        processor: Arc<FrameProcessor>,
        metadata: &VideoMetadata,
        output_path: &Path,
        config: PipelineConfig,
    ) -> Result<JobReport, JobError>;
}
