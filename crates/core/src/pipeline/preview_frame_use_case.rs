use std::path::Path;
use std::sync::Arc;

use crate::detection::domain::face_locator::FaceLocator;
use crate::shared::error::JobError;
use crate::shared::frame::Frame;
use crate::shared::swap_config::SwapConfig;
use crate::swapping::domain::neural_swap::NeuralSwap;
use crate::video::domain::image_writer::ImageWriter;
use crate::video::domain::video_reader::VideoReader;

use super::pipeline_executor::JobReport;
use super::swap_video_use_case::prepare_processor;

/// Swaps a single frame from the middle of a video and saves it as an
/// image, so settings can be checked before committing to a full run.
pub struct PreviewFrameUseCase {
    reader: Box<dyn VideoReader>,
    image_writer: Box<dyn ImageWriter>,
    locator: Arc<dyn FaceLocator>,
    neural: Option<Arc<dyn NeuralSwap>>,
    config: SwapConfig,
}

impl PreviewFrameUseCase {
    pub fn new(
        reader: Box<dyn VideoReader>,
        image_writer: Box<dyn ImageWriter>,
        locator: Arc<dyn FaceLocator>,
        neural: Option<Arc<dyn NeuralSwap>>,
        config: SwapConfig,
    ) -> Self {
        Self {
            reader,
            image_writer,
            locator,
            neural,
            config,
        }
    }

    /// Swap frame `total_frames / 2` of `input_path` and write it to
    /// `output_path`. A stream shorter than its header claims falls back to
    /// the last frame decoded.
    pub fn execute(
        &mut self,
        input_path: &Path,
        donor_path: &Path,
        output_path: &Path,
    ) -> Result<JobReport, JobError> {
        let processor =
            prepare_processor(&self.config, &self.locator, self.neural.clone(), donor_path)?;

        let metadata = self
            .reader
            .open(input_path)
            .map_err(|e| JobError::DecoderOpen {
                path: input_path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let target = metadata.total_frames / 2;
        let picked = self.seek(target);
        self.reader.close();
        let (frame, frames_read) = picked?;

        if frame.index() != target {
            log::warn!(
                "Preview: stream ended at frame {}, expected {} frames",
                frame.index(),
                metadata.total_frames
            );
        }

        let index = frame.index();
        let result = processor.process_guarded(frame, self.config.task_timeout);
        let label = result.status.label();
        log::info!("Preview of frame {index}: {label}");

        self.image_writer
            .write(output_path, &result.frame)
            .map_err(|e| JobError::Sink {
                index,
                reason: e.to_string(),
            })?;
        log::info!("Preview saved to {}", output_path.display());

        let mut report = JobReport {
            frames_read,
            frames_written: 1,
            workers: 1,
            peak_in_flight: 1,
            ..JobReport::default()
        };
        report.outcomes.insert(label.to_string(), 1);
        Ok(report)
    }

    /// Decode up to frame `target`, returning it (or the last frame before
    /// the stream ended) with the number of frames read.
    fn seek(&mut self, target: usize) -> Result<(Frame, usize), JobError> {
        let mut last = None;
        let mut frames_read = 0;
        for item in self.reader.frames().take(target + 1) {
            let frame = item.map_err(|e| JobError::Decode {
                frames_read,
                reason: e.to_string(),
            })?;
            frames_read += 1;
            last = Some(frame);
        }
        match last {
            Some(frame) => Ok((frame, frames_read)),
            None => Err(JobError::Decode {
                frames_read: 0,
                reason: "video contains no frame".into(),
            }),
        }
    }
}
