use std::path::Path;
use std::sync::Arc;

use crate::detection::domain::face_locator::FaceLocator;
use crate::shared::error::JobError;
use crate::shared::swap_config::SwapConfig;
use crate::swapping::domain::neural_swap::NeuralSwap;
use crate::video::domain::image_writer::ImageWriter;
use crate::video::domain::video_reader::VideoReader;

use super::pipeline_executor::JobReport;
use super::swap_video_use_case::prepare_processor;

/// Single-image swap: read → locate → swap → harmonize → write.
///
/// Runs on the calling thread with the same task boundary as the video
/// workers, so a panicking or stalled swap still writes the input back.
pub struct SwapImageUseCase {
    reader: Box<dyn VideoReader>,
    image_writer: Box<dyn ImageWriter>,
    locator: Arc<dyn FaceLocator>,
    neural: Option<Arc<dyn NeuralSwap>>,
    config: SwapConfig,
}

impl SwapImageUseCase {
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

    pub fn execute(
        &mut self,
        input_path: &Path,
        donor_path: &Path,
        output_path: &Path,
    ) -> Result<JobReport, JobError> {
        let processor =
            prepare_processor(&self.config, &self.locator, self.neural.clone(), donor_path)?;

        self.reader
            .open(input_path)
            .map_err(|e| JobError::DecoderOpen {
                path: input_path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let first = self.reader.frames().next();
        self.reader.close();
        let frame = match first {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                return Err(JobError::Decode {
                    frames_read: 0,
                    reason: e.to_string(),
                })
            }
            None => {
                return Err(JobError::Decode {
                    frames_read: 0,
                    reason: "image contains no frame".into(),
                })
            }
        };

        let result = processor.process_guarded(frame, self.config.task_timeout);
        let label = result.status.label();
        log::info!("Image {}: {label}", input_path.display());

        self.image_writer
            .write(output_path, &result.frame)
            .map_err(|e| JobError::Sink {
                index: 0,
                reason: e.to_string(),
            })?;

        let mut report = JobReport {
            frames_read: 1,
            frames_written: 1,
            workers: 1,
            peak_in_flight: 1,
            ..JobReport::default()
        };
        report.outcomes.insert(label.to_string(), 1);
        Ok(report)
    }
}
