use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::detection::domain::face_locator::FaceLocator;
use crate::shared::error::JobError;
use crate::shared::swap_config::SwapConfig;
use crate::swapping::domain::neural_swap::NeuralSwap;
use crate::swapping::infrastructure::donor_loader::load_donor;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

use super::frame_processor::FrameProcessor;
use super::pipeline_executor::{JobReport, PipelineConfig, PipelineExecutor, ProgressCallback};
use super::pipeline_logger::{NullPipelineLogger, PipelineLogger};

/// Validate the config, load the donor and wire the per-frame processor.
///
/// Shared by the video and still-image jobs; nothing has been opened yet
/// when this fails.
pub(crate) fn prepare_processor(
    config: &SwapConfig,
    locator: &Arc<dyn FaceLocator>,
    neural: Option<Arc<dyn NeuralSwap>>,
    donor_path: &Path,
) -> Result<Arc<FrameProcessor>, JobError> {
    config.validate()?;
    let donor = load_donor(donor_path, locator.as_ref(), config.donor_max_height)?;
    Ok(Arc::new(FrameProcessor::new(
        config,
        Arc::clone(locator),
        neural,
        Arc::new(donor),
    )))
}

/// Orchestrates a whole-video swap job.
///
/// Wires domain components together and delegates execution to a
/// `PipelineExecutor`. Single-use: `execute` consumes the reader and writer,
/// so a second call fails.
pub struct SwapVideoUseCase {
    reader: Option<Box<dyn VideoReader>>,
    writer: Option<Box<dyn VideoWriter>>,
    locator: Arc<dyn FaceLocator>,
    neural: Option<Arc<dyn NeuralSwap>>,
    executor: Box<dyn PipelineExecutor>,
    config: SwapConfig,
    on_progress: Option<ProgressCallback>,
    cancelled: Arc<AtomicBool>,
    logger: Option<Box<dyn PipelineLogger>>,
}

impl SwapVideoUseCase {
    pub fn new(
        reader: Box<dyn VideoReader>,
        writer: Box<dyn VideoWriter>,
        locator: Arc<dyn FaceLocator>,
        executor: Box<dyn PipelineExecutor>,
        config: SwapConfig,
    ) -> Self {
        Self {
            reader: Some(reader),
            writer: Some(writer),
            locator,
            neural: None,
            executor,
            config,
            on_progress: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            logger: None,
        }
    }

    pub fn with_neural(mut self, neural: Arc<dyn NeuralSwap>) -> Self {
        self.neural = Some(neural);
        self
    }

    pub fn with_progress(mut self, on_progress: ProgressCallback) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Swap the face from `donor_path` into every frame of `input_path`.
    ///
    /// The donor is loaded before the decoder is opened, and the executor
    /// opens the encoder before any frame is read.
    pub fn execute(
        &mut self,
        input_path: &Path,
        donor_path: &Path,
        output_path: &Path,
    ) -> Result<JobReport, JobError> {
        let (Some(mut reader), Some(writer)) = (self.reader.take(), self.writer.take()) else {
            return Err(JobError::InvalidConfig("job already executed".into()));
        };

        let processor =
            prepare_processor(&self.config, &self.locator, self.neural.clone(), donor_path)?;

        let metadata = match reader.open(input_path) {
            Ok(m) => m,
            Err(e) => {
                reader.close();
                return Err(JobError::DecoderOpen {
                    path: input_path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        };
        log::info!(
            "Input {}: {}x{} @ {:.2} fps, {} frames",
            input_path.display(),
            metadata.width,
            metadata.height,
            metadata.fps,
            metadata.total_frames
        );

        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let workers = self.config.worker_count(cores, processor.has_neural());
        let config = PipelineConfig {
            workers,
            max_in_flight: self.config.max_in_flight(workers),
            task_timeout: self.config.task_timeout,
            on_progress: self.on_progress.take(),
            cancelled: Arc::clone(&self.cancelled),
            logger: self
                .logger
                .take()
                .unwrap_or_else(|| Box::new(NullPipelineLogger)),
        };

        let report =
            self.executor
                .execute(reader, writer, processor, &metadata, output_path, config)?;
        log::info!(
            "Wrote {} frames to {}",
            report.frames_written,
            output_path.display()
        );
        Ok(report)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::detection::domain::landmark_set::LandmarkSet;
    use crate::pipeline::frame_processor::tests::{geometric_config, StubLocator};
    use crate::pipeline::infrastructure::threaded_swap_executor::tests::{
        Capture, CaptureWriter, VecReader,
    };
    use crate::pipeline::infrastructure::threaded_swap_executor::ThreadedSwapExecutor;
    use crate::shared::test_fixtures::{donor_frame, face_frame, grid_landmarks};
    use crate::video::domain::image_writer::ImageWriter;
    use crate::video::infrastructure::image_file_writer::ImageFileWriter;
    use std::path::PathBuf;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    /// Writes the synthetic donor to a PNG inside a fresh temp dir.
    pub(crate) fn donor_png() -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("donor.png");
        ImageFileWriter::new().write(&path, &donor_frame()).unwrap();
        (dir, path)
    }

    fn use_case(
        reader: VecReader,
        capture: &Arc<Capture>,
        locator: StubLocator,
        config: SwapConfig,
    ) -> SwapVideoUseCase {
        SwapVideoUseCase::new(
            Box::new(reader),
            Box::new(CaptureWriter::new(capture)),
            Arc::new(locator),
            Box::new(ThreadedSwapExecutor::new()),
            config,
        )
    }

    fn run(case: &mut SwapVideoUseCase, donor: &Path) -> Result<JobReport, JobError> {
        case.execute(Path::new("in.mp4"), donor, Path::new("out.mp4"))
    }

    #[test]
    fn test_swaps_every_frame() {
        let (_dir, donor) = donor_png();
        let capture = Arc::new(Capture::default());
        let mut case = use_case(
            VecReader::faces(12),
            &capture,
            StubLocator::fixed(grid_landmarks()),
            geometric_config(),
        );
        let report = run(&mut case, &donor).unwrap();

        assert_eq!(report.frames_read, 12);
        assert_eq!(report.frames_written, 12);
        assert!(report.workers >= 1);
        let written = capture.frames.lock().unwrap();
        assert_eq!(written.len(), 12);
        assert_ne!(written[0], face_frame(0));
    }

    #[test]
    fn test_explicit_workers_reach_executor() {
        let (_dir, donor) = donor_png();
        let capture = Arc::new(Capture::default());
        let config = SwapConfig {
            workers: Some(3),
            ..geometric_config()
        };
        let mut case = use_case(
            VecReader::faces(6),
            &capture,
            StubLocator::fixed(grid_landmarks()),
            config,
        );
        let report = run(&mut case, &donor).unwrap();
        assert_eq!(report.workers, 3);
        assert!(report.peak_in_flight <= 9);
    }

    #[test]
    fn test_invalid_config_fails_before_io() {
        let (_dir, donor) = donor_png();
        let capture = Arc::new(Capture::default());
        let config = SwapConfig {
            smoothing: 200,
            ..geometric_config()
        };
        let mut case = use_case(
            VecReader::faces(3),
            &capture,
            StubLocator::fixed(grid_landmarks()),
            config,
        );
        let err = run(&mut case, &donor).unwrap_err();
        assert!(matches!(err, JobError::InvalidConfig(_)));
        assert!(!capture.opened.load(Ordering::SeqCst));
    }

    #[test]
    fn test_missing_donor_is_unreadable() {
        let capture = Arc::new(Capture::default());
        let mut case = use_case(
            VecReader::faces(3),
            &capture,
            StubLocator::fixed(grid_landmarks()),
            geometric_config(),
        );
        let err = run(&mut case, Path::new("/nonexistent/donor.png")).unwrap_err();
        assert!(matches!(err, JobError::DonorUnreadable { .. }));
        assert!(!capture.opened.load(Ordering::SeqCst));
    }

    #[test]
    fn test_faceless_donor_fails_before_decoder_opens() {
        let (_dir, donor) = donor_png();
        let capture = Arc::new(Capture::default());
        let reader = VecReader {
            fail_open: true,
            ..VecReader::faces(3)
        };
        let mut case = use_case(
            reader,
            &capture,
            StubLocator::fixed(LandmarkSet::empty()),
            geometric_config(),
        );
        let err = run(&mut case, &donor).unwrap_err();
        assert!(matches!(err, JobError::DonorNoFace { .. }));
    }

    #[test]
    fn test_decoder_open_failure() {
        let (_dir, donor) = donor_png();
        let capture = Arc::new(Capture::default());
        let reader = VecReader {
            fail_open: true,
            ..VecReader::faces(3)
        };
        let mut case = use_case(
            reader,
            &capture,
            StubLocator::fixed(grid_landmarks()),
            geometric_config(),
        );
        match run(&mut case, &donor) {
            Err(JobError::DecoderOpen { path, .. }) => assert_eq!(path, PathBuf::from("in.mp4")),
            other => panic!("expected decoder open failure, got {other:?}"),
        }
        assert!(!capture.opened.load(Ordering::SeqCst));
    }

    #[test]
    fn test_second_execute_fails() {
        let (_dir, donor) = donor_png();
        let capture = Arc::new(Capture::default());
        let mut case = use_case(
            VecReader::faces(2),
            &capture,
            StubLocator::fixed(grid_landmarks()),
            geometric_config(),
        );
        assert!(run(&mut case, &donor).is_ok());
        assert!(matches!(
            run(&mut case, &donor),
            Err(JobError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_cancel_flag_is_shared_with_executor() {
        let (_dir, donor) = donor_png();
        let capture = Arc::new(Capture::default());
        let flag = Arc::new(AtomicBool::new(true));
        let mut case = use_case(
            VecReader::faces(10),
            &capture,
            StubLocator::fixed(grid_landmarks()),
            geometric_config(),
        )
        .with_cancel_flag(Arc::clone(&flag));
        assert!(matches!(run(&mut case, &donor), Err(JobError::Cancelled)));
    }

    #[test]
    fn test_progress_reaches_total() {
        let (_dir, donor) = donor_png();
        let capture = Arc::new(Capture::default());
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut case = use_case(
            VecReader::faces(5),
            &capture,
            StubLocator::fixed(grid_landmarks()),
            geometric_config(),
        )
        .with_progress(Box::new(move |current, total| {
            sink.lock().unwrap().push((current, total));
            true
        }));
        run(&mut case, &donor).unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 5);
        assert_eq!(seen.last(), Some(&(5, 5)));
    }
}
