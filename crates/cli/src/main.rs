mod settings;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;

use faceswap_core::detection::domain::face_locator::FaceLocator;
use faceswap_core::detection::infrastructure::locator_factory::{create_locator, LocatorModels};
use faceswap_core::pipeline::infrastructure::threaded_swap_executor::ThreadedSwapExecutor;
use faceswap_core::pipeline::pipeline_executor::{JobReport, ProgressCallback};
use faceswap_core::pipeline::pipeline_logger::LogPipelineLogger;
use faceswap_core::pipeline::preview_frame_use_case::PreviewFrameUseCase;
use faceswap_core::pipeline::swap_image_use_case::SwapImageUseCase;
use faceswap_core::pipeline::swap_video_use_case::SwapVideoUseCase;
use faceswap_core::shared::constants::{IMAGE_EXTENSIONS, OUTPUT_SUFFIX};
use faceswap_core::shared::swap_config::{DetectorKind, Engine, SwapConfig};
use faceswap_core::swapping::domain::neural_swap::NeuralSwap;
use faceswap_core::swapping::infrastructure::onnx_face_swapper::OnnxFaceSwapper;
use faceswap_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use faceswap_core::video::domain::video_reader::VideoReader;
use faceswap_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;
use faceswap_core::video::infrastructure::image_file_reader::ImageFileReader;
use faceswap_core::video::infrastructure::image_file_writer::ImageFileWriter;

use settings::Settings;

/// Replace the face in every frame of a video (or in a still image) with
/// the face from a donor image.
#[derive(Parser)]
#[command(name = "face-swap")]
struct Cli {
    /// Input video or image file.
    input: PathBuf,

    /// Donor image containing the face to insert.
    donor: PathBuf,

    /// Output file. Defaults to `<input>_face_swap.<ext>` next to the input.
    output: Option<PathBuf>,

    /// JSON settings file. Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only swap the middle frame and save it to this image file.
    #[arg(long, value_name = "IMAGE")]
    preview: Option<PathBuf>,

    /// Swap engine: neural or geometric.
    #[arg(long)]
    engine: Option<Engine>,

    /// Face detector: fine or coarse.
    #[arg(long)]
    detector: Option<DetectorKind>,

    /// Also detect on overlapping tiles (slower, finds smaller faces).
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    multiscale: Option<bool>,

    /// Match swapped face colors to the original frame.
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    color_correction: Option<bool>,

    /// Mask edge smoothing (0-100).
    #[arg(long)]
    smoothing: Option<u8>,

    /// Mean pixel difference below which a swap counts as a no-op.
    #[arg(long)]
    failure_epsilon: Option<f64>,

    /// Minimum triangles for the geometric warp to trust the landmarks.
    #[arg(long)]
    min_triangles: Option<usize>,

    /// Worker threads (default: available cores, capped for the neural engine).
    #[arg(long)]
    workers: Option<usize>,

    /// Frames allowed in flight per worker.
    #[arg(long)]
    in_flight_per_worker: Option<usize>,

    /// Per-frame time budget in seconds (0 disables it).
    #[arg(long)]
    task_timeout: Option<u64>,

    /// Donor images taller than this are downscaled first.
    #[arg(long)]
    donor_max_height: Option<u32>,

    /// Face detector ONNX model.
    #[arg(long)]
    detector_model: Option<PathBuf>,

    /// 68-point landmark ONNX model.
    #[arg(long)]
    landmark_model: Option<PathBuf>,

    /// Neural face swap ONNX model.
    #[arg(long)]
    swap_model: Option<PathBuf>,

    /// Identity embedding ONNX model used by the neural engine.
    #[arg(long)]
    embedding_model: Option<PathBuf>,
}

impl Cli {
    /// Overlay every flag that was given onto `settings`.
    fn apply(&self, settings: &mut Settings) {
        if let Some(engine) = self.engine {
            settings.engine = engine.into();
        }
        if let Some(detector) = self.detector {
            settings.detector = detector.into();
        }
        if let Some(v) = self.multiscale {
            settings.multiscale = v;
        }
        if let Some(v) = self.color_correction {
            settings.color_correction = v;
        }
        if let Some(v) = self.smoothing {
            settings.smoothing = v;
        }
        if let Some(v) = self.failure_epsilon {
            settings.failure_epsilon = v;
        }
        if let Some(v) = self.min_triangles {
            settings.min_triangles = v;
        }
        if self.workers.is_some() {
            settings.workers = self.workers;
        }
        if let Some(v) = self.in_flight_per_worker {
            settings.in_flight_per_worker = v;
        }
        if let Some(secs) = self.task_timeout {
            settings.task_timeout_secs = (secs > 0).then_some(secs);
        }
        if let Some(v) = self.donor_max_height {
            settings.donor_max_height = v;
        }
        let models = &mut settings.models;
        for (flag, slot) in [
            (&self.detector_model, &mut models.detector),
            (&self.landmark_model, &mut models.landmarks),
            (&self.swap_model, &mut models.swap),
            (&self.embedding_model, &mut models.embedding),
        ] {
            if flag.is_some() {
                slot.clone_from(flag);
            }
        }
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    cli.apply(&mut settings);
    validate(&cli, &settings)?;

    let config = settings.to_swap_config();
    config.validate()?;

    let output = match &cli.output {
        Some(path) => path.clone(),
        None => default_output_path(&cli.input, unix_now()),
    };

    let locator = build_locator(&settings, &config)?;
    let neural = build_neural(&settings, &config);

    if let Some(preview) = &cli.preview {
        let reader: Box<dyn VideoReader> = if is_image(&cli.input) {
            Box::new(ImageFileReader::new())
        } else {
            Box::new(FfmpegReader::new())
        };
        let mut use_case = PreviewFrameUseCase::new(
            reader,
            Box::new(ImageFileWriter::new()),
            locator,
            neural,
            config,
        );
        let report = use_case.execute(&cli.input, &cli.donor, preview)?;
        log::info!("Preview outcome: {:?}", report.outcomes);
        return Ok(());
    }

    let report = if is_image(&cli.input) {
        let mut use_case = SwapImageUseCase::new(
            Box::new(ImageFileReader::new()),
            Box::new(ImageFileWriter::new()),
            locator,
            neural,
            config,
        );
        use_case.execute(&cli.input, &cli.donor, &output)?
    } else {
        run_video(&cli.input, &cli.donor, &output, locator, neural, config)?
    };

    log::info!("Outcomes: {:?}", report.outcomes);
    log::info!("Output written to {}", output.display());
    Ok(())
}

fn run_video(
    input: &Path,
    donor: &Path,
    output: &Path,
    locator: Arc<dyn FaceLocator>,
    neural: Option<Arc<dyn NeuralSwap>>,
    config: SwapConfig,
) -> Result<JobReport, Box<dyn std::error::Error>> {
    let progress: ProgressCallback = Box::new(|current, total| {
        eprint!("\rSwapping frame {current}/{total}");
        true
    });

    let mut use_case = SwapVideoUseCase::new(
        Box::new(FfmpegReader::new()),
        Box::new(FfmpegWriter::new()),
        locator,
        Box::new(ThreadedSwapExecutor::new()),
        config,
    )
    .with_progress(progress)
    .with_logger(Box::new(LogPipelineLogger::default()));
    if let Some(neural) = neural {
        use_case = use_case.with_neural(neural);
    }

    let result = use_case.execute(input, donor, output);
    eprintln!();
    Ok(result?)
}

fn build_locator(
    settings: &Settings,
    config: &SwapConfig,
) -> Result<Arc<dyn FaceLocator>, Box<dyn std::error::Error>> {
    let models = &settings.models;
    let (Some(detector), Some(landmarks)) = (&models.detector, &models.landmarks) else {
        return Err("--detector-model and --landmark-model are required".into());
    };
    let locator = create_locator(
        config.detector,
        LocatorModels {
            detector: detector.as_path(),
            landmarks: landmarks.as_path(),
        },
        config.multiscale,
    )?;
    Ok(Arc::from(locator))
}

/// Loads the neural swapper when the engine asks for it. Missing or broken
/// models leave the neural stage unavailable and the chain starts at the
/// geometric warp.
fn build_neural(settings: &Settings, config: &SwapConfig) -> Option<Arc<dyn NeuralSwap>> {
    if config.engine != Engine::Neural {
        return None;
    }
    let (Some(swap), Some(embedding)) = (&settings.models.swap, &settings.models.embedding) else {
        log::warn!("Neural engine selected but no swap/embedding models given; using geometric");
        return None;
    };
    match OnnxFaceSwapper::new(swap, embedding) {
        Ok(swapper) => Some(Arc::new(swapper)),
        Err(e) => {
            log::warn!("Neural swap unavailable ({e}); using geometric");
            None
        }
    }
}

fn validate(cli: &Cli, settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.exists() {
        return Err(format!("Input file not found: {}", cli.input.display()).into());
    }
    if !cli.donor.exists() {
        return Err(format!("Donor image not found: {}", cli.donor.display()).into());
    }
    if !is_image(&cli.donor) {
        return Err(format!("Donor must be an image, got {}", cli.donor.display()).into());
    }
    if let Some(preview) = cli.preview.as_deref().filter(|p| !is_image(p)) {
        return Err(format!("Preview must be an image file, got {}", preview.display()).into());
    }
    for path in [&settings.models.detector, &settings.models.landmarks]
        .into_iter()
        .flatten()
    {
        if !path.exists() {
            return Err(format!("Model not found: {}", path.display()).into());
        }
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// `<dir>/<stem>_face_swap.<ext>`, or `<stem>_face_swap_<timestamp>.<ext>`
/// when that file already exists.
fn default_output_path(input: &Path, timestamp: u64) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let with_ext = |name: String| match input.extension() {
        Some(ext) => input.with_file_name(format!("{name}.{}", ext.to_string_lossy())),
        None => input.with_file_name(name),
    };
    let candidate = with_ext(format!("{stem}{OUTPUT_SUFFIX}"));
    if candidate.exists() {
        with_ext(format!("{stem}{OUTPUT_SUFFIX}_{timestamp}"))
    } else {
        candidate
    }
}
