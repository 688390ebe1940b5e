pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// Donor images taller than this are downscaled before landmarking.
pub const DEFAULT_DONOR_MAX_HEIGHT: u32 = 720;

/// Mean absolute channel difference below which a strategy counts as a no-op.
pub const DEFAULT_FAILURE_EPSILON: f64 = 5.0;

/// Fewer Delaunay triangles than this means the landmarks are unreliable.
pub const DEFAULT_MIN_TRIANGLES: usize = 10;

pub const DEFAULT_SMOOTHING: u8 = 50;

/// Submitted-but-unfinished tasks allowed per worker.
pub const DEFAULT_IN_FLIGHT_PER_WORKER: usize = 3;

/// Worker ceiling while the neural engine is active.
pub const NEURAL_WORKER_CAP: usize = 2;

pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 120;

/// Timed-out swaps still running in the background before new frames skip
/// the swap entirely.
pub const MAX_OVERRUNNING_TASKS: usize = 4;

/// Suffix appended to the input stem when no output path is given.
pub const OUTPUT_SUFFIX: &str = "_face_swap";
