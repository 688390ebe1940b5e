use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::constants::{
    DEFAULT_DONOR_MAX_HEIGHT, DEFAULT_FAILURE_EPSILON, DEFAULT_IN_FLIGHT_PER_WORKER,
    DEFAULT_MIN_TRIANGLES, DEFAULT_SMOOTHING, DEFAULT_TASK_TIMEOUT_SECS, NEURAL_WORKER_CAP,
};
use super::error::JobError;

/// Which strategy the swap chain starts from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Engine {
    #[default]
    Neural,
    Geometric,
}

impl Engine {
    /// Parallelism ceiling for this engine. The neural model holds heavy
    /// in-process state, so only a couple of workers may share it.
    pub fn worker_cap(self) -> Option<usize> {
        match self {
            Engine::Neural => Some(NEURAL_WORKER_CAP),
            Engine::Geometric => None,
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Engine::Neural => write!(f, "neural"),
            Engine::Geometric => write!(f, "geometric"),
        }
    }
}

impl FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "neural" => Ok(Engine::Neural),
            "geometric" => Ok(Engine::Geometric),
            other => Err(format!("unknown engine '{other}' (expected neural or geometric)")),
        }
    }
}

/// Face detector provider used by the locator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DetectorKind {
    #[default]
    Fine,
    Coarse,
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorKind::Fine => write!(f, "fine"),
            DetectorKind::Coarse => write!(f, "coarse"),
        }
    }
}

impl FromStr for DetectorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fine" => Ok(DetectorKind::Fine),
            "coarse" => Ok(DetectorKind::Coarse),
            other => Err(format!("unknown detector '{other}' (expected fine or coarse)")),
        }
    }
}

/// Job configuration, resolved once before the run and never mutated while
/// frames are in flight.
#[derive(Clone, Debug, PartialEq)]
pub struct SwapConfig {
    pub engine: Engine,
    pub detector: DetectorKind,
    pub multiscale: bool,
    pub color_correction: bool,
    /// Mask feathering strength, 0..=100.
    pub smoothing: u8,
    pub failure_epsilon: f64,
    pub min_triangles: usize,
    /// Explicit worker count; `None` picks one from the core count.
    pub workers: Option<usize>,
    pub in_flight_per_worker: usize,
    pub task_timeout: Option<Duration>,
    pub donor_max_height: u32,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            engine: Engine::default(),
            detector: DetectorKind::default(),
            multiscale: false,
            color_correction: true,
            smoothing: DEFAULT_SMOOTHING,
            failure_epsilon: DEFAULT_FAILURE_EPSILON,
            min_triangles: DEFAULT_MIN_TRIANGLES,
            workers: None,
            in_flight_per_worker: DEFAULT_IN_FLIGHT_PER_WORKER,
            task_timeout: Some(Duration::from_secs(DEFAULT_TASK_TIMEOUT_SECS)),
            donor_max_height: DEFAULT_DONOR_MAX_HEIGHT,
        }
    }
}

impl SwapConfig {
    pub fn validate(&self) -> Result<(), JobError> {
        if self.smoothing > 100 {
            return Err(JobError::InvalidConfig(format!(
                "smoothing must be between 0 and 100, got {}",
                self.smoothing
            )));
        }
        if !self.failure_epsilon.is_finite() || self.failure_epsilon < 0.0 {
            return Err(JobError::InvalidConfig(format!(
                "failure epsilon must be a non-negative number, got {}",
                self.failure_epsilon
            )));
        }
        if self.in_flight_per_worker == 0 {
            return Err(JobError::InvalidConfig(
                "in-flight tasks per worker must be at least 1".into(),
            ));
        }
        if self.workers == Some(0) {
            return Err(JobError::InvalidConfig("worker count must be at least 1".into()));
        }
        if self.donor_max_height == 0 {
            return Err(JobError::InvalidConfig("donor max height must be at least 1".into()));
        }
        if self.task_timeout == Some(Duration::ZERO) {
            return Err(JobError::InvalidConfig("task timeout must be positive".into()));
        }
        Ok(())
    }

    /// Odd Gaussian kernel size used to feather compositing masks.
    pub fn feather_kernel(&self) -> usize {
        2 * (self.smoothing.min(100) as usize * 7 / 50) + 1
    }

    /// Worker pool size: the explicit count if configured, otherwise
    /// `available_cores`, clamped to the engine cap. The neural cap only
    /// applies when a neural swapper is actually loaded, and it bounds an
    /// explicit count too.
    pub fn worker_count(&self, available_cores: usize, neural_loaded: bool) -> usize {
        let requested = self.workers.unwrap_or(available_cores).max(1);
        match self.engine.worker_cap() {
            Some(cap) if neural_loaded => requested.min(cap),
            _ => requested,
        }
    }

    pub fn max_in_flight(&self, workers: usize) -> usize {
        workers.max(1) * self.in_flight_per_worker.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults_validate() {
        assert!(SwapConfig::default().validate().is_ok());
    }

    #[rstest]
    #[case::smoothing(SwapConfig { smoothing: 101, ..SwapConfig::default() })]
    #[case::negative_epsilon(SwapConfig { failure_epsilon: -1.0, ..SwapConfig::default() })]
    #[case::nan_epsilon(SwapConfig { failure_epsilon: f64::NAN, ..SwapConfig::default() })]
    #[case::zero_in_flight(SwapConfig { in_flight_per_worker: 0, ..SwapConfig::default() })]
    #[case::zero_workers(SwapConfig { workers: Some(0), ..SwapConfig::default() })]
    #[case::zero_timeout(SwapConfig { task_timeout: Some(Duration::ZERO), ..SwapConfig::default() })]
    fn test_validate_rejects(#[case] config: SwapConfig) {
        assert!(matches!(config.validate(), Err(JobError::InvalidConfig(_))));
    }

    #[rstest]
    #[case(0, 1)]
    #[case(50, 15)]
    #[case(100, 29)]
    fn test_feather_kernel(#[case] smoothing: u8, #[case] expected: usize) {
        let config = SwapConfig {
            smoothing,
            ..SwapConfig::default()
        };
        assert_eq!(config.feather_kernel(), expected);
    }

    #[rstest]
    #[case::neural_capped(Engine::Neural, true, 8, 2)]
    #[case::neural_few_cores(Engine::Neural, true, 1, 1)]
    #[case::neural_missing_model(Engine::Neural, false, 8, 8)]
    #[case::geometric_uncapped(Engine::Geometric, false, 8, 8)]
    fn test_worker_count(
        #[case] engine: Engine,
        #[case] neural_loaded: bool,
        #[case] cores: usize,
        #[case] expected: usize,
    ) {
        let config = SwapConfig {
            engine,
            ..SwapConfig::default()
        };
        assert_eq!(config.worker_count(cores, neural_loaded), expected);
    }

    #[rstest]
    #[case::geometric_explicit(Engine::Geometric, true, 5, 5)]
    #[case::neural_explicit_capped(Engine::Neural, true, 16, NEURAL_WORKER_CAP)]
    #[case::neural_explicit_below_cap(Engine::Neural, true, 1, 1)]
    #[case::neural_missing_model_explicit(Engine::Neural, false, 16, 16)]
    #[case::zero_means_one(Engine::Geometric, false, 0, 1)]
    fn test_explicit_workers(
        #[case] engine: Engine,
        #[case] neural_loaded: bool,
        #[case] workers: usize,
        #[case] expected: usize,
    ) {
        let config = SwapConfig {
            engine,
            workers: Some(workers),
            ..SwapConfig::default()
        };
        assert_eq!(config.worker_count(4, neural_loaded), expected);
    }

    #[test]
    fn test_max_in_flight_scales_with_workers() {
        let config = SwapConfig {
            workers: Some(5),
            ..SwapConfig::default()
        };
        assert_eq!(config.max_in_flight(5), 15);
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("Geometric".parse::<Engine>(), Ok(Engine::Geometric));
        assert_eq!("coarse".parse::<DetectorKind>(), Ok(DetectorKind::Coarse));
        assert!("dlib".parse::<DetectorKind>().is_err());
        assert_eq!(Engine::Neural.to_string(), "neural");
    }
}
