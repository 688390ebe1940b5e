use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use faceswap_core::shared::constants::{
    DEFAULT_DONOR_MAX_HEIGHT, DEFAULT_FAILURE_EPSILON, DEFAULT_IN_FLIGHT_PER_WORKER,
    DEFAULT_MIN_TRIANGLES, DEFAULT_SMOOTHING, DEFAULT_TASK_TIMEOUT_SECS,
};
use faceswap_core::shared::swap_config::{DetectorKind, Engine, SwapConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineSetting {
    Neural,
    Geometric,
}

impl From<EngineSetting> for Engine {
    fn from(value: EngineSetting) -> Self {
        match value {
            EngineSetting::Neural => Engine::Neural,
            EngineSetting::Geometric => Engine::Geometric,
        }
    }
}

impl From<Engine> for EngineSetting {
    fn from(value: Engine) -> Self {
        match value {
            Engine::Neural => EngineSetting::Neural,
            Engine::Geometric => EngineSetting::Geometric,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorSetting {
    Fine,
    Coarse,
}

impl From<DetectorSetting> for DetectorKind {
    fn from(value: DetectorSetting) -> Self {
        match value {
            DetectorSetting::Fine => DetectorKind::Fine,
            DetectorSetting::Coarse => DetectorKind::Coarse,
        }
    }
}

impl From<DetectorKind> for DetectorSetting {
    fn from(value: DetectorKind) -> Self {
        match value {
            DetectorKind::Fine => DetectorSetting::Fine,
            DetectorKind::Coarse => DetectorSetting::Coarse,
        }
    }
}

/// Model files. Detector and landmark models are required; the swap and
/// embedding models are only needed for the neural engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelPaths {
    pub detector: Option<PathBuf>,
    pub landmarks: Option<PathBuf>,
    pub swap: Option<PathBuf>,
    pub embedding: Option<PathBuf>,
}

/// JSON settings file. Every field is optional in the file; missing ones
/// take the job defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineSetting,
    pub detector: DetectorSetting,
    pub multiscale: bool,
    pub color_correction: bool,
    pub smoothing: u8,
    pub failure_epsilon: f64,
    pub min_triangles: usize,
    pub workers: Option<usize>,
    pub in_flight_per_worker: usize,
    /// `null` disables the per-frame timeout.
    pub task_timeout_secs: Option<u64>,
    pub donor_max_height: u32,
    pub models: ModelPaths,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine: EngineSetting::Neural,
            detector: DetectorSetting::Fine,
            multiscale: false,
            color_correction: true,
            smoothing: DEFAULT_SMOOTHING,
            failure_epsilon: DEFAULT_FAILURE_EPSILON,
            min_triangles: DEFAULT_MIN_TRIANGLES,
            workers: None,
            in_flight_per_worker: DEFAULT_IN_FLIGHT_PER_WORKER,
            task_timeout_secs: Some(DEFAULT_TASK_TIMEOUT_SECS),
            donor_max_height: DEFAULT_DONOR_MAX_HEIGHT,
            models: ModelPaths::default(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let json = fs::read_to_string(path)
            .map_err(|e| format!("Cannot read settings {}: {e}", path.display()))?;
        let settings = serde_json::from_str(&json)
            .map_err(|e| format!("Invalid settings {}: {e}", path.display()))?;
        Ok(settings)
    }

    pub fn to_swap_config(&self) -> SwapConfig {
        SwapConfig {
            engine: self.engine.into(),
            detector: self.detector.into(),
            multiscale: self.multiscale,
            color_correction: self.color_correction,
            smoothing: self.smoothing,
            failure_epsilon: self.failure_epsilon,
            min_triangles: self.min_triangles,
            workers: self.workers,
            in_flight_per_worker: self.in_flight_per_worker,
            task_timeout: self.task_timeout_secs.map(Duration::from_secs),
            donor_max_height: self.donor_max_height,
        }
    }
}
