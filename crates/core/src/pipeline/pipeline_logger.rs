use std::collections::BTreeMap;
use std::time::Instant;

/// Cross-cutting logger for job orchestration events.
///
/// Decouples the executor from where progress and statistics end up (log
/// crate, a GUI, nowhere), so callers observe a job without changing it.
pub trait PipelineLogger: Send {
    /// Report frame-level progress.
    fn progress(&mut self, current: usize, total: usize);

    /// Record how long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. tasks in flight).
    fn metric(&mut self, name: &str, value: f64);

    /// Count one occurrence of a named outcome (e.g. the strategy that won).
    fn count(&mut self, name: &str);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-job summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events. Used by tests and by callers
/// with their own progress reporting.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn count(&mut self, _name: &str) {}
    fn info(&mut self, _message: &str) {}
}

/// Logger backed by the `log` facade.
///
/// Progress lines are throttled to every `throttle_frames` frames; timings,
/// metrics and counts are aggregated into the summary.
pub struct LogPipelineLogger {
    throttle_frames: usize,
    timings: BTreeMap<String, Vec<f64>>,
    metrics: BTreeMap<String, Vec<f64>>,
    counts: BTreeMap<String, usize>,
    start_time: Instant,
    frames_done: usize,
}

impl LogPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
            counts: BTreeMap::new(),
            start_time: Instant::now(),
            frames_done: 0,
        }
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() && self.counts.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let frames = self.frames_done;
        let mut lines = vec![format!(
            "Job summary ({frames} frames, {:.1}s total):",
            elapsed_ms / 1000.0
        )];

        for (stage, durations) in &self.timings {
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = total_ms / durations.len().max(1) as f64;
            lines.push(format!("  {stage:12}: avg {avg_ms:6.1}ms  total {total_ms:7.0}ms"));
        }

        for (name, values) in &self.metrics {
            let avg = values.iter().sum::<f64>() / values.len().max(1) as f64;
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            lines.push(format!("  {name}: avg {avg:.1}, max {max:.0}"));
        }

        if !self.counts.is_empty() {
            let histogram: Vec<String> = self
                .counts
                .iter()
                .map(|(name, n)| format!("{name}={n}"))
                .collect();
            lines.push(format!("  Outcomes: {}", histogram.join(", ")));
        }

        if frames > 0 && elapsed_ms > 0.0 {
            let fps = frames as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    pub fn count_of(&self, name: &str) -> usize {
        self.counts.get(name).copied().unwrap_or(0)
    }
}

impl Default for LogPipelineLogger {
    fn default() -> Self {
        Self::new(25)
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames_done = current;
        if current % self.throttle_frames != 0 && current != total {
            return;
        }
        if total > 0 {
            let pct = current as f64 / total as f64 * 100.0;
            log::info!("Processing: {current}/{total} frames ({pct:.1}%)");
        } else {
            log::info!("Processing: {current} frames");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn count(&mut self, name: &str) {
        *self.counts.entry(name.to_string()).or_default() += 1;
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_logger_all_methods_are_noop() {
        let mut logger = NullPipelineLogger;
        logger.progress(1, 10);
        logger.timing("swap", 5.0);
        logger.metric("in_flight", 3.0);
        logger.count("geometric");
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_timing_records_values() {
        let mut logger = LogPipelineLogger::new(10);
        logger.timing("swap", 20.0);
        logger.timing("swap", 30.0);
        logger.timing("write", 5.0);

        assert_eq!(logger.timings_for("swap"), Some(&[20.0, 30.0][..]));
        assert_eq!(logger.timings_for("write").map(|v| v.len()), Some(1));
        assert!(logger.timings_for("locate").is_none());
    }

    #[test]
    fn test_metric_records_values() {
        let mut logger = LogPipelineLogger::new(10);
        logger.metric("in_flight", 3.0);
        logger.metric("in_flight", 4.0);

        let values = logger.metrics_for("in_flight").unwrap();
        let avg = values.iter().sum::<f64>() / values.len() as f64;
        assert_relative_eq!(avg, 3.5);
    }

    #[test]
    fn test_counts_accumulate() {
        let mut logger = LogPipelineLogger::new(10);
        logger.count("geometric");
        logger.count("geometric");
        logger.count("passthrough");
        assert_eq!(logger.count_of("geometric"), 2);
        assert_eq!(logger.count_of("passthrough"), 1);
        assert_eq!(logger.count_of("neural"), 0);
    }

    #[test]
    fn test_summary_contents() {
        let mut logger = LogPipelineLogger::new(10);
        logger.progress(10, 10);
        logger.timing("swap", 20.0);
        logger.metric("in_flight", 3.0);
        logger.metric("in_flight", 4.0);
        logger.count("simple");

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("Job summary (10 frames"));
        assert!(summary.contains("swap"));
        assert!(summary.contains("in_flight: avg 3.5, max 4"));
        assert!(summary.contains("simple=1"));
        assert!(summary.contains("fps"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(LogPipelineLogger::new(10).summary_string().is_none());
    }

    #[test]
    fn test_progress_tracks_frames_done() {
        let mut logger = LogPipelineLogger::new(10);
        for i in 1..=20 {
            logger.progress(i, 0);
        }
        assert_eq!(logger.frames_done, 20);
    }

    #[test]
    fn test_default_throttle() {
        assert_eq!(LogPipelineLogger::default().throttle_frames, 25);
    }
}
