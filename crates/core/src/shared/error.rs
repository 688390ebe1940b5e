use std::path::PathBuf;

use thiserror::Error;

/// Error type for adapters whose failures may cross worker threads.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures that stop a whole job.
///
/// Per-frame problems never show up here: they are absorbed by the swap
/// strategy chain or the task boundary and the frame is passed through.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot open input {}: {reason}", path.display())]
    DecoderOpen { path: PathBuf, reason: String },

    #[error("cannot open output {}: {reason}", path.display())]
    EncoderOpen { path: PathBuf, reason: String },

    #[error("donor image {} is unreadable: {reason}", path.display())]
    DonorUnreadable { path: PathBuf, reason: String },

    #[error("no face detected in donor image {}", path.display())]
    DonorNoFace { path: PathBuf },

    #[error("decoding failed after {frames_read} frames: {reason}")]
    Decode { frames_read: usize, reason: String },

    #[error("writing frame {index} failed: {reason}")]
    Sink { index: usize, reason: String },

    #[error("ordering fault: frame {next_expected} never arrived (still buffered: {buffered:?})")]
    OrderingFault {
        next_expected: usize,
        buffered: Vec<usize>,
    },

    #[error("{0} thread panicked")]
    WorkerPanicked(&'static str),

    #[error("job cancelled")]
    Cancelled,
}

impl JobError {
    /// True for the fault class that means a task result was lost, as
    /// opposed to a bad input or output.
    pub fn is_ordering_fault(&self) -> bool {
        matches!(self, JobError::OrderingFault { .. })
    }
}
