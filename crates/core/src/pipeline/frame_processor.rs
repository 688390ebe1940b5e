//! The per-frame task: locate the target face, run the strategy chain,
//! harmonize colors. Whatever happens inside, a frame of the input's shape
//! comes out.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::compositing::color_harmonizer::harmonize;
use crate::detection::domain::face_locator::FaceLocator;
use crate::shared::constants::MAX_OVERRUNNING_TASKS;
use crate::shared::frame::Frame;
use crate::shared::swap_config::SwapConfig;
use crate::swapping::domain::donor_face::DonorFace;
use crate::swapping::domain::neural_swap::NeuralSwap;
use crate::swapping::domain::strategy_chain::{StrategyChain, SwapOutcome, SwapStage};

/// How a task ended.
#[derive(Clone, Debug, PartialEq)]
pub enum TaskStatus {
    /// The chain ran to completion; `stage` produced the output.
    Completed { stage: SwapStage },
    /// The task panicked; the input was passed through.
    Faulted(String),
    /// The task exceeded its time budget; the input was passed through.
    TimedOut,
}

impl TaskStatus {
    /// Label used for outcome counts.
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Completed { stage } => stage.name(),
            TaskStatus::Faulted(_) => "faulted",
            TaskStatus::TimedOut => "timed_out",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ProcessingResult {
    pub index: usize,
    pub frame: Frame,
    pub status: TaskStatus,
    pub elapsed: Duration,
}

/// Everything a worker needs to process one frame. Shared read-only by all
/// workers for the lifetime of a job.
pub struct FrameProcessor {
    locator: Arc<dyn FaceLocator>,
    chain: StrategyChain,
    donor: Arc<DonorFace>,
    color_correction: bool,
    /// Helper threads whose caller already gave up on them.
    overrunning: AtomicUsize,
}

const RUNNING: u8 = 0;
const FINISHED: u8 = 1;
const ABANDONED: u8 = 2;

impl FrameProcessor {
    pub fn new(
        config: &SwapConfig,
        locator: Arc<dyn FaceLocator>,
        neural: Option<Arc<dyn NeuralSwap>>,
        donor: Arc<DonorFace>,
    ) -> Self {
        Self {
            locator,
            chain: StrategyChain::new(config, neural),
            donor,
            color_correction: config.color_correction,
            overrunning: AtomicUsize::new(0),
        }
    }

    pub fn has_neural(&self) -> bool {
        self.chain.has_neural()
    }

    /// Swap the donor face into `frame`.
    pub fn process(&self, frame: &Frame) -> SwapOutcome {
        let target = self.locator.locate(frame);
        let mut outcome = self.chain.run(frame, &target, &self.donor);
        if self.color_correction {
            if let Some(mask) = &outcome.mask {
                outcome.frame = harmonize(&outcome.frame, frame, mask);
            }
        }
        outcome.frame = outcome.frame.with_index(frame.index());
        outcome
    }

    /// Run [`process`](Self::process) behind the task boundary: a panic or
    /// an overrun of `timeout` turns into a pass-through of the input.
    ///
    /// With a timeout the work runs on a helper thread; if it overruns, that
    /// thread is left to finish on its own and its result is discarded. While
    /// [`MAX_OVERRUNNING_TASKS`] such threads are still running, new frames
    /// pass through as timed out without spawning anything.
    pub fn process_guarded(
        self: &Arc<Self>,
        frame: Frame,
        timeout: Option<Duration>,
    ) -> ProcessingResult {
        let start = Instant::now();
        let index = frame.index();

        let (output, status) = match timeout {
            None => self.run_caught(&frame),
            Some(limit) => self.run_on_helper(frame, limit),
        };

        ProcessingResult {
            index,
            frame: output,
            status,
            elapsed: start.elapsed(),
        }
    }

    /// Number of timed-out swaps still running in the background.
    pub fn stalled_tasks(&self) -> usize {
        self.overrunning.load(Ordering::Acquire)
    }

    fn run_on_helper(self: &Arc<Self>, frame: Frame, limit: Duration) -> (Frame, TaskStatus) {
        let index = frame.index();
        let stalled = self.stalled_tasks();
        if stalled >= MAX_OVERRUNNING_TASKS {
            log::warn!("Frame {index}: {stalled} timed-out swaps still running, passing through");
            return (frame, TaskStatus::TimedOut);
        }

        let (tx, rx) = crossbeam_channel::bounded(1);
        let state = Arc::new(AtomicU8::new(RUNNING));
        let helper_state = Arc::clone(&state);
        let processor = Arc::clone(self);
        let input = frame.clone();
        let spawned = thread::Builder::new()
            .name(format!("swap-task-{index}"))
            .spawn(move || {
                let done = processor.run_caught(&input);
                if helper_state.swap(FINISHED, Ordering::AcqRel) == ABANDONED {
                    processor.overrunning.fetch_sub(1, Ordering::AcqRel);
                } else {
                    let _ = tx.send(done);
                }
            });
        if let Err(e) = spawned {
            return (frame, TaskStatus::Faulted(format!("cannot spawn task: {e}")));
        }

        match rx.recv_timeout(limit) {
            Ok(done) => done,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                // Counted before abandoning so the helper's decrement never
                // runs ahead of it.
                self.overrunning.fetch_add(1, Ordering::AcqRel);
                let abandoned = state
                    .compare_exchange(RUNNING, ABANDONED, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok();
                if abandoned {
                    log::warn!("Frame {index}: swap exceeded {limit:?}, passing through");
                    return (frame, TaskStatus::TimedOut);
                }
                // Finished right at the deadline; its result is already sent.
                self.overrunning.fetch_sub(1, Ordering::AcqRel);
                rx.recv()
                    .unwrap_or_else(|_| (frame, TaskStatus::Faulted("task thread died".into())))
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                (frame, TaskStatus::Faulted("task thread died".into()))
            }
        }
    }

    fn run_caught(&self, frame: &Frame) -> (Frame, TaskStatus) {
        match catch_unwind(AssertUnwindSafe(|| self.process(frame))) {
            Ok(outcome) if outcome.frame.same_layout(frame) => {
                (outcome.frame, TaskStatus::Completed { stage: outcome.stage })
            }
            Ok(_) => (
                frame.clone(),
                TaskStatus::Faulted("output layout differs from input".into()),
            ),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::warn!("Frame {}: task panicked ({message}), passing through", frame.index());
                (frame.clone(), TaskStatus::Faulted(message))
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
