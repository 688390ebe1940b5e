use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::pipeline::admission_gate::{AdmissionGate, Permit};
use crate::pipeline::frame_processor::{FrameProcessor, ProcessingResult};
use crate::pipeline::ordered_writer::OrderedWriter;
use crate::pipeline::pipeline_executor::{JobReport, PipelineConfig, PipelineExecutor};
use crate::shared::error::JobError;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

/// A frame admitted into the pool. The permit rides along until the frame
/// has been written.
struct Task {
    frame: Frame,
    permit: Permit,
}

enum Event {
    Processed {
        result: ProcessingResult,
        permit: Permit,
    },
    SourceDone {
        frames_read: usize,
    },
    SourceFailed {
        frames_read: usize,
        reason: String,
    },
}

/// Executes a swap job on a reader thread, `workers` worker threads and the
/// calling thread.
///
/// Layout: `reader → [gate] → workers → completion channel → caller
/// [ordered writer → sink]`
///
/// The caller's thread is the only one that touches the sink, so writes
/// happen strictly in frame order.
pub struct ThreadedSwapExecutor;

impl ThreadedSwapExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ThreadedSwapExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineExecutor for ThreadedSwapExecutor {
    fn execute(
        &self,
        reader: Box<dyn VideoReader>,
        mut writer: Box<dyn VideoWriter>,
        processor: Arc<FrameProcessor>,
        metadata: &VideoMetadata,
        output_path: &Path,
        mut config: PipelineConfig,
    ) -> Result<JobReport, JobError> {
        writer
            .open(output_path, metadata)
            .map_err(|e| JobError::EncoderOpen {
                path: output_path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let workers = config.workers.max(1);
        let gate = AdmissionGate::new(config.max_in_flight);
        let cancelled = Arc::clone(&config.cancelled);
        config.logger.info(&format!(
            "Swapping with {workers} workers, at most {} frames in flight",
            gate.capacity()
        ));

        let (task_tx, task_rx) = crossbeam_channel::bounded::<Task>(gate.capacity());
        let (event_tx, event_rx) = crossbeam_channel::unbounded::<Event>();

        let reader_handle = spawn_reader(
            reader,
            task_tx,
            event_tx.clone(),
            gate.clone(),
            Arc::clone(&cancelled),
        );
        let worker_handles: Vec<_> = (0..workers)
            .map(|_| {
                spawn_worker(
                    Arc::clone(&processor),
                    task_rx.clone(),
                    event_tx.clone(),
                    config.task_timeout,
                    Arc::clone(&cancelled),
                )
            })
            .collect();
        drop(task_rx);
        drop(event_tx);

        let mut consumer = Consumer {
            ordered: OrderedWriter::new(),
            gate: &gate,
            config: &mut config,
            report: JobReport {
                workers,
                ..JobReport::default()
            },
            total_hint: metadata.total_frames,
        };
        let consumed = consumer.run(&event_rx, &mut *writer);
        let Consumer {
            ordered,
            mut report,
            ..
        } = consumer;

        if consumed.is_err() {
            cancelled.store(true, Ordering::SeqCst);
        }
        drop(event_rx);
        let joined = join_threads(reader_handle, worker_handles);
        report.peak_in_flight = gate.peak();

        let closed = writer.close().map_err(|e| JobError::Sink {
            index: report.frames_written,
            reason: format!("closing output: {e}"),
        });

        consumed?;
        joined?;
        ordered.finish(report.frames_read)?;
        closed?;

        config.logger.metric("peak_in_flight", report.peak_in_flight as f64);
        config.logger.summary();
        Ok(report)
    }
}

/// The single consumer: records outcomes, reorders and writes.
struct Consumer<'a> {
    ordered: OrderedWriter<(Frame, Permit)>,
    gate: &'a AdmissionGate,
    config: &'a mut PipelineConfig,
    report: JobReport,
    total_hint: usize,
}

impl Consumer<'_> {
    fn run(
        &mut self,
        events: &Receiver<Event>,
        writer: &mut dyn VideoWriter,
    ) -> Result<(), JobError> {
        for event in events {
            if self.config.cancelled.load(Ordering::Relaxed) {
                return Err(JobError::Cancelled);
            }
            match event {
                Event::SourceDone { frames_read } => {
                    log::debug!("Source exhausted after {frames_read} frames");
                    self.report.frames_read = frames_read;
                }
                Event::SourceFailed {
                    frames_read,
                    reason,
                } => return Err(JobError::Decode { frames_read, reason }),
                Event::Processed { result, permit } => {
                    self.record(&result);
                    self.ordered.push(result.index, (result.frame, permit))?;
                    self.drain(writer)?;
                }
            }
        }
        if self.config.cancelled.load(Ordering::Relaxed) {
            return Err(JobError::Cancelled);
        }
        Ok(())
    }

    fn record(&mut self, result: &ProcessingResult) {
        let label = result.status.label();
        *self.report.outcomes.entry(label.to_string()).or_default() += 1;
        let logger = &mut self.config.logger;
        logger.count(label);
        logger.timing("task", result.elapsed.as_secs_f64() * 1000.0);
        logger.metric("in_flight", self.gate.in_flight() as f64);
    }

    fn drain(&mut self, writer: &mut dyn VideoWriter) -> Result<(), JobError> {
        while let Some((index, (frame, permit))) = self.ordered.pop_ready() {
            writer.write(&frame).map_err(|e| JobError::Sink {
                index,
                reason: e.to_string(),
            })?;
            drop(permit);
            self.report.frames_written += 1;

            let current = self.report.frames_written;
            let total = self.total_hint.max(current);
            self.config.logger.progress(current, total);
            if let Some(callback) = &self.config.on_progress {
                if !callback(current, total) {
                    log::info!("Cancelled by progress callback at frame {current}");
                    self.config.cancelled.store(true, Ordering::SeqCst);
                    return Err(JobError::Cancelled);
                }
            }
        }
        Ok(())
    }
}

fn spawn_reader(
    mut reader: Box<dyn VideoReader>,
    task_tx: Sender<Task>,
    event_tx: Sender<Event>,
    gate: AdmissionGate,
    cancelled: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut frames_read = 0usize;
        let mut failure = None;
        for item in reader.frames() {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }
            let frame = match item {
                Ok(frame) => frame,
                Err(e) => {
                    failure = Some(e.to_string());
                    break;
                }
            };
            let frame = if frame.index() == frames_read {
                frame
            } else {
                log::warn!(
                    "Source labelled frame {frames_read} as {}, renumbering",
                    frame.index()
                );
                frame.with_index(frames_read)
            };
            let Some(permit) = gate.acquire(&cancelled) else {
                break;
            };
            if task_tx.send(Task { frame, permit }).is_err() {
                break;
            }
            frames_read += 1;
        }
        drop(task_tx);
        reader.close();

        let event = match failure {
            Some(reason) => Event::SourceFailed {
                frames_read,
                reason,
            },
            None => Event::SourceDone { frames_read },
        };
        let _ = event_tx.send(event);
    })
}

fn spawn_worker(
    processor: Arc<FrameProcessor>,
    task_rx: Receiver<Task>,
    event_tx: Sender<Event>,
    timeout: Option<Duration>,
    cancelled: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for task in task_rx {
            if cancelled.load(Ordering::Relaxed) {
                continue;
            }
            let result = processor.process_guarded(task.frame, timeout);
            let event = Event::Processed {
                result,
                permit: task.permit,
            };
            if event_tx.send(event).is_err() {
                break;
            }
        }
    })
}

/// Joins the reader and every worker, reporting the first that panicked.
fn join_threads(reader: JoinHandle<()>, workers: Vec<JoinHandle<()>>) -> Result<(), JobError> {
    let mut first_error = None;
    if reader.join().is_err() {
        first_error.get_or_insert(JobError::WorkerPanicked("reader"));
    }
    for worker in workers {
        if worker.join().is_err() {
            first_error.get_or_insert(JobError::WorkerPanicked("worker"));
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
