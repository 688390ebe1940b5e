//! Bounded admission of frames into the worker pool.
//!
//! The gate is a counting semaphore built on a bounded channel: acquiring
//! a permit pushes a token, dropping the permit pops one. Once `capacity`
//! permits are out, `acquire` blocks, which stalls the frame reader and
//! caps how many decoded frames exist at once.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, SendTimeoutError, Sender};

/// How often a blocked `acquire` rechecks the cancellation flag.
const CANCEL_POLL: Duration = Duration::from_millis(50);

struct Shared {
    tokens_tx: Sender<()>,
    tokens_rx: Receiver<()>,
    capacity: usize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[derive(Clone)]
pub struct AdmissionGate {
    shared: Arc<Shared>,
}

/// Held for as long as a frame counts against the in-flight cap.
pub struct Permit {
    shared: Arc<Shared>,
}

impl AdmissionGate {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tokens_tx, tokens_rx) = crossbeam_channel::bounded(capacity);
        Self {
            shared: Arc::new(Shared {
                tokens_tx,
                tokens_rx,
                capacity,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        }
    }

    /// Block until a permit is free. Returns `None` if `cancelled` is set
    /// while waiting.
    pub fn acquire(&self, cancelled: &AtomicBool) -> Option<Permit> {
        loop {
            if cancelled.load(Ordering::Relaxed) {
                return None;
            }
            match self.shared.tokens_tx.send_timeout((), CANCEL_POLL) {
                Ok(()) => break,
                Err(SendTimeoutError::Timeout(())) => continue,
                Err(SendTimeoutError::Disconnected(())) => return None,
            }
        }
        let now = self.shared.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.peak.fetch_max(now, Ordering::SeqCst);
        Some(Permit {
            shared: Arc::clone(&self.shared),
        })
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of permits ever held at once.
    pub fn peak(&self) -> usize {
        self.shared.peak.load(Ordering::SeqCst)
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
        let _ = self.shared.tokens_rx.try_recv();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_permits_up_to_capacity() {
        let gate = AdmissionGate::new(2);
        let never = AtomicBool::new(false);
        let a = gate.acquire(&never).unwrap();
        let _b = gate.acquire(&never).unwrap();
        assert_eq!(gate.in_flight(), 2);
        drop(a);
        assert_eq!(gate.in_flight(), 1);
        assert_eq!(gate.peak(), 2);
    }

    #[test]
    fn test_zero_capacity_is_one() {
        assert_eq!(AdmissionGate::new(0).capacity(), 1);
    }

    #[test]
    fn test_full_gate_blocks_until_release() {
        let gate = AdmissionGate::new(1);
        let never = AtomicBool::new(false);
        let held = gate.acquire(&never).unwrap();

        let releaser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            drop(held);
        });

        let start = Instant::now();
        let second = gate.acquire(&never);
        assert!(second.is_some());
        assert!(start.elapsed() >= Duration::from_millis(80));
        assert_eq!(gate.peak(), 1);
        releaser.join().unwrap();
    }

    #[test]
    fn test_cancel_unblocks_acquire() {
        let gate = AdmissionGate::new(1);
        let cancelled = Arc::new(AtomicBool::new(false));
        let _held = gate.acquire(&cancelled).unwrap();

        let flag = Arc::clone(&cancelled);
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(60));
            flag.store(true, Ordering::Relaxed);
        });

        assert!(gate.acquire(&cancelled).is_none());
        canceller.join().unwrap();
    }

    #[test]
    fn test_concurrent_holders_never_exceed_capacity() {
        let gate = AdmissionGate::new(3);
        let never = Arc::new(AtomicBool::new(false));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                let never = Arc::clone(&never);
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        let permit = gate.acquire(&never).unwrap();
                        assert!(gate.in_flight() <= 3);
                        std::thread::sleep(Duration::from_micros(200));
                        drop(permit);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(gate.peak() <= 3);
        assert_eq!(gate.in_flight(), 0);
    }
}
