//! Transport capability (spec §6/§9): anything exposing `record`,
//! `is_enabled`, `min_level`, and an optional dedicated queue. Concrete sinks
//! (throttled, async-durable, rotating-file, buffered) implement this trait;
//! the dispatcher only ever talks to `dyn Transport`.

pub mod async_durable;
pub mod buffered;
pub mod file;
pub mod throttled;

use crate::event::Event;
use crate::levels::Severity;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;

/// A transport's per-sink mutable state is only ever touched from this
/// queue's dedicated thread (spec §5: "all of its mutable state... is
/// accessed only from that queue").
pub struct TransportQueue {
    sender: Sender<QueueMessage>,
    _handle: JoinHandle<()>,
    shut_down: AtomicBool,
}

enum QueueMessage {
    Task(Box<dyn FnOnce() + Send>),
    Shutdown(Sender<()>),
}

impl TransportQueue {
    pub fn new(name: &'static str) -> Self {
        let (sender, receiver): (Sender<QueueMessage>, Receiver<QueueMessage>) = unbounded();
        let handle = std::thread::Builder::new()
            .name(format!("logcore-{name}"))
            .spawn(move || {
                for msg in receiver {
                    match msg {
                        QueueMessage::Task(task) => task(),
                        QueueMessage::Shutdown(done) => {
                            let _ = done.send(());
                            break;
                        }
                    }
                }
            })
            .expect("failed to spawn transport queue thread");
        TransportQueue {
            sender,
            _handle: handle,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Runs `task` on the queue's thread. When `sync` is true, blocks the
    /// caller until `task` has finished executing (spec §4.1 algorithm step 4).
    pub fn dispatch(&self, sync: bool, task: impl FnOnce() + Send + 'static) {
        if sync {
            let (ack_tx, ack_rx) = bounded::<()>(1);
            let _ = self.sender.send(QueueMessage::Task(Box::new(move || {
                task();
                let _ = ack_tx.send(());
            })));
            let _ = ack_rx.recv();
        } else {
            let _ = self.sender.send(QueueMessage::Task(Box::new(task)));
        }
    }

    /// Stops the queue's dedicated thread. Calling this more than once on the
    /// same queue is a programmer error, not a recoverable condition — there
    /// is no second thread left to stop, and a caller racing two shutdowns
    /// indicates a bug in how the transport is owned, not a transient fault.
    pub fn shutdown(&self) {
        crate::error::assert_invariant(
            !self.shut_down.swap(true, Ordering::SeqCst),
            "TransportQueue::shutdown called twice on the same queue",
        );
        let (tx, rx) = bounded::<()>(1);
        let _ = self.sender.send(QueueMessage::Shutdown(tx));
        let _ = rx.recv();
    }
}

/// Lightweight atomic counters every sink maintains (supplemented feature,
/// see SPEC_FULL.md §C).
#[derive(Default)]
pub struct LoggerMetrics {
    pub total_records: AtomicU64,
    pub bytes_written: AtomicU64,
    pub errors: AtomicU64,
    pub dropped: AtomicU64,
}

impl LoggerMetrics {
    pub fn record(&self, bytes: u64) {
        self.total_records.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped(&self, count: u64) {
        self.dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_records: self.total_records.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub total_records: u64,
    pub bytes_written: u64,
    pub errors: u64,
    pub dropped: u64,
}

/// A consumer capability (spec §6 "Transport contract").
pub trait Transport: Send + Sync {
    fn is_enabled(&self) -> bool;
    fn set_enabled(&self, enabled: bool);
    fn min_level(&self) -> Option<Severity>;

    /// Records `event`. Returns `true` if accepted. Sink-internal failures
    /// must never propagate past this call (spec §7 propagation policy) —
    /// they surface only via the sink's own delegate callback.
    fn record(&self, event: &Event) -> bool;

    /// This transport's dedicated queue, if any. `None` means the dispatcher
    /// executor runs `record` inline (spec §4.1 algorithm step 4).
    fn queue(&self) -> Option<&TransportQueue> {
        None
    }

    /// Drains any buffered state. Default no-op for transports that don't
    /// buffer.
    fn flush(&self) {}

    fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot::default()
    }
}
