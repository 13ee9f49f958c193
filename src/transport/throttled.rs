//! Throttled sink (component C6, spec §4.4): a bounded in-memory ring that
//! flushes to a delegate callback by count, by elapsed time, or on demand.
//! Grounded on the teacher's async writer thread, which flushes its queue
//! "if buffer would exceed buffer_size" or once `flush_interval` elapses —
//! generalized here from raw strings to formatted records and from a fixed
//! byte buffer to a bounded entry count.

use super::{LoggerMetrics, MetricsSnapshot, Transport};
use crate::event::Event;
use crate::format::{Formatted, Formatter};
use crate::levels::Severity;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Why a flush happened (spec §4.4: "flushes to a delegate when either (a)
/// the buffer reaches max_entries or (b) auto_flush_interval elapses or (c)
/// the client calls flush()").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    ByInterval,
    ByLimitOfEntries,
    ByUser,
}

/// Receives flushed batches. Errors during delivery must not propagate past
/// the sink (spec §7).
pub trait ThrottledSinkDelegate: Send + Sync {
    fn flush_batch(&self, batch: &[Formatted], reason: FlushReason);
}

pub struct ThrottledSinkConfig {
    pub max_entries: usize,
    pub flush_interval: Duration,
}

impl Default for ThrottledSinkConfig {
    fn default() -> Self {
        ThrottledSinkConfig {
            max_entries: 100,
            flush_interval: Duration::from_millis(500),
        }
    }
}

struct Ring {
    entries: Vec<Formatted>,
    last_flush: Instant,
}

/// Component C6. `record` pushes onto an in-memory ring and flushes
/// immediately once the ring reaches `max_entries`; the ring may transiently
/// hold `max_entries + 1` items between the push and the flush check (spec
/// §8 "throttled sink overshoot bound").
pub struct ThrottledSink {
    config: ThrottledSinkConfig,
    formatter: Box<dyn Formatter>,
    delegate: Arc<dyn ThrottledSinkDelegate>,
    ring: Mutex<Ring>,
    enabled: AtomicBool,
    min_level: Option<Severity>,
    metrics: LoggerMetrics,
}

impl ThrottledSink {
    pub fn new(
        config: ThrottledSinkConfig,
        formatter: Box<dyn Formatter>,
        delegate: Arc<dyn ThrottledSinkDelegate>,
    ) -> Self {
        ThrottledSink {
            config,
            formatter,
            delegate,
            ring: Mutex::new(Ring {
                entries: Vec::new(),
                last_flush: Instant::now(),
            }),
            enabled: AtomicBool::new(true),
            min_level: None,
            metrics: LoggerMetrics::default(),
        }
    }

    pub fn with_min_level(mut self, level: Severity) -> Self {
        self.min_level = Some(level);
        self
    }

    /// Flushes the ring to the delegate unconditionally (spec §4.4 "flush by
    /// user").
    pub fn flush_now(&self) {
        self.flush_with_reason(FlushReason::ByUser);
    }

    fn flush_with_reason(&self, reason: FlushReason) {
        let mut ring = self.ring.lock();
        if ring.entries.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut ring.entries);
        ring.last_flush = Instant::now();
        drop(ring);
        self.delegate.flush_batch(&batch, reason);
    }

    /// Flushes only if `flush_interval` has elapsed since the last flush
    /// (spec §4.4 "flush by interval"). Intended to be driven by a periodic
    /// caller (e.g. the dispatcher's background timer).
    pub fn flush_if_due(&self) {
        let due = {
            let ring = self.ring.lock();
            !ring.entries.is_empty() && ring.last_flush.elapsed() >= self.config.flush_interval
        };
        if due {
            self.flush_with_reason(FlushReason::ByInterval);
        }
    }

    pub fn pending_len(&self) -> usize {
        self.ring.lock().entries.len()
    }
}

impl Transport for ThrottledSink {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    fn min_level(&self) -> Option<Severity> {
        self.min_level
    }

    fn record(&self, event: &Event) -> bool {
        let Some(formatted) = self.formatter.format(event) else {
            return false;
        };
        let bytes_len = formatted.as_bytes().len() as u64;
        let should_flush = {
            let mut ring = self.ring.lock();
            ring.entries.push(formatted);
            ring.entries.len() >= self.config.max_entries
        };
        self.metrics.record(bytes_len);
        if should_flush {
            self.flush_with_reason(FlushReason::ByLimitOfEntries);
        }
        true
    }

    fn flush(&self) {
        self.flush_now();
    }

    fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Message;
    use crate::scope::Scope;
    use std::sync::atomic::AtomicUsize;

    struct CountingDelegate {
        batches: AtomicUsize,
        total_items: AtomicUsize,
        reasons: Mutex<Vec<FlushReason>>,
        messages: Mutex<Vec<String>>,
    }

    impl CountingDelegate {
        fn new() -> Self {
            CountingDelegate {
                batches: AtomicUsize::new(0),
                total_items: AtomicUsize::new(0),
                reasons: Mutex::new(Vec::new()),
                messages: Mutex::new(Vec::new()),
            }
        }
    }

    impl ThrottledSinkDelegate for CountingDelegate {
        fn flush_batch(&self, batch: &[Formatted], reason: FlushReason) {
            self.batches.fetch_add(1, Ordering::SeqCst);
            self.total_items.fetch_add(batch.len(), Ordering::SeqCst);
            self.reasons.lock().push(reason);
            self.messages
                .lock()
                .extend(batch.iter().map(|f| String::from_utf8_lossy(f.as_bytes()).to_string()));
        }
    }

    fn event() -> Event {
        Event::new(Severity::Info, Message::from_str("x"), Scope::default())
    }

    #[test]
    fn flushes_automatically_at_max_entries() {
        let delegate = Arc::new(CountingDelegate::new());
        let config = ThrottledSinkConfig {
            max_entries: 3,
            flush_interval: Duration::from_secs(60),
        };
        let sink = ThrottledSink::new(
            config,
            Box::new(crate::format::fields::FieldsFormatter::default_line()),
            delegate.clone(),
        );
        for _ in 0..3 {
            sink.record(&event());
        }
        assert_eq!(delegate.batches.load(Ordering::SeqCst), 1);
        assert_eq!(delegate.total_items.load(Ordering::SeqCst), 3);
        assert_eq!(sink.pending_len(), 0);
        assert_eq!(delegate.reasons.lock()[0], FlushReason::ByLimitOfEntries);
    }

    /// Spec §8 scenario 2: max_entries=5, no interval, 12 events recorded.
    /// Two delegate callbacks (by_limit_of_entries) covering m0..m4 and
    /// m5..m9; m10, m11 remain pending.
    #[test]
    fn scenario_flush_by_size_drains_in_fixed_batches() {
        let delegate = Arc::new(CountingDelegate::new());
        let config = ThrottledSinkConfig {
            max_entries: 5,
            flush_interval: Duration::from_secs(3600),
        };
        let sink = ThrottledSink::new(
            config,
            Box::new(crate::format::fields::FieldsFormatter::new(vec![
                crate::format::fields::FieldSpec::new(crate::format::fields::Field::Message),
            ])),
            delegate.clone(),
        );
        for i in 0..12 {
            let event = Event::new(Severity::Info, Message::from_str(format!("m{i}")), Scope::default());
            sink.record(&event);
        }
        assert_eq!(delegate.batches.load(Ordering::SeqCst), 2);
        assert_eq!(sink.pending_len(), 2);
        let reasons = delegate.reasons.lock();
        assert!(reasons.iter().all(|r| *r == FlushReason::ByLimitOfEntries));
        let messages = delegate.messages.lock();
        assert_eq!(
            messages.as_slice(),
            &["m0", "m1", "m2", "m3", "m4", "m5", "m6", "m7", "m8", "m9"]
        );
    }

    #[test]
    fn flush_now_drains_partial_ring() {
        let delegate = Arc::new(CountingDelegate::new());
        let sink = ThrottledSink::new(
            ThrottledSinkConfig::default(),
            Box::new(crate::format::fields::FieldsFormatter::default_line()),
            delegate.clone(),
        );
        sink.record(&event());
        assert_eq!(sink.pending_len(), 1);
        sink.flush_now();
        assert_eq!(sink.pending_len(), 0);
        assert_eq!(delegate.batches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn flush_if_due_respects_interval() {
        let delegate = Arc::new(CountingDelegate::new());
        let config = ThrottledSinkConfig {
            max_entries: 1000,
            flush_interval: Duration::from_millis(10),
        };
        let sink = ThrottledSink::new(
            config,
            Box::new(crate::format::fields::FieldsFormatter::default_line()),
            delegate.clone(),
        );
        sink.record(&event());
        sink.flush_if_due();
        assert_eq!(delegate.batches.load(Ordering::SeqCst), 0, "should not flush before interval elapses");
        std::thread::sleep(Duration::from_millis(15));
        sink.flush_if_due();
        assert_eq!(delegate.batches.load(Ordering::SeqCst), 1);
    }
}
