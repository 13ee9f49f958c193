//! Generic buffered/transformation sink (component C9, spec §4.5 "Buffered
//! sink"): accumulates formatted records in memory under a caller-supplied
//! transform until explicitly flushed or cleared. `buffer_limit <= 0` means
//! unbounded (spec §6 `BufferedSinkConfig`).

use super::{LoggerMetrics, MetricsSnapshot, Transport};
use crate::event::Event;
use crate::levels::Severity;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// A sink that holds onto every accepted item (as produced by its transform
/// closure) until [`BufferedSink::clear`] is called. Bounded by
/// `buffer_limit`; once full, the oldest item is dropped to admit the new
/// one (spec §4.5 "ring" overflow policy, shared with the throttled sink).
pub struct BufferedSink<T, F>
where
    T: Send + 'static,
    F: Fn(&Event, Option<&str>) -> T + Send + Sync + 'static,
{
    items: Mutex<Vec<T>>,
    transform: F,
    buffer_limit: isize,
    enabled: AtomicBool,
    min_level: Option<Severity>,
    metrics: LoggerMetrics,
}

impl<T, F> BufferedSink<T, F>
where
    T: Send + 'static,
    F: Fn(&Event, Option<&str>) -> T + Send + Sync + 'static,
{
    pub fn new(buffer_limit: isize, transform: F) -> Self {
        BufferedSink {
            items: Mutex::new(Vec::new()),
            transform,
            buffer_limit,
            enabled: AtomicBool::new(true),
            min_level: None,
            metrics: LoggerMetrics::default(),
        }
    }

    pub fn with_min_level(mut self, level: Severity) -> Self {
        self.min_level = Some(level);
        self
    }

    /// A synchronous snapshot of everything currently buffered.
    pub fn items(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.items.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Synchronously discards every buffered item (spec §4.5: "clear is
    /// synchronous, unlike record").
    pub fn clear(&self) {
        self.items.lock().clear();
    }
}

impl<T, F> Transport for BufferedSink<T, F>
where
    T: Send + 'static,
    F: Fn(&Event, Option<&str>) -> T + Send + Sync + 'static,
{
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
        let item = (self.transform)(event, None);
        let mut items = self.items.lock();
        if self.buffer_limit > 0 {
            let limit = self.buffer_limit as usize;
            if items.len() >= limit {
                items.remove(0);
                self.metrics.dropped(1);
            }
        }
        items.push(item);
        self.metrics.record(0);
        true
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

    fn event() -> Event {
        Event::new(Severity::Info, Message::from_str("hi"), Scope::default())
    }

    #[test]
    fn unbounded_buffer_keeps_every_item() {
        let sink = BufferedSink::new(-1, |e, _| e.message().render(true));
        for _ in 0..50 {
            sink.record(&event());
        }
        assert_eq!(sink.len(), 50);
    }

    #[test]
    fn bounded_buffer_drops_oldest_on_overflow() {
        let sink = BufferedSink::new(2, |e, _| e.id());
        let e1 = event();
        let id1 = e1.id();
        sink.record(&e1);
        sink.record(&event());
        sink.record(&event());
        assert_eq!(sink.len(), 2);
        assert!(!sink.items().contains(&id1));
        assert_eq!(sink.metrics().dropped, 1);
    }

    #[test]
    fn clear_is_synchronous() {
        let sink = BufferedSink::new(-1, |e, _| e.id());
        sink.record(&event());
        assert_eq!(sink.len(), 1);
        sink.clear();
        assert_eq!(sink.len(), 0);
    }
}
