//! The dispatcher (component C5, spec §4.1): routes one already-built event
//! from a live channel to every admitting transport.
//!
//! Algorithm (spec §4.1):
//! 1. If the logger is disabled, drop the event. (Already guarded by
//!    [`crate::logger::Channel`] being inert, but checked again here since a
//!    logger can be disabled between channel acquisition and dispatch.)
//! 2. If the event's level is less severe than the logger's threshold, drop.
//! 3. Run the logger's filter chain; drop on first rejection.
//! 4. For each transport: skip if disabled or the event doesn't meet the
//!    transport's own `min_level`; otherwise run `record` through the
//!    transport's queue if it has one (synchronously if the logger is
//!    configured synchronous), or inline if it has none.

use crate::event::Event;
use crate::logger::Logger;

pub fn dispatch(logger: &Logger, event: Event) {
    if !logger.is_enabled() {
        return;
    }
    if !event.level().at_least(logger.level_threshold()) {
        return;
    }
    if !logger.filters().accept(&event) {
        return;
    }

    let event = std::sync::Arc::new(event);
    let sync = logger.is_synchronous();

    for transport in logger.transports() {
        if !transport.is_enabled() {
            continue;
        }
        if let Some(min_level) = transport.min_level() {
            if !event.level().at_least(min_level) {
                continue;
            }
        }

        let transport = transport.clone();
        let event = event.clone();
        match transport.queue() {
            Some(queue) => queue.dispatch(sync, move || {
                transport.record(&event);
            }),
            None => {
                transport.record(&event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Message;
    use crate::levels::Severity;
    use crate::logger::Logger;
    use crate::scope::Scope;
    use crate::transport::buffered::BufferedSink;
    use crate::transport::Transport;
    use std::sync::Arc;

    #[test]
    fn disabled_transport_is_skipped() {
        let sink = Arc::new(BufferedSink::new(-1, |e: &Event, _: Option<&str>| e.id()));
        sink.set_enabled(false);
        let logger = Logger::new(Severity::Trace).add_transport(sink.clone() as Arc<dyn Transport>);
        let event = Event::new(Severity::Error, Message::from_str("x"), Scope::default());
        dispatch(&logger, event);
        assert_eq!(sink.len(), 0);
    }

    #[test]
    fn transport_min_level_gates_independently_of_logger_threshold() {
        let sink = Arc::new(
            BufferedSink::new(-1, |e: &Event, _: Option<&str>| e.id()).with_min_level(Severity::Critical),
        );
        let logger = Logger::new(Severity::Trace).add_transport(sink.clone() as Arc<dyn Transport>);
        dispatch(&logger, Event::new(Severity::Warning, Message::from_str("x"), Scope::default()));
        assert_eq!(sink.len(), 0);
        dispatch(&logger, Event::new(Severity::Alert, Message::from_str("x"), Scope::default()));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn rejecting_filter_drops_before_any_transport_runs() {
        let sink = Arc::new(BufferedSink::new(-1, |e: &Event, _: Option<&str>| e.id()));
        let mut filters = crate::filter::FilterChain::new();
        filters.push(Arc::new(|_: &Event| false));
        let logger = Logger::new(Severity::Trace)
            .with_filters(filters)
            .add_transport(sink.clone() as Arc<dyn Transport>);
        dispatch(&logger, Event::new(Severity::Emergency, Message::from_str("x"), Scope::default()));
        assert_eq!(sink.len(), 0);
    }
}
