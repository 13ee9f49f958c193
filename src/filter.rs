//! Filter chain (component C3): an ordered list of pure predicates evaluated
//! by the dispatcher, short-circuiting on the first rejection.

use crate::event::Event;
use regex::Regex;
use std::sync::Arc;

/// `accept(event) -> bool`. Implementations must not mutate the event
/// (spec §4.7: "Filters are pure functions").
pub trait Filter: Send + Sync {
    fn accept(&self, event: &Event) -> bool;
}

impl<F> Filter for F
where
    F: Fn(&Event) -> bool + Send + Sync,
{
    fn accept(&self, event: &Event) -> bool {
        self(event)
    }
}

#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn Filter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        FilterChain { filters: Vec::new() }
    }

    pub fn push(&mut self, filter: Arc<dyn Filter>) -> &mut Self {
        self.filters.push(filter);
        self
    }

    /// Evaluates filters in order, short-circuiting on the first rejection.
    pub fn accept(&self, event: &Event) -> bool {
        self.filters.iter().all(|f| f.accept(event))
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

/// A filter that accepts only events whose rendered message matches a
/// pattern. Grounded on the teacher's `backend::search` module, which
/// compiles a `regex::Regex` to search already-written log lines; here the
/// same crate filters events before they ever reach a transport.
pub struct RegexFilter {
    pattern: Regex,
    invert: bool,
}

impl RegexFilter {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(RegexFilter {
            pattern: Regex::new(pattern)?,
            invert: false,
        })
    }

    /// Accepts events that do *not* match, instead of ones that do.
    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }
}

impl Filter for RegexFilter {
    fn accept(&self, event: &Event) -> bool {
        let matches = self.pattern.is_match(&event.render_message());
        matches != self.invert
    }
}

#[cfg(test)]
mod regex_filter_tests {
    use super::*;
    use crate::event::Message;
    use crate::levels::Severity;
    use crate::scope::Scope;

    fn event(text: &str) -> Event {
        Event::new(Severity::Info, Message::from_str(text), Scope::default())
    }

    #[test]
    fn accepts_only_matching_messages() {
        let filter = RegexFilter::new(r"^user-\d+ logged in$").unwrap();
        assert!(filter.accept(&event("user-42 logged in")));
        assert!(!filter.accept(&event("user logged in")));
    }

    #[test]
    fn inverted_accepts_non_matching_messages() {
        let filter = RegexFilter::new(r"healthcheck").unwrap().inverted();
        assert!(filter.accept(&event("request failed")));
        assert!(!filter.accept(&event("healthcheck ok")));
    }

    #[test]
    fn invalid_pattern_is_rejected_at_construction() {
        assert!(RegexFilter::new("[unterminated").is_err());
    }
}
