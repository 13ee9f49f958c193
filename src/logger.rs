//! Logger configuration bundle and severity channels (components C2/C5 glue).

use crate::dispatch::dispatch;
use crate::event::{Event, Message};
use crate::filter::FilterChain;
use crate::levels::Severity;
use crate::scope::{CallSite, Scope};
use crate::transport::Transport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A configuration bundle (spec §3 "Logger"): threshold, identity, filters,
/// transports, and the sync/async dispatch policy.
pub struct Logger {
    level_threshold: Severity,
    subsystem: Option<String>,
    category: Option<String>,
    is_enabled: AtomicBool,
    is_synchronous: bool,
    filters: FilterChain,
    transports: Vec<Arc<dyn Transport>>,
}

impl Logger {
    pub fn new(level_threshold: Severity) -> Self {
        Logger {
            level_threshold,
            subsystem: None,
            category: None,
            is_enabled: AtomicBool::new(true),
            is_synchronous: false,
            filters: FilterChain::new(),
            transports: Vec::new(),
        }
    }

    pub fn with_subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = Some(subsystem.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_synchronous(mut self, synchronous: bool) -> Self {
        self.is_synchronous = synchronous;
        self
    }

    pub fn with_filters(mut self, filters: FilterChain) -> Self {
        self.filters = filters;
        self
    }

    pub fn add_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transports.push(transport);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.is_enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.is_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_synchronous(&self) -> bool {
        self.is_synchronous
    }

    pub fn level_threshold(&self) -> Severity {
        self.level_threshold
    }

    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    pub fn transports(&self) -> &[Arc<dyn Transport>] {
        &self.transports
    }

    pub fn subsystem(&self) -> Option<&str> {
        self.subsystem.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// Accesses the channel for `level`. Returns the inert sentinel iff
    /// `level` is strictly less severe than the threshold or the logger is
    /// disabled (spec §3 invariant #2, §4.8) — the single most important
    /// performance decision: a disabled channel never builds an event.
    pub fn channel(&self, level: Severity) -> Channel<'_> {
        if !self.is_enabled() || !level.at_least(self.level_threshold) {
            Channel::Inert
        } else {
            Channel::Live(LiveChannel {
                logger: self,
                level,
            })
        }
    }
}

/// One of the logger's nine preallocated severity slots (spec §4.8).
pub enum Channel<'a> {
    Inert,
    Live(LiveChannel<'a>),
}

impl<'a> Channel<'a> {
    pub fn is_live(&self) -> bool {
        matches!(self, Channel::Live(_))
    }
}

pub struct LiveChannel<'a> {
    logger: &'a Logger,
    level: Severity,
}

impl<'a> LiveChannel<'a> {
    /// Builds an event from `message` and the ambient scope, and dispatches
    /// it. Only reachable when the channel is live, so message interpolation
    /// and scope capture are skipped entirely when the channel is gated off.
    pub fn write(&self, message: Message) {
        self.write_with_call_site(message, None)
    }

    pub fn write_with_call_site(&self, message: Message, call_site: Option<CallSite>) {
        let scope = Scope::capture(call_site);
        let event = Event::new(self.level, message, scope);
        dispatch(self.logger, event);
    }

    pub fn log(&self, text: impl Into<String>) {
        self.write(Message::from_str(text));
    }

    pub fn level(&self) -> Severity {
        self.level
    }
}
