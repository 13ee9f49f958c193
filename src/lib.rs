//! A structured logging core: an immutable event model, a lazily-rendered
//! message format, ambient scope capture, a filter chain, a field-based
//! formatter engine, and four concrete transports (throttled, async
//! durable, rotating file, buffered).
//!
//! Call sites build a [`logger::Logger`], ask it for a [`logger::Channel`]
//! at a given [`levels::Severity`], and write through it. A channel below
//! the logger's threshold is inert and costs a single atomic load.

pub mod dispatch;
pub mod error;
pub mod event;
pub mod filter;
pub mod format;
pub mod levels;
pub mod logger;
pub mod scope;
pub mod transport;
pub mod utils;

#[cfg(test)]
mod tests;

pub use error::{LogCoreError, Result};
pub use event::{Event, Message};
pub use levels::Severity;
pub use logger::{Channel, Logger};
pub use scope::Scope;
