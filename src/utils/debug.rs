//! Internal diagnostics for the crate's own sinks (e.g. "SQLite busy,
//! retrying", "rotation failed"). Deliberately not routed through this
//! crate's own event pipeline — a sink logging its own failures through
//! itself would be circular. Enabled by the `LOGCORE_DEBUG` environment
//! variable so production builds stay silent by default.

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, Ordering};

static ENABLED: Lazy<AtomicBool> =
    Lazy::new(|| AtomicBool::new(std::env::var_os("LOGCORE_DEBUG").is_some()));

pub fn enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

pub fn set_enabled(value: bool) {
    ENABLED.store(value, Ordering::Relaxed);
}

macro_rules! internal_trace {
    ($($arg:tt)*) => {
        if $crate::utils::debug::enabled() {
            eprintln!("[logcore] {}", format!($($arg)*));
        }
    };
}

pub(crate) use internal_trace;
