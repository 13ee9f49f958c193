//! Severity levels, RFC-5424 aligned.
//!
//! Nine levels ordered `emergency > alert > critical > error > warning >
//! notice > info > debug > trace`. The numeric value increases as severity
//! decreases, matching syslog's `PRI` convention, so `level as u8` is
//! directly usable wherever a smaller-is-more-severe comparison is needed.

use serde::{Deserialize, Serialize};
use std::fmt;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
    Trace = 8,
}

/// Number of severity channels a logger always exposes (invariant #2 in spec §3).
pub const CHANNEL_COUNT: usize = 9;

impl Severity {
    pub const ALL: [Severity; CHANNEL_COUNT] = [
        Severity::Emergency,
        Severity::Alert,
        Severity::Critical,
        Severity::Error,
        Severity::Warning,
        Severity::Notice,
        Severity::Info,
        Severity::Debug,
        Severity::Trace,
    ];

    /// True if `self` is at least as severe as `threshold` (numerically `<=`).
    ///
    /// Severity ordering is "more severe = lower number", which is the
    /// opposite of `PartialOrd`'s derived `<` on the enum discriminant read
    /// literally as "more verbose" — this helper makes the gating check in
    /// spec §3 invariant #2 read naturally at call sites.
    pub fn at_least(self, threshold: Severity) -> bool {
        (self as u8) <= (threshold as u8)
    }

    pub fn index(self) -> usize {
        self as u8 as usize
    }

    pub fn from_index(idx: usize) -> Option<Severity> {
        Severity::ALL.get(idx).copied()
    }

    pub fn short(self) -> &'static str {
        match self {
            Severity::Emergency => "EMRG",
            Severity::Alert => "ALRT",
            Severity::Critical => "CRIT",
            Severity::Error => "ERR",
            Severity::Warning => "WARN",
            Severity::Notice => "NOTE",
            Severity::Info => "INFO",
            Severity::Debug => "DEBG",
            Severity::Trace => "TRCE",
        }
    }

    pub fn simple(self) -> &'static str {
        match self {
            Severity::Emergency => "EMERGENCY",
            Severity::Alert => "ALERT",
            Severity::Critical => "CRITICAL",
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Notice => "NOTICE",
            Severity::Info => "INFO",
            Severity::Debug => "DEBUG",
            Severity::Trace => "TRACE",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Severity::Emergency => "🆘",
            Severity::Alert => "🚨",
            Severity::Critical => "🔥",
            Severity::Error => "❌",
            Severity::Warning => "⚠️",
            Severity::Notice => "📣",
            Severity::Info => "ℹ️",
            Severity::Debug => "🐛",
            Severity::Trace => "🔍",
        }
    }

    /// RFC-5424 numeric severity (0 = emergency .. 7 = debug). `trace` has no
    /// RFC-5424 counterpart and is mapped onto `debug`'s value (7), matching
    /// how the syslog formatter's priority calculation must collapse it.
    pub fn rfc5424_numeric(self) -> u8 {
        match self {
            Severity::Trace => 7,
            other => other as u8,
        }
    }

    pub fn parse(name: &str) -> Option<Severity> {
        match name.to_ascii_lowercase().as_str() {
            "emergency" | "emerg" => Some(Severity::Emergency),
            "alert" => Some(Severity::Alert),
            "critical" | "crit" => Some(Severity::Critical),
            "error" | "err" => Some(Severity::Error),
            "warning" | "warn" => Some(Severity::Warning),
            "notice" => Some(Severity::Notice),
            "info" => Some(Severity::Info),
            "debug" => Some(Severity::Debug),
            "trace" => Some(Severity::Trace),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.simple())
    }
}
