//! The formatter engine (component C4): turns an [`Event`](crate::event::Event)
//! into bytes or text. A `Formatter` is either a declarative field list (see
//! [`fields`]) or one of the built-in structured formatters (JSON, MsgPack,
//! SysLog, ASCII table).

pub mod fields;
pub mod json;
pub mod msgpack;
pub mod syslog;
pub mod table;

use crate::event::Event;
use chrono::{DateTime, Utc};

/// How a [`FormatHint::Date`](crate::event::FormatHint) or a timestamp field
/// renders a `DateTime<Utc>` (spec §4.2's "time format" option).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampStyle {
    Iso8601,
    Rfc3339,
    UnixSeconds,
    UnixMillis,
    /// An `strftime`-style pattern understood by `chrono::format`.
    Custom(&'static str),
    /// `YYYY-MM-DD HH:mm:ss.SSS` (spec §4.2 "xcode" timestamp style).
    Xcode,
}

impl TimestampStyle {
    pub fn format(&self, dt: DateTime<Utc>) -> String {
        match self {
            TimestampStyle::Iso8601 => dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            TimestampStyle::Rfc3339 => dt.to_rfc3339(),
            TimestampStyle::UnixSeconds => dt.timestamp().to_string(),
            TimestampStyle::UnixMillis => dt.timestamp_millis().to_string(),
            TimestampStyle::Custom(pattern) => dt.format(pattern).to_string(),
            TimestampStyle::Xcode => dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        }
    }
}

impl Default for TimestampStyle {
    fn default() -> Self {
        TimestampStyle::Iso8601
    }
}

/// How a severity renders as text in a formatted line (spec §4.2 "level
/// format").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LevelStyle {
    #[default]
    Short,
    Simple,
    Numeric,
    NumericReversed,
    Emoji,
}

impl LevelStyle {
    pub fn render(&self, level: crate::levels::Severity) -> String {
        match self {
            LevelStyle::Short => level.short().to_string(),
            LevelStyle::Simple => level.simple().to_string(),
            LevelStyle::Numeric => level.rfc5424_numeric().to_string(),
            LevelStyle::NumericReversed => (8 - level.rfc5424_numeric()).to_string(),
            LevelStyle::Emoji => level.emoji().to_string(),
        }
    }
}

/// How nested maps/arrays (tags, extra, user data) render inside a
/// non-JSON textual formatter (spec §4.2 "structure format").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StructureFormat {
    #[default]
    QueryString,
    Json,
    List,
    /// A bordered ASCII/Unicode key-value block (spec §4.2 "table"),
    /// delegated to [`table::render_pairs_table`] with a light box style.
    Table,
    Object,
}

/// ANSI SGR color attributes a color-capable field can be wrapped in (spec
/// §4.2 "colors: a list of ANSI color attributes applied by terminal-capable
/// sinks only"). Grounded on the teacher's `color_name_to_code` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorAttr {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    BrightBlack,
    BrightRed,
    BrightGreen,
    BrightYellow,
    BrightBlue,
    BrightMagenta,
    BrightCyan,
    BrightWhite,
    Bold,
}

impl ColorAttr {
    pub fn ansi_code(self) -> &'static str {
        match self {
            ColorAttr::Black => "30",
            ColorAttr::Red => "31",
            ColorAttr::Green => "32",
            ColorAttr::Yellow => "33",
            ColorAttr::Blue => "34",
            ColorAttr::Magenta => "35",
            ColorAttr::Cyan => "36",
            ColorAttr::White => "37",
            ColorAttr::BrightBlack => "90",
            ColorAttr::BrightRed => "91",
            ColorAttr::BrightGreen => "92",
            ColorAttr::BrightYellow => "93",
            ColorAttr::BrightBlue => "94",
            ColorAttr::BrightMagenta => "95",
            ColorAttr::BrightCyan => "96",
            ColorAttr::BrightWhite => "97",
            ColorAttr::Bold => "1",
        }
    }
}

/// Wraps `text` in the ANSI SGR codes for `attrs`, in order, reset at the
/// end. A no-op (returns `text` unchanged) when `attrs` is empty.
pub fn apply_colors(text: &str, attrs: &[ColorAttr]) -> String {
    if attrs.is_empty() {
        return text.to_string();
    }
    let codes: Vec<&str> = attrs.iter().map(|a| a.ansi_code()).collect();
    format!("\x1b[{}m{}\x1b[0m", codes.join(";"), text)
}

/// The output a [`Formatter`] produces: either a UTF-8 line or an opaque
/// binary payload (MsgPack).
#[derive(Debug, Clone)]
pub enum Formatted {
    Text(String),
    Binary(Vec<u8>),
}

impl Formatted {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Formatted::Text(s) => s.as_bytes(),
            Formatted::Binary(b) => b,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Formatted::Text(s) => Some(s),
            Formatted::Binary(_) => None,
        }
    }
}

/// Renders an [`Event`] into output a transport can write (spec §4.2).
/// A formatter must be pure: same event, same bytes. Returning `None`
/// declines to produce output for this event; a [`FormatterChain`] (or a
/// transport holding more than one formatter) tries the next one (spec §6
/// "Formatter output contract").
pub trait Formatter: Send + Sync {
    fn format(&self, event: &Event) -> Option<Formatted>;
}

impl<F> Formatter for F
where
    F: Fn(&Event) -> Option<Formatted> + Send + Sync,
{
    fn format(&self, event: &Event) -> Option<Formatted> {
        self(event)
    }
}

/// An ordered list of formatters tried in turn; the first one that doesn't
/// decline wins (spec §6: "the transport may try the next formatter in the
/// chain"). Itself a [`Formatter`], so a transport holding a single
/// `Box<dyn Formatter>` can hold a chain without any change to its field.
#[derive(Default)]
pub struct FormatterChain {
    formatters: Vec<Box<dyn Formatter>>,
}

impl FormatterChain {
    pub fn new() -> Self {
        FormatterChain { formatters: Vec::new() }
    }

    pub fn push(mut self, formatter: Box<dyn Formatter>) -> Self {
        self.formatters.push(formatter);
        self
    }
}

impl Formatter for FormatterChain {
    fn format(&self, event: &Event) -> Option<Formatted> {
        self.formatters.iter().find_map(|f| f.format(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn unix_seconds_and_millis_agree() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 1).unwrap();
        assert_eq!(TimestampStyle::UnixSeconds.format(dt), "1704067201");
        assert_eq!(TimestampStyle::UnixMillis.format(dt), "1704067201000");
    }

    #[test]
    fn custom_pattern_is_honored() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(
            TimestampStyle::Custom("%Y%m%d").format(dt),
            "20240304"
        );
    }

    #[test]
    fn chain_falls_through_to_the_next_formatter_on_decline() {
        use crate::event::Message;
        use crate::levels::Severity;
        use crate::scope::Scope;

        let decline_everything = |_: &Event| -> Option<Formatted> { None };
        let always_text = |_: &Event| -> Option<Formatted> { Some(Formatted::Text("fallback".to_string())) };
        let chain = FormatterChain::new()
            .push(Box::new(decline_everything))
            .push(Box::new(always_text));

        let event = Event::new(Severity::Info, Message::from_str("hi"), Scope::default());
        let Some(Formatted::Text(text)) = chain.format(&event) else {
            panic!("chain should fall through to the second formatter");
        };
        assert_eq!(text, "fallback");
    }

    #[test]
    fn chain_declines_when_every_member_declines() {
        let decline_everything = |_: &Event| -> Option<Formatted> { None };
        let chain = FormatterChain::new().push(Box::new(decline_everything));
        use crate::event::Message;
        use crate::levels::Severity;
        use crate::scope::Scope;
        let event = Event::new(Severity::Info, Message::from_str("hi"), Scope::default());
        assert!(chain.format(&event).is_none());
    }
}
