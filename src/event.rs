//! The event model (component C1): an immutable record of a single log
//! occurrence, plus the lazy message-interpolation machinery described in
//! spec §3 and §9.

use crate::levels::Severity;
use crate::scope::Scope;
use ahash::AHashMap;
use chrono::{DateTime, Utc};
use smallvec::SmallVec;
use std::sync::Arc;
use uuid::Uuid;

/// Privacy policy for an interpolated message segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privacy {
    Public,
    Private,
    PartiallyHide,
}

/// Padding directive shared by message segments and formatter fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    Left(usize),
    Right(usize),
    Center(usize),
    None,
}

/// Truncation directive shared by message segments and formatter fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truncation {
    Head(usize),
    Middle(usize),
    Tail(usize),
    None,
}

pub const ELLIPSIS: char = '\u{2026}'; // …
pub const MASK_CHAR: char = '*';

/// Applies padding to `s`, padding with `fill` up to `width` columns.
/// A no-op if `s` is already at least `width` columns (padding never truncates).
pub fn pad(s: &str, padding: Padding, fill: char) -> String {
    match padding {
        Padding::None => s.to_string(),
        Padding::Left(width) => pad_side(s, width, fill, true, false),
        Padding::Right(width) => pad_side(s, width, fill, false, true),
        Padding::Center(width) => {
            let len = s.chars().count();
            if len >= width {
                return s.to_string();
            }
            let total = width - len;
            let left = total / 2;
            let right = total - left;
            let mut out = String::with_capacity(width);
            out.extend(std::iter::repeat(fill).take(left));
            out.push_str(s);
            out.extend(std::iter::repeat(fill).take(right));
            out
        }
    }
}

fn pad_side(s: &str, width: usize, fill: char, left: bool, right: bool) -> String {
    let len = s.chars().count();
    if len >= width {
        return s.to_string();
    }
    let missing = width - len;
    let mut out = String::with_capacity(width);
    if left {
        out.extend(std::iter::repeat(fill).take(missing));
    }
    out.push_str(s);
    if right {
        out.extend(std::iter::repeat(fill).take(missing));
    }
    out
}

/// Truncates `s` to exactly `n` columns (when shorter than or equal to `n`,
/// `s` is returned unchanged), replacing the elided portion with [`ELLIPSIS`].
/// `n == 0` yields the ellipsis character alone.
pub fn truncate(s: &str, truncation: Truncation) -> String {
    let chars: Vec<char> = s.chars().collect();
    match truncation {
        Truncation::None => s.to_string(),
        Truncation::Head(n) => truncate_with(&chars, n, |keep| {
            let start = chars.len() - keep;
            format!("{}{}", ELLIPSIS, chars[start..].iter().collect::<String>())
        }),
        Truncation::Tail(n) => truncate_with(&chars, n, |keep| {
            format!("{}{}", chars[..keep].iter().collect::<String>(), ELLIPSIS)
        }),
        Truncation::Middle(n) => truncate_with(&chars, n, |keep| {
            let head = keep / 2;
            let tail = keep - head;
            let head_s: String = chars[..head].iter().collect();
            let tail_s: String = chars[chars.len() - tail..].iter().collect();
            format!("{head_s}{ELLIPSIS}{tail_s}")
        }),
    }
}

fn truncate_with(chars: &[char], n: usize, build: impl FnOnce(usize) -> String) -> String {
    if n == 0 {
        return ELLIPSIS.to_string();
    }
    if chars.len() <= n {
        return chars.iter().collect();
    }
    // reserve one slot for the ellipsis itself
    let keep = n.saturating_sub(1);
    build(keep)
}

/// Redacts `s` per `privacy`. A private string of length <= 3 redacts
/// entirely to the mask sentinel (spec §8 boundary behavior).
pub fn redact(s: &str, privacy: Privacy, disable_redaction: bool) -> String {
    if disable_redaction || matches!(privacy, Privacy::Public) {
        return s.to_string();
    }
    match privacy {
        Privacy::Public => unreachable!(),
        Privacy::Private => "<redacted>".to_string(),
        Privacy::PartiallyHide => {
            let len = s.chars().count();
            let visible = std::cmp::max(3, len / 2);
            if visible >= len {
                return "<redacted>".to_string();
            }
            let keep_from = len - visible;
            let chars: Vec<char> = s.chars().collect();
            let masked: String = std::iter::repeat(MASK_CHAR).take(keep_from).collect();
            let tail: String = chars[keep_from..].iter().collect();
            format!("{masked}{tail}")
        }
    }
}

/// Date/number/bool/measure rendering hint for a typed interpolation segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormatHint {
    None,
    Date(crate::format::TimestampStyle),
    Number,
    Bool,
    Measure,
}

/// The typed value carried by a non-literal message segment.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(DateTime<Utc>),
    Measure(f64, String),
}

impl SegmentValue {
    fn render_raw(&self, hint: FormatHint) -> String {
        match (self, hint) {
            (SegmentValue::Date(dt), FormatHint::Date(style)) => style.format(*dt),
            (SegmentValue::Date(dt), _) => dt.to_rfc3339(),
            (SegmentValue::Measure(v, unit), _) => format!("{v}{unit}"),
            (SegmentValue::Float(v), _) => v.to_string(),
            (SegmentValue::Int(v), _) => v.to_string(),
            (SegmentValue::Bool(v), _) => v.to_string(),
            (SegmentValue::Str(v), _) => v.clone(),
        }
    }
}

/// One piece of a lazily-rendered message: either fixed text or a typed,
/// privacy-tagged value with its own padding/truncation directives.
#[derive(Debug, Clone)]
pub enum Segment {
    Literal(String),
    Typed {
        value: SegmentValue,
        format: FormatHint,
        privacy: Privacy,
        padding: Padding,
        truncation: Truncation,
    },
}

/// A lazily-rendered message: a sequence of segments. The textual body is
/// not materialized until a formatter calls [`Message::render`].
#[derive(Debug, Clone, Default)]
pub struct Message {
    segments: SmallVec<[Segment; 4]>,
}

impl Message {
    pub fn new() -> Self {
        Message {
            segments: SmallVec::new(),
        }
    }

    pub fn from_str(text: impl Into<String>) -> Self {
        let mut m = Message::new();
        m.push_literal(text);
        m
    }

    pub fn push_literal(&mut self, text: impl Into<String>) -> &mut Self {
        self.segments.push(Segment::Literal(text.into()));
        self
    }

    pub fn push_typed(
        &mut self,
        value: SegmentValue,
        format: FormatHint,
        privacy: Privacy,
        padding: Padding,
        truncation: Truncation,
    ) -> &mut Self {
        self.segments.push(Segment::Typed {
            value,
            format,
            privacy,
            padding,
            truncation,
        });
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Renders the full message text, applying each segment's privacy,
    /// format hint, truncation, and padding in that order (spec §4.2 step 2,
    /// applied at the segment granularity since each segment carries its own
    /// directives).
    pub fn render(&self, disable_redaction: bool) -> String {
        let mut out = String::new();
        for seg in &self.segments {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Typed {
                    value,
                    format,
                    privacy,
                    padding,
                    truncation,
                } => {
                    let raw = value.render_raw(*format);
                    let redacted = redact(&raw, *privacy, disable_redaction);
                    let truncated = truncate(&redacted, *truncation);
                    let padded = pad(&truncated, *padding, ' ');
                    out.push_str(&padded);
                }
            }
        }
        out
    }
}

/// A polymorphic field value for `extra` and nested structures.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtraValue {
    Str(String),
    Number(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    Map(AHashMap<String, ExtraValue>),
    Array(Vec<ExtraValue>),
}

impl ExtraValue {
    /// Converts to a JSON value; byte blobs are base64-encoded since JSON has
    /// no native binary type.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            ExtraValue::Str(s) => Value::String(s.clone()),
            ExtraValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ExtraValue::Bool(b) => Value::Bool(*b),
            ExtraValue::Bytes(b) => Value::String(crate::utils::base64::encode(b)),
            ExtraValue::Map(m) => {
                Value::Object(m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
            }
            ExtraValue::Array(a) => Value::Array(a.iter().map(ExtraValue::to_json).collect()),
        }
    }
}

/// Serializes natively rather than through JSON so binary-capable wire
/// formats (MsgPack) can embed `Bytes` as a real `bin` type and maps/arrays
/// as their own native types, instead of losing fidelity through a JSON
/// intermediate (spec §4.2 "Binary payloads are embedded as MsgPack bin").
impl serde::Serialize for ExtraValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        match self {
            ExtraValue::Str(s) => serializer.serialize_str(s),
            ExtraValue::Number(n) => serializer.serialize_f64(*n),
            ExtraValue::Bool(b) => serializer.serialize_bool(*b),
            ExtraValue::Bytes(b) => serializer.serialize_bytes(b),
            ExtraValue::Map(m) => {
                let mut map = serializer.serialize_map(Some(m.len()))?;
                for (k, v) in m {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            ExtraValue::Array(a) => a.serialize(serializer),
        }
    }
}

/// Deserializes from whatever self-describing shape [`ExtraValue::serialize`]
/// produced. Written against `deserialize_any`/a `Visitor` rather than a
/// derived impl so it works unchanged across every self-describing format
/// this crate uses (JSON, MsgPack) — each format's deserializer dispatches
/// to the matching `visit_*` call based on its own type tag.
impl<'de> serde::Deserialize<'de> for ExtraValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct ExtraValueVisitor;

        impl<'de> serde::de::Visitor<'de> for ExtraValueVisitor {
            type Value = ExtraValue;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a string, number, bool, byte blob, map, or array")
            }

            fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E> {
                Ok(ExtraValue::Bool(v))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
                Ok(ExtraValue::Number(v as f64))
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
                Ok(ExtraValue::Number(v as f64))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
                Ok(ExtraValue::Number(v))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
                Ok(ExtraValue::Str(v.to_string()))
            }

            fn visit_string<E>(self, v: String) -> Result<Self::Value, E> {
                Ok(ExtraValue::Str(v))
            }

            fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E> {
                Ok(ExtraValue::Bytes(v.to_vec()))
            }

            fn visit_byte_buf<E>(self, v: Vec<u8>) -> Result<Self::Value, E> {
                Ok(ExtraValue::Bytes(v))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let mut items = Vec::new();
                while let Some(item) = seq.next_element()? {
                    items.push(item);
                }
                Ok(ExtraValue::Array(items))
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let mut out = AHashMap::new();
                while let Some((k, v)) = map.next_entry::<String, ExtraValue>()? {
                    out.insert(k, v);
                }
                Ok(ExtraValue::Map(out))
            }
        }

        deserializer.deserialize_any(ExtraValueVisitor)
    }
}

/// A strategy for serializing an opaque attached object into metadata and a
/// byte payload (spec §3: "an opaque payload that can be serialized by an
/// attached strategy, producing `(metadata: mapping, bytes: blob)`").
pub trait AttachStrategy: Send + Sync {
    fn serialize(&self) -> (AHashMap<String, ExtraValue>, Vec<u8>);
}

#[derive(Clone)]
pub struct AttachedObject {
    strategy: Arc<dyn AttachStrategy>,
}

impl AttachedObject {
    pub fn new(strategy: Arc<dyn AttachStrategy>) -> Self {
        AttachedObject { strategy }
    }

    pub fn serialize(&self) -> (AHashMap<String, ExtraValue>, Vec<u8>) {
        self.strategy.serialize()
    }
}

impl std::fmt::Debug for AttachedObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachedObject").finish_non_exhaustive()
    }
}

/// An immutable record of a single log occurrence (spec §3).
///
/// `id`, `timestamp`, `level`, `scope`, and `message` never change after
/// construction (invariant #1).
#[derive(Debug, Clone)]
pub struct Event {
    id: u128,
    timestamp: DateTime<Utc>,
    level: Severity,
    message: Message,
    pub subsystem: Option<String>,
    pub category: Option<String>,
    pub tags: AHashMap<String, String>,
    pub extra: AHashMap<String, ExtraValue>,
    pub attached_object: Option<AttachedObject>,
    scope: Scope,
}

impl Event {
    pub fn new(level: Severity, message: Message, scope: Scope) -> Self {
        Event {
            id: Uuid::new_v4().as_u128(),
            timestamp: Utc::now(),
            level,
            message,
            subsystem: None,
            category: None,
            tags: AHashMap::new(),
            extra: AHashMap::new(),
            attached_object: None,
            scope,
        }
    }

    /// Test/replay constructor allowing explicit id/timestamp so fixtures are
    /// deterministic; production code should use [`Event::new`].
    pub fn with_id_and_timestamp(
        id: u128,
        timestamp: DateTime<Utc>,
        level: Severity,
        message: Message,
        scope: Scope,
    ) -> Self {
        Event {
            id,
            timestamp,
            level,
            message,
            subsystem: None,
            category: None,
            tags: AHashMap::new(),
            extra: AHashMap::new(),
            attached_object: None,
            scope,
        }
    }

    pub fn id(&self) -> u128 {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn level(&self) -> Severity {
        self.level
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Renders the message honoring the process-wide privacy-redaction flag
    /// (spec §6: "disable_privacy_redaction... true by default in debug").
    /// Formatters should call this instead of [`Message::render`] directly
    /// so every sink observes the same redaction policy.
    pub fn render_message(&self) -> String {
        self.message.render(crate::scope::privacy_redaction_disabled())
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Builds the merged view of a tag: event-level value wins, falling back
    /// to the scope's `scope_tags` (spec §3 "Merging rule" — a view, never a
    /// mutation of the raw event).
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .get(key)
            .or_else(|| self.scope.scope_tags.get(key))
            .map(String::as_str)
    }

    /// Merged view over all tag keys, event-level values taking precedence.
    pub fn merged_tags(&self) -> AHashMap<String, String> {
        let mut merged = self.scope.scope_tags.clone();
        merged.extend(self.tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    pub fn extra_value(&self, key: &str) -> Option<&ExtraValue> {
        self.extra
            .get(key)
            .or_else(|| self.scope.scope_extra.get(key))
    }

    pub fn merged_extra(&self) -> AHashMap<String, ExtraValue> {
        let mut merged = self.scope.scope_extra.clone();
        merged.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}

/// The async durable sink's "internal canonical encoder" (spec §4.3 record
/// path step 1: "language-neutral; must round-trip"). A flattened, directly
/// `serde`-able view of an [`Event`] — the lazy [`Message`] is resolved to
/// its final text at encode time, since by the time an event reaches a
/// durable buffer its privacy/format decisions are already fixed.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: Severity,
    pub message: String,
    pub subsystem: Option<String>,
    pub category: Option<String>,
    pub tags: std::collections::BTreeMap<String, String>,
    pub extra: std::collections::BTreeMap<String, ExtraValue>,
}

impl EventRecord {
    pub fn from_event(event: &Event) -> Self {
        EventRecord {
            id: format!("{:032x}", event.id),
            timestamp: event.timestamp,
            level: event.level,
            message: event.render_message(),
            subsystem: event.subsystem.clone(),
            category: event.category.clone(),
            tags: event.tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            extra: event.extra.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }

    /// Encodes to MsgPack bytes: a language-neutral, self-describing wire
    /// format any consumer can read back without this crate's types. MsgPack
    /// (not JSON) specifically because it has a native binary type, so
    /// `ExtraValue::Bytes` round-trips byte-exact instead of degrading into
    /// a JSON array of numbers (spec §6: "a binary encoding").
    pub fn to_bytes(&self) -> Vec<u8> {
        rmp_serde::to_vec_named(self).expect("EventRecord always serializes")
    }

    pub fn from_bytes(bytes: &[u8]) -> crate::error::Result<Self> {
        rmp_serde::from_slice(bytes).map_err(|err| crate::error::LogCoreError::Data(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_is_noop_when_not_shorter() {
        assert_eq!(pad("hello", Padding::Left(3), ' '), "hello");
        assert_eq!(pad("hello", Padding::Left(5), ' '), "hello");
    }

    #[test]
    fn padding_pads_to_width() {
        assert_eq!(pad("ab", Padding::Left(5), '0'), "000ab");
        assert_eq!(pad("ab", Padding::Right(5), '0'), "ab000");
        assert_eq!(pad("ab", Padding::Center(6), '-'), "--ab--");
    }

    #[test]
    fn truncation_zero_yields_ellipsis_alone() {
        assert_eq!(truncate("hello world", Truncation::Tail(0)), "\u{2026}");
        assert_eq!(truncate("hello world", Truncation::Head(0)), "\u{2026}");
    }

    #[test]
    fn truncation_is_noop_when_already_short() {
        assert_eq!(truncate("hi", Truncation::Tail(10)), "hi");
    }

    #[test]
    fn truncation_tail_keeps_head() {
        let out = truncate("abcdefghij", Truncation::Tail(5));
        assert_eq!(out, "abcd\u{2026}");
    }

    #[test]
    fn private_short_string_redacts_entirely() {
        assert_eq!(redact("ab", Privacy::PartiallyHide, false), "<redacted>");
        assert_eq!(redact("abc", Privacy::Private, false), "<redacted>");
    }

    #[test]
    fn partially_hide_keeps_at_least_half_or_three() {
        let out = redact("1234567890", Privacy::PartiallyHide, false);
        assert_eq!(out, "*****67890");
    }

    #[test]
    fn disable_redaction_short_circuits() {
        assert_eq!(redact("secret", Privacy::Private, true), "secret");
    }

    #[test]
    fn message_renders_literal_and_typed_segments() {
        let mut msg = Message::new();
        msg.push_literal("count=");
        msg.push_typed(
            SegmentValue::Int(42),
            FormatHint::Number,
            Privacy::Public,
            Padding::None,
            Truncation::None,
        );
        assert_eq!(msg.render(false), "count=42");
    }

    #[test]
    fn event_tag_merging_prefers_event_level() {
        let mut scope = Scope::default();
        scope.scope_tags.insert("env".to_string(), "scope".to_string());
        scope.scope_tags.insert("region".to_string(), "us".to_string());
        let mut event = Event::new(Severity::Info, Message::from_str("hi"), scope);
        event.tags.insert("env".to_string(), "event".to_string());
        assert_eq!(event.tag("env"), Some("event"));
        assert_eq!(event.tag("region"), Some("us"));
        assert_eq!(event.merged_tags().len(), 2);
    }

    #[test]
    fn event_record_round_trips_through_the_canonical_encoder() {
        let mut event = Event::new(Severity::Error, Message::from_str("disk full"), Scope::default());
        event.subsystem = Some("storage".to_string());
        event.tags.insert("host".to_string(), "db-1".to_string());
        event.extra.insert("retries".to_string(), ExtraValue::Number(3.0));
        event.extra.insert(
            "blob".to_string(),
            ExtraValue::Bytes(vec![0xde, 0xad, 0xbe, 0xef]),
        );

        let record = EventRecord::from_event(&event);
        let bytes = record.to_bytes();
        let decoded = EventRecord::from_bytes(&bytes).unwrap();

        assert_eq!(decoded, record);
        assert_eq!(decoded.message, "disk full");
        assert_eq!(decoded.tags.get("host").map(String::as_str), Some("db-1"));
        assert_eq!(decoded.extra.get("retries"), Some(&ExtraValue::Number(3.0)));
    }
}
