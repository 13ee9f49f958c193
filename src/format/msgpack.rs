//! MessagePack formatter: the same field set as [`super::json`], encoded as
//! binary MsgPack via `rmp-serde` instead of JSON text (spec §4.2 "binary
//! output formats").

use super::{Formatted, Formatter};
use crate::event::{Event, ExtraValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `extra` serializes through [`ExtraValue`]'s own `Serialize` impl rather
/// than through `serde_json::Value`, so `Bytes` payloads reach the wire as a
/// native MsgPack `bin` type and `Map`/`Array` stay native map/array types
/// instead of losing fidelity through a JSON intermediate (spec §4.2
/// "binary payloads are embedded as MsgPack bin").
#[derive(Serialize, Deserialize)]
struct WireEvent {
    timestamp: String,
    level: String,
    message: String,
    event_id: String,
    subsystem: Option<String>,
    category: Option<String>,
    tags: BTreeMap<String, String>,
    extra: BTreeMap<String, ExtraValue>,
}

#[derive(Default)]
pub struct MsgPackFormatter {
    pub timestamp_style: super::TimestampStyle,
}

impl MsgPackFormatter {
    pub fn new() -> Self {
        MsgPackFormatter {
            timestamp_style: super::TimestampStyle::Rfc3339,
        }
    }
}

impl Formatter for MsgPackFormatter {
    fn format(&self, event: &Event) -> Option<Formatted> {
        let wire = WireEvent {
            timestamp: self.timestamp_style.format(event.timestamp()),
            level: event.level().simple().to_string(),
            message: event.render_message(),
            event_id: format!("{:032x}", event.id()),
            subsystem: event.subsystem.clone(),
            category: event.category.clone(),
            tags: event.merged_tags().into_iter().collect(),
            extra: event.merged_extra().into_iter().collect(),
        };
        let bytes = rmp_serde::to_vec_named(&wire).unwrap_or_default();
        Some(Formatted::Binary(bytes))
    }
}
