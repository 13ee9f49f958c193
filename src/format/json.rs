//! JSON formatter (spec §4.2): one JSON object per event, tags/extra merged
//! with scope-level values, attached objects inlined when their metadata
//! parses as JSON and base64-encoded otherwise.

use super::{Formatted, Formatter, TimestampStyle};
use crate::event::Event;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttachedObjectPolicy {
    #[default]
    Inline,
    Base64,
    Omit,
}

/// A configurable JSON formatter.
pub struct JsonFormatter {
    pub timestamp_style: TimestampStyle,
    pub attached_object_policy: AttachedObjectPolicy,
    pub pretty: bool,
}

impl Default for JsonFormatter {
    fn default() -> Self {
        JsonFormatter {
            timestamp_style: TimestampStyle::Rfc3339,
            attached_object_policy: AttachedObjectPolicy::Inline,
            pretty: false,
        }
    }
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    fn build_value(&self, event: &Event) -> Value {
        let mut obj = Map::new();
        obj.insert(
            "timestamp".into(),
            Value::String(self.timestamp_style.format(event.timestamp())),
        );
        obj.insert("level".into(), Value::String(event.level().simple().to_string()));
        obj.insert("message".into(), Value::String(event.render_message()));
        obj.insert("event_id".into(), Value::String(format!("{:032x}", event.id())));

        if let Some(subsystem) = &event.subsystem {
            obj.insert("subsystem".into(), Value::String(subsystem.clone()));
        }
        if let Some(category) = &event.category {
            obj.insert("category".into(), Value::String(category.clone()));
        }

        let tags = event.merged_tags();
        if !tags.is_empty() {
            obj.insert(
                "tags".into(),
                Value::Object(tags.into_iter().map(|(k, v)| (k, Value::String(v))).collect()),
            );
        }

        let extra = event.merged_extra();
        if !extra.is_empty() {
            obj.insert(
                "extra".into(),
                Value::Object(extra.into_iter().map(|(k, v)| (k, v.to_json())).collect()),
            );
        }

        if let Some(call_site) = &event.scope().call_site {
            obj.insert(
                "call_site".into(),
                json!({
                    "file": call_site.file,
                    "line": call_site.line,
                    "function": call_site.function,
                }),
            );
        }

        if let Some(user) = &event.scope().user {
            obj.insert(
                "user".into(),
                json!({
                    "id": user.id,
                    "email": user.email,
                    "username": user.username,
                    "ip": user.ip,
                }),
            );
        }

        if let Some(attached) = &event.attached_object {
            match self.attached_object_policy {
                AttachedObjectPolicy::Omit => {}
                AttachedObjectPolicy::Base64 => {
                    let (metadata, bytes) = attached.serialize();
                    obj.insert(
                        "object_metadata".into(),
                        Value::Object(
                            metadata.into_iter().map(|(k, v)| (k, v.to_json())).collect(),
                        ),
                    );
                    obj.insert("object".into(), Value::String(crate::utils::base64::encode(&bytes)));
                }
                AttachedObjectPolicy::Inline => {
                    let (metadata, bytes) = attached.serialize();
                    obj.insert(
                        "object_metadata".into(),
                        Value::Object(
                            metadata.into_iter().map(|(k, v)| (k, v.to_json())).collect(),
                        ),
                    );
                    match serde_json::from_slice::<Value>(&bytes) {
                        Ok(parsed) => {
                            obj.insert("object".into(), parsed);
                        }
                        Err(_) => {
                            obj.insert(
                                "object".into(),
                                Value::String(crate::utils::base64::encode(&bytes)),
                            );
                        }
                    }
                }
            }
        }

        Value::Object(obj)
    }
}

impl Formatter for JsonFormatter {
    fn format(&self, event: &Event) -> Option<Formatted> {
        let value = self.build_value(event);
        let text = if self.pretty {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        }
        .unwrap_or_else(|_| "{}".to_string());
        Some(Formatted::Text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Message;
    use crate::levels::Severity;
    use crate::scope::Scope;

    #[test]
    fn json_output_contains_level_and_message() {
        let formatter = JsonFormatter::new();
        let event = Event::new(Severity::Warning, Message::from_str("disk low"), Scope::default());
        let Formatted::Text(text) = formatter.format(&event).unwrap() else {
            panic!("expected text output");
        };
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["level"], "WARNING");
        assert_eq!(value["message"], "disk low");
        assert!(value["event_id"].is_string());
    }

    #[test]
    fn attached_object_without_valid_json_falls_back_to_base64() {
        struct RawBytes;
        impl crate::event::AttachStrategy for RawBytes {
            fn serialize(&self) -> (ahash::AHashMap<String, crate::event::ExtraValue>, Vec<u8>) {
                (ahash::AHashMap::new(), vec![0xff, 0x00, 0x10])
            }
        }
        let mut event = Event::new(Severity::Info, Message::from_str("x"), Scope::default());
        event.attached_object = Some(crate::event::AttachedObject::new(std::sync::Arc::new(RawBytes)));
        let formatter = JsonFormatter::new();
        let Formatted::Text(text) = formatter.format(&event).unwrap() else {
            panic!("expected text output");
        };
        let value: Value = serde_json::from_str(&text).unwrap();
        assert!(value["object"].is_string());
    }
}
