//! Declarative "fields" formatter (spec §4.2): an ordered list of [`Field`]s,
//! each producing one piece of the output line, joined by a configurable
//! delimiter. Grounded on the teacher's `{time} | {level} | {message}`
//! template engine, generalized to the full closed field set and to typed
//! padding/truncation/privacy directives instead of plain string splicing.

use super::{apply_colors, ColorAttr, Formatted, Formatter, LevelStyle, StructureFormat, TimestampStyle};
use crate::event::{pad, redact, truncate, Event, Padding, Privacy, Truncation};
use std::sync::Arc;

/// One element of a [`FieldSpec`] list. Closed set, matching the fixed
/// vocabulary a façade call-site or config file can name.
#[derive(Clone)]
pub enum Field {
    Timestamp(TimestampStyle),
    Level(LevelStyle),
    Message,
    Literal(String),
    Delimiter,
    Subsystem,
    Category,
    Label,
    Icon,
    CallSite,
    CallingThread,
    ProcessId,
    ProcessName,
    UserId,
    UserEmail,
    UserName,
    IpAddress,
    UserData(StructureFormat),
    Fingerprint,
    EventUuid,
    ObjectMetadata(StructureFormat),
    Object,
    Tags(StructureFormat),
    Extra(StructureFormat),
    StackFrame,
    /// A caller-supplied resolver function (spec §4.2 `custom_value(fn)`),
    /// distinct from `extra(keys?)`'s static key lookup. Declines (`None`)
    /// the same way a missing static field does.
    Custom(Arc<dyn Fn(&Event) -> Option<String> + Send + Sync>),
}

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::Timestamp(style) => f.debug_tuple("Timestamp").field(style).finish(),
            Field::Level(style) => f.debug_tuple("Level").field(style).finish(),
            Field::Message => f.write_str("Message"),
            Field::Literal(text) => f.debug_tuple("Literal").field(text).finish(),
            Field::Delimiter => f.write_str("Delimiter"),
            Field::Subsystem => f.write_str("Subsystem"),
            Field::Category => f.write_str("Category"),
            Field::Label => f.write_str("Label"),
            Field::Icon => f.write_str("Icon"),
            Field::CallSite => f.write_str("CallSite"),
            Field::CallingThread => f.write_str("CallingThread"),
            Field::ProcessId => f.write_str("ProcessId"),
            Field::ProcessName => f.write_str("ProcessName"),
            Field::UserId => f.write_str("UserId"),
            Field::UserEmail => f.write_str("UserEmail"),
            Field::UserName => f.write_str("UserName"),
            Field::IpAddress => f.write_str("IpAddress"),
            Field::UserData(format) => f.debug_tuple("UserData").field(format).finish(),
            Field::Fingerprint => f.write_str("Fingerprint"),
            Field::EventUuid => f.write_str("EventUuid"),
            Field::ObjectMetadata(format) => f.debug_tuple("ObjectMetadata").field(format).finish(),
            Field::Object => f.write_str("Object"),
            Field::Tags(format) => f.debug_tuple("Tags").field(format).finish(),
            Field::Extra(format) => f.debug_tuple("Extra").field(format).finish(),
            Field::StackFrame => f.write_str("StackFrame"),
            Field::Custom(_) => f.write_str("Field::Custom(..)"),
        }
    }
}

/// A single ordered string-to-string transform step (spec §4.2
/// "transforms: ordered list of string→string functions (e.g. upper-case)").
#[derive(Clone)]
pub enum Transform {
    Upper,
    Lower,
    Trim,
    Custom(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

impl Transform {
    fn apply(&self, s: &str) -> String {
        match self {
            Transform::Upper => s.to_uppercase(),
            Transform::Lower => s.to_lowercase(),
            Transform::Trim => s.trim().to_string(),
            Transform::Custom(f) => f(s),
        }
    }
}

impl std::fmt::Debug for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transform::Upper => f.write_str("Transform::Upper"),
            Transform::Lower => f.write_str("Transform::Lower"),
            Transform::Trim => f.write_str("Transform::Trim"),
            Transform::Custom(_) => f.write_str("Transform::Custom(..)"),
        }
    }
}

/// A field with its rendering directives. Applied in the order spec §4.2
/// step 2 prescribes: privacy redaction, transforms, truncation, padding,
/// `format_string` wrapping, then color attributes.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub field: Field,
    pub padding: Padding,
    pub truncation: Truncation,
    pub privacy: Privacy,
    pub transforms: Vec<Transform>,
    /// A single-placeholder decoration, e.g. `"[%s]"` (spec §4.2
    /// `format_string`). `%s` is replaced with the field's rendered value.
    pub format_string: Option<String>,
    pub colors: Vec<ColorAttr>,
}

impl FieldSpec {
    pub fn new(field: Field) -> Self {
        FieldSpec {
            field,
            padding: Padding::None,
            truncation: Truncation::None,
            privacy: Privacy::Public,
            transforms: Vec::new(),
            format_string: None,
            colors: Vec::new(),
        }
    }

    pub fn with_padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_truncation(mut self, truncation: Truncation) -> Self {
        self.truncation = truncation;
        self
    }

    pub fn with_privacy(mut self, privacy: Privacy) -> Self {
        self.privacy = privacy;
        self
    }

    pub fn with_transforms(mut self, transforms: Vec<Transform>) -> Self {
        self.transforms = transforms;
        self
    }

    pub fn with_format_string(mut self, format_string: impl Into<String>) -> Self {
        self.format_string = Some(format_string.into());
        self
    }

    pub fn with_colors(mut self, colors: Vec<ColorAttr>) -> Self {
        self.colors = colors;
        self
    }
}

fn render_structure(format: StructureFormat, pairs: &[(String, String)]) -> String {
    match format {
        StructureFormat::QueryString => pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&"),
        StructureFormat::List => pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", "),
        StructureFormat::Object => {
            let inner = pairs
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{{{inner}}}")
        }
        StructureFormat::Json => {
            let obj: serde_json::Map<String, serde_json::Value> = pairs
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            serde_json::to_string(&serde_json::Value::Object(obj)).unwrap_or_default()
        }
        StructureFormat::Table => {
            super::table::render_pairs_table(pairs, super::table::BoxStyle::Light)
        }
    }
}

/// Declarative field-list formatter (analogous to the teacher's string
/// template, but built from typed [`FieldSpec`]s rather than `{placeholder}`
/// text substitution).
pub struct FieldsFormatter {
    pub fields: Vec<FieldSpec>,
    pub delimiter: String,
    /// Whether this formatter's destination is terminal-capable (spec §4.2:
    /// "colors... applied by terminal-capable sinks only"). `false` by
    /// default; non-interactive sinks (file, SQLite, HTTP) never set it.
    pub supports_color: bool,
    pub skip_missing_fields: bool,
}

impl FieldsFormatter {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        FieldsFormatter {
            fields,
            delimiter: " | ".to_string(),
            supports_color: false,
            skip_missing_fields: true,
        }
    }

    pub fn with_color(mut self, supports_color: bool) -> Self {
        self.supports_color = supports_color;
        self
    }

    /// The teacher's familiar default: `{time} | {level} | {message}`.
    pub fn default_line() -> Self {
        FieldsFormatter::new(vec![
            FieldSpec::new(Field::Timestamp(TimestampStyle::Iso8601)),
            FieldSpec::new(Field::Level(LevelStyle::Simple)),
            FieldSpec::new(Field::Message),
        ])
    }

    fn resolve_field(&self, spec: &FieldSpec, event: &Event) -> Option<String> {
        let raw = match &spec.field {
            Field::Timestamp(style) => style.format(event.timestamp()),
            Field::Level(style) => style.render(event.level()),
            Field::Message => event.render_message(),
            Field::Literal(text) => text.clone(),
            Field::Delimiter => self.delimiter.clone(),
            Field::Subsystem => event.subsystem.clone()?,
            Field::Category => event.category.clone()?,
            Field::Label => event.category.clone().or_else(|| event.subsystem.clone())?,
            Field::Icon => event.level().emoji().to_string(),
            Field::CallSite => {
                let call_site = event.scope().call_site.as_ref()?;
                format!(
                    "{}:{}",
                    call_site.file.as_deref().unwrap_or("?"),
                    call_site.line.map(|l| l.to_string()).unwrap_or_default()
                )
            }
            Field::CallingThread => event.scope().thread_id.map(|t| t.to_string())?,
            Field::ProcessId => event.scope().process_id.map(|p| p.to_string())?,
            Field::ProcessName => event.scope().process_name.clone()?,
            Field::UserId => event.scope().user.as_ref()?.id.clone()?,
            Field::UserEmail => event.scope().user.as_ref()?.email.clone()?,
            Field::UserName => event.scope().user.as_ref()?.username.clone()?,
            Field::IpAddress => event.scope().user.as_ref()?.ip.clone()?,
            Field::UserData(format) => {
                let user = event.scope().user.as_ref()?;
                if user.data.is_empty() {
                    return None;
                }
                let mut pairs: Vec<_> = user.data.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                pairs.sort();
                render_structure(*format, &pairs)
            }
            Field::Fingerprint => format!("{:016x}", event.id() & 0xffff_ffff_ffff_ffff),
            Field::EventUuid => format!("{:032x}", event.id()),
            Field::ObjectMetadata(format) => {
                let attached = event.attached_object.as_ref()?;
                let (metadata, _) = attached.serialize();
                if metadata.is_empty() {
                    return None;
                }
                let mut pairs: Vec<_> = metadata
                    .iter()
                    .map(|(k, v)| (k.clone(), format!("{:?}", v)))
                    .collect();
                pairs.sort();
                render_structure(*format, &pairs)
            }
            Field::Object => {
                let attached = event.attached_object.as_ref()?;
                let (_, bytes) = attached.serialize();
                crate::utils::base64::encode(&bytes)
            }
            Field::Tags(format) => {
                let tags = event.merged_tags();
                if tags.is_empty() {
                    return None;
                }
                let mut pairs: Vec<_> = tags.into_iter().collect();
                pairs.sort();
                render_structure(*format, &pairs)
            }
            Field::Extra(format) => {
                let extra = event.merged_extra();
                if extra.is_empty() {
                    return None;
                }
                let mut pairs: Vec<_> = extra
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json().to_string()))
                    .collect();
                pairs.sort();
                render_structure(*format, &pairs)
            }
            Field::StackFrame => return None,
            Field::Custom(resolver) => resolver(event)?,
        };
        Some(raw)
    }

    /// Runs one field through the full spec §4.2 step-2 pipeline: privacy
    /// redaction, transforms, truncation, padding, `format_string` wrapping,
    /// then color attributes. Returns `None` only when the field is missing
    /// and `skip_missing_fields` is set.
    fn render_field(&self, spec: &FieldSpec, event: &Event, disable_redaction: bool) -> Option<String> {
        let raw = match self.resolve_field(spec, event) {
            Some(raw) => raw,
            None if self.skip_missing_fields => return None,
            None => String::new(),
        };
        let redacted = redact(&raw, spec.privacy, disable_redaction);
        let transformed = spec
            .transforms
            .iter()
            .fold(redacted, |acc, t| t.apply(&acc));
        let truncated = truncate(&transformed, spec.truncation);
        let padded = pad(&truncated, spec.padding, ' ');
        let wrapped = match &spec.format_string {
            Some(template) => template.replacen("%s", &padded, 1),
            None => padded,
        };
        let colored = if self.supports_color {
            apply_colors(&wrapped, &spec.colors)
        } else {
            wrapped
        };
        Some(colored)
    }
}

impl Formatter for FieldsFormatter {
    fn format(&self, event: &Event) -> Option<Formatted> {
        let disable_redaction = crate::scope::privacy_redaction_disabled();
        let parts: Vec<String> = self
            .fields
            .iter()
            .filter_map(|spec| self.render_field(spec, event, disable_redaction))
            .collect();
        Some(Formatted::Text(parts.join(&self.delimiter)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Message;
    use crate::levels::Severity;
    use crate::scope::Scope;

    #[test]
    fn default_line_matches_teacher_shape() {
        let formatter = FieldsFormatter::default_line();
        let event = Event::new(Severity::Info, Message::from_str("started"), Scope::default());
        let Formatted::Text(line) = formatter.format(&event).unwrap() else {
            panic!("expected text output");
        };
        assert!(line.ends_with("INFO | started"));
    }

    #[test]
    fn absent_optional_field_is_skipped_not_empty_string() {
        let formatter = FieldsFormatter::new(vec![
            FieldSpec::new(Field::Subsystem),
            FieldSpec::new(Field::Message),
        ]);
        let event = Event::new(Severity::Info, Message::from_str("hi"), Scope::default());
        let Formatted::Text(line) = formatter.format(&event).unwrap() else {
            panic!("expected text output");
        };
        assert_eq!(line, "hi");
    }

    #[test]
    fn custom_field_resolves_through_the_supplied_function() {
        let formatter = FieldsFormatter::new(vec![FieldSpec::new(Field::Custom(Arc::new(
            |event: &Event| Some(format!("len={}", event.render_message().len())),
        )))]);
        let event = Event::new(Severity::Info, Message::from_str("hello"), Scope::default());
        let Formatted::Text(line) = formatter.format(&event).unwrap() else {
            panic!("expected text output");
        };
        assert_eq!(line, "len=5");
    }

    #[test]
    fn custom_field_declining_is_skipped_not_empty_string() {
        let formatter = FieldsFormatter::new(vec![
            FieldSpec::new(Field::Custom(Arc::new(|_: &Event| None))),
            FieldSpec::new(Field::Message),
        ]);
        let event = Event::new(Severity::Info, Message::from_str("hi"), Scope::default());
        let Formatted::Text(line) = formatter.format(&event).unwrap() else {
            panic!("expected text output");
        };
        assert_eq!(line, "hi");
    }

    #[test]
    fn truncation_and_padding_apply_per_field() {
        let formatter = FieldsFormatter::new(vec![FieldSpec::new(Field::Message)
            .with_truncation(Truncation::Tail(4))
            .with_padding(Padding::Right(8))]);
        let event = Event::new(Severity::Info, Message::from_str("hello world"), Scope::default());
        let Formatted::Text(line) = formatter.format(&event).unwrap() else {
            panic!("expected text output");
        };
        assert_eq!(line, "hel\u{2026}    ");
    }
}
