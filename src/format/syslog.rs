//! RFC-5424 SysLog line formatter (spec §4.2/§6 "syslog output"):
//! `<PRI>VERSION ISOTIMESTAMP HOSTNAME APP-NAME PROCID MSGID [SD] MSG`.

use super::{Formatted, Formatter};
use crate::event::Event;

const NILVALUE: &str = "-";
const VERSION: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Facility(pub u8);

impl Facility {
    pub const USER: Facility = Facility(1);
    pub const LOCAL0: Facility = Facility(16);
}

pub struct SyslogFormatter {
    pub facility: Facility,
    pub app_name: String,
    pub hostname: String,
}

impl SyslogFormatter {
    pub fn new(app_name: impl Into<String>) -> Self {
        SyslogFormatter {
            facility: Facility::USER,
            app_name: app_name.into(),
            hostname: NILVALUE.to_string(),
        }
    }

    fn priority(&self, event: &Event) -> u16 {
        self.facility.0 as u16 * 8 + event.level().rfc5424_numeric() as u16
    }

    fn structured_data(&self, event: &Event) -> String {
        let tags = event.merged_tags();
        if tags.is_empty() {
            return NILVALUE.to_string();
        }
        let mut pairs: Vec<String> = tags
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", sanitize_sd_name(k), escape_sd_value(v)))
            .collect();
        pairs.sort();
        format!("[logcore@32473 {}]", pairs.join(" "))
    }
}

fn sanitize_sd_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_graphic() && !matches!(c, '=' | ' ' | ']' | '"'))
        .collect()
}

fn escape_sd_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace(']', "\\]")
}

impl Formatter for SyslogFormatter {
    fn format(&self, event: &Event) -> Option<Formatted> {
        let pri = self.priority(event);
        let timestamp = super::TimestampStyle::Rfc3339.format(event.timestamp());
        let procid = event
            .scope()
            .process_id
            .map(|p| p.to_string())
            .unwrap_or_else(|| NILVALUE.to_string());
        let msgid = event
            .category
            .clone()
            .unwrap_or_else(|| NILVALUE.to_string());
        let line = format!(
            "<{pri}>{VERSION} {timestamp} {host} {app} {procid} {msgid} {sd} {msg}",
            host = self.hostname,
            app = self.app_name,
            sd = self.structured_data(event),
            msg = event.render_message(),
        );
        Some(Formatted::Text(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Message;
    use crate::levels::Severity;
    use crate::scope::Scope;

    #[test]
    fn priority_matches_rfc5424_formula() {
        let formatter = SyslogFormatter::new("logcore-test");
        let event = Event::new(Severity::Error, Message::from_str("boom"), Scope::default());
        let Formatted::Text(line) = formatter.format(&event).unwrap() else {
            panic!("expected text output");
        };
        assert!(line.starts_with("<11>1 "));
    }

    #[test]
    fn absent_tags_yield_nil_structured_data() {
        let formatter = SyslogFormatter::new("logcore-test");
        let event = Event::new(Severity::Info, Message::from_str("hi"), Scope::default());
        let Formatted::Text(line) = formatter.format(&event).unwrap() else {
            panic!("expected text output");
        };
        assert!(line.contains(" - hi"));
    }
}
