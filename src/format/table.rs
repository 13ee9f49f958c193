//! ASCII-table "display" formatter (supplemented feature, see
//! SPEC_FULL.md §C): renders an event as a bordered key/value table instead
//! of a single line, intended for interactive/console sinks.

use super::{Formatted, Formatter};
use crate::event::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxStyle {
    Light,
    Heavy,
    Double,
    Ascii,
}

struct Glyphs {
    horizontal: char,
    vertical: char,
    top_left: char,
    top_right: char,
    bottom_left: char,
    bottom_right: char,
    tee_left: char,
    tee_right: char,
}

impl BoxStyle {
    fn glyphs(self) -> Glyphs {
        match self {
            BoxStyle::Light => Glyphs {
                horizontal: '─',
                vertical: '│',
                top_left: '┌',
                top_right: '┐',
                bottom_left: '└',
                bottom_right: '┘',
                tee_left: '├',
                tee_right: '┤',
            },
            BoxStyle::Heavy => Glyphs {
                horizontal: '━',
                vertical: '┃',
                top_left: '┏',
                top_right: '┓',
                bottom_left: '┗',
                bottom_right: '┛',
                tee_left: '┣',
                tee_right: '┫',
            },
            BoxStyle::Double => Glyphs {
                horizontal: '═',
                vertical: '║',
                top_left: '╔',
                top_right: '╗',
                bottom_left: '╚',
                bottom_right: '╝',
                tee_left: '╠',
                tee_right: '╣',
            },
            BoxStyle::Ascii => Glyphs {
                horizontal: '-',
                vertical: '|',
                top_left: '+',
                top_right: '+',
                bottom_left: '+',
                bottom_right: '+',
                tee_left: '+',
                tee_right: '+',
            },
        }
    }
}

/// Renders `pairs` as a bordered key/value block. Shared by [`TableFormatter`]
/// (whole-event display sinks) and the fields formatter's
/// `StructureFormat::Table` option (spec §4.2).
pub fn render_pairs_table(pairs: &[(String, String)], style: BoxStyle) -> String {
    let glyphs = style.glyphs();
    let key_width = pairs.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
    let value_width = pairs.iter().map(|(_, v)| v.chars().count()).max().unwrap_or(0);

    let border = |left: char, right: char| {
        format!(
            "{left}{}{tee}{}{right}",
            glyphs.horizontal.to_string().repeat(key_width + 2),
            glyphs.horizontal.to_string().repeat(value_width + 2),
            left = left,
            right = right,
            tee = glyphs.horizontal,
        )
    };

    let mut out = String::new();
    out.push_str(&border(glyphs.top_left, glyphs.top_right));
    out.push('\n');
    for (key, value) in pairs {
        out.push_str(&format!(
            "{v} {:<kw$} {v} {:<vw$} {v}\n",
            key,
            value,
            kw = key_width,
            vw = value_width,
            v = glyphs.vertical,
        ));
    }
    out.push_str(&border(glyphs.bottom_left, glyphs.bottom_right));
    out
}

pub struct TableFormatter {
    pub style: BoxStyle,
}

impl Default for TableFormatter {
    fn default() -> Self {
        TableFormatter {
            style: BoxStyle::Light,
        }
    }
}

impl TableFormatter {
    pub fn new(style: BoxStyle) -> Self {
        TableFormatter { style }
    }

    fn rows(&self, event: &Event) -> Vec<(String, String)> {
        let mut rows = vec![
            ("timestamp".to_string(), super::TimestampStyle::Rfc3339.format(event.timestamp())),
            ("level".to_string(), event.level().simple().to_string()),
            ("message".to_string(), event.render_message()),
        ];
        if let Some(subsystem) = &event.subsystem {
            rows.push(("subsystem".to_string(), subsystem.clone()));
        }
        if let Some(category) = &event.category {
            rows.push(("category".to_string(), category.clone()));
        }
        let mut tags: Vec<_> = event.merged_tags().into_iter().collect();
        tags.sort();
        for (k, v) in tags {
            rows.push((format!("tag:{k}"), v));
        }
        rows
    }
}

impl Formatter for TableFormatter {
    fn format(&self, event: &Event) -> Option<Formatted> {
        Some(Formatted::Text(render_pairs_table(&self.rows(event), self.style)))
    }
}
