//! Human-readable size string parsing, used for `max_file_size` and similar
//! configuration parameters. Delegates to `byte_unit` rather than hand-rolling
//! a parser (the teacher's original parser is superseded here).

use byte_unit::Byte;

/// Parses strings like `"5KB"`, `"10MB"`, `"1GiB"`, or a bare integer (bytes).
pub fn parse_size(input: &str) -> Option<u64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    Byte::parse_str(trimmed, true)
        .ok()
        .map(|b| b.as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_bytes() {
        assert_eq!(parse_size("1024"), Some(1024));
    }

    #[test]
    fn parses_units() {
        assert_eq!(parse_size("1KB"), Some(1000));
        assert_eq!(parse_size("1KiB"), Some(1024));
        assert_eq!(parse_size("10MB"), Some(10_000_000));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_size(""), None);
        assert_eq!(parse_size("not a size"), None);
    }
}
