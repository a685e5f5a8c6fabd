// src/record.rs

//! Structured event records
//!
//! A record is a small XML document whose root element is `<event>` and
//! whose `uid` attribute names the live object it describes:
//!
//! ```xml
//! <event version="2.0" uid="ANDROID-1234" type="a-f-G" how="h-e">
//!   <point lat="0" lon="0" hae="0" ce="9999999" le="9999999"/>
//!   <detail/>
//! </event>
//! ```
//!
//! Records are packaged as `<uid>/<uid>.cot` entries.

use quick_xml::Reader;
use quick_xml::events::Event;

/// File extension that marks an entry as a record
pub const RECORD_EXTENSION: &str = "cot";

/// Root element every record must carry
pub const RECORD_ROOT: &str = "event";

/// Baseline size estimate for a record, in bytes
pub const RECORD_BASE_ESTIMATE: u64 = 1024;

/// Additional estimate per geometry point carried by a record
pub const RECORD_POINT_ESTIMATE: u64 = 64;

/// Size estimate used for progress and package sizing
pub fn estimated_size(points: usize) -> u64 {
    RECORD_BASE_ESTIMATE + RECORD_POINT_ESTIMATE * points as u64
}

/// Archive key for a record with the given uid
pub fn entry_key(uid: &str) -> String {
    format!("{uid}/{uid}.{RECORD_EXTENSION}")
}

/// Whether an archive path names a record by extension
pub fn has_record_extension(key: &str) -> bool {
    key.rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case(RECORD_EXTENSION))
}

/// Check that `text` is well-formed XML rooted at `<event>`
pub fn is_valid_record(text: &str) -> bool {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut saw_root = false;
    let mut depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if depth == 0 {
                    if saw_root || e.name().as_ref() != RECORD_ROOT.as_bytes() {
                        return false;
                    }
                    saw_root = true;
                }
                depth += 1;
            }
            Ok(Event::Empty(e)) => {
                if depth == 0 {
                    if saw_root || e.name().as_ref() != RECORD_ROOT.as_bytes() {
                        return false;
                    }
                    saw_root = true;
                }
            }
            Ok(Event::End(_)) => depth = depth.saturating_sub(1),
            Ok(Event::Text(_)) if depth == 0 => return false,
            Ok(Event::Eof) => return saw_root && depth == 0,
            Ok(_) => {}
            Err(_) => return false,
        }
    }
}

/// Tolerant attribute scan: returns the first `name='…'` or `name="…"`
/// value in `text`, or an empty string when absent.
///
/// The attribute name must be preceded by whitespace so that `uid` does not
/// match inside `parent_uid`.
pub fn scan_attribute(text: &str, name: &str) -> String {
    let bytes = text.as_bytes();
    let mut from = 0;

    while let Some(offset) = text[from..].find(name) {
        let start = from + offset;
        from = start + name.len();

        let preceded = start > 0 && bytes[start - 1].is_ascii_whitespace();
        if !preceded {
            continue;
        }

        let rest = text[from..].trim_start();
        let Some(rest) = rest.strip_prefix('=') else {
            continue;
        };
        let rest = rest.trim_start();
        let Some(quote) = rest.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            continue;
        };
        let body = &rest[1..];
        if let Some(end) = body.find(quote) {
            return body[..end].to_string();
        }
        return String::new();
    }

    String::new()
}

/// The identifier of a record
pub fn record_uid(text: &str) -> String {
    scan_attribute(text, "uid")
}

/// Whether `uid` can name a single file: non-empty, no separators, not `.` or `..`
pub fn is_file_safe_uid(uid: &str) -> bool {
    !uid.is_empty() && uid != "." && uid != ".." && !uid.contains(['/', '\\', '\0'])
}

/// Number of `<point>` elements, used for size estimation
pub fn point_count(text: &str) -> usize {
    text.matches("<point").count()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<event version="2.0" uid="ANDROID-1" type="a-f-G" how="h-e">
  <point lat="1" lon="2" hae="0" ce="10" le="10"/>
  <detail><link parent_uid="ANDROID-0" relation="p-p"/></detail>
</event>"#;

    #[test]
    fn test_entry_key() {
        assert_eq!(entry_key("abc"), "abc/abc.cot");
        assert!(has_record_extension("abc/abc.cot"));
        assert!(has_record_extension("abc/ABC.COT"));
        assert!(!has_record_extension("abc/abc.kml"));
        assert!(!has_record_extension("cot"));
    }

    #[test]
    fn test_valid_record() {
        assert!(is_valid_record(SAMPLE));
        assert!(is_valid_record("<event uid='x'/>"));
    }

    #[test]
    fn test_invalid_records() {
        assert!(!is_valid_record(""));
        assert!(!is_valid_record("<other uid='x'/>"));
        assert!(!is_valid_record("<event uid='x'><detail></event>"));
        assert!(!is_valid_record("<event/><event/>"));
        assert!(!is_valid_record("not xml at all"));
    }

    #[test]
    fn test_scan_either_quote() {
        assert_eq!(record_uid(SAMPLE), "ANDROID-1");
        assert_eq!(record_uid("<event uid='single' />"), "single");
        assert_eq!(record_uid("<event uid = \"spaced\" />"), "spaced");
    }

    #[test]
    fn test_scan_requires_word_boundary() {
        assert_eq!(scan_attribute("<link parent_uid='p'/>", "uid"), "");
        assert_eq!(scan_attribute("<link parent_uid='p'/>", "parent_uid"), "p");
    }

    #[test]
    fn test_scan_missing_is_empty() {
        assert_eq!(record_uid("<event type='a'/>"), "");
        assert_eq!(record_uid("<event uid='unterminated/>"), "");
    }

    #[test]
    fn test_file_safe_uid() {
        assert!(is_file_safe_uid("ANDROID-1"));
        assert!(is_file_safe_uid("a.b"));
        assert!(!is_file_safe_uid(""));
        assert!(!is_file_safe_uid("."));
        assert!(!is_file_safe_uid(".."));
        assert!(!is_file_safe_uid("../../escaped"));
        assert!(!is_file_safe_uid("dir\\file"));
    }

    #[test]
    fn test_estimate_counts_points() {
        assert_eq!(point_count(SAMPLE), 1);
        assert_eq!(estimated_size(0), RECORD_BASE_ESTIMATE);
        assert_eq!(estimated_size(3), RECORD_BASE_ESTIMATE + 3 * RECORD_POINT_ESTIMATE);
    }
}
