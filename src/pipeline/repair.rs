//! Response Repair: recover the JSON object embedded in a model response.
//!
//! Chat models wrap the record in prose, code fences or a second fragment,
//! and occasionally truncate it. Three tiers, cheapest first:
//!
//! 1. **Fast path**: the trimmed response already starts with `{` and ends
//!    with `}`; it is returned as is.
//! 2. **Balanced scan**: from each `{` in turn, walk forward counting brace
//!    depth until it returns to zero, then try to parse that span. The first
//!    span that parses wins; a failed span moves the scan to the next `{`
//!    after its start. Braces inside JSON string literals do not count.
//! 3. **Greedy fallback**: first `{` to last `}`. May not parse; the caller
//!    treats that as a malformed response.

use crate::error::RepairError;
use tracing::debug;

/// Locate the JSON object in `raw`. Only a response with no `{…}` pair at
/// all is an error here.
pub fn repair_json(raw: &str) -> Result<&str, RepairError> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Ok(trimmed);
    }

    if let Some(span) = balanced_scan(raw) {
        debug!(
            start = span.0,
            len = span.1 - span.0,
            "Recovered JSON object by balanced scan"
        );
        return Ok(&raw[span.0..span.1]);
    }

    match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if start < end => {
            debug!("Falling back to greedy JSON span");
            Ok(&raw[start..=end])
        }
        _ => Err(RepairError::NoJsonObject),
    }
}

/// Byte span `[start, end)` of the first balanced `{…}` that parses.
fn balanced_scan(raw: &str) -> Option<(usize, usize)> {
    let bytes = raw.as_bytes();
    let mut from = 0;
    while let Some(offset) = raw[from..].find('{') {
        let start = from + offset;
        if let Some(end) = balanced_end(&bytes[start..]).map(|len| start + len) {
            if serde_json::from_str::<serde_json::Value>(&raw[start..end]).is_ok() {
                return Some((start, end));
            }
        }
        from = start + 1;
    }
    None
}

/// Length of the balanced object starting at `bytes[0] == b'{'`, or `None`
/// when the depth never returns to zero.
fn balanced_end(bytes: &[u8]) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn parsed(s: &str) -> Value {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn fast_path_returns_trimmed_text() {
        assert_eq!(repair_json("  {\"a\": 1}\n").unwrap(), "{\"a\": 1}");
        // Not validated on the fast path.
        assert_eq!(repair_json("{ nope }").unwrap(), "{ nope }");
    }

    #[test]
    fn prose_and_fences_are_stripped() {
        let record = r#"{"Name": "Jane", "Industries": {"Banking": ["NAB"]}, "Summary": "Uses {braces} in text"}"#;
        let wrappers = [
            ("Here is the profile:\n", "\nLet me know if you need changes."),
            ("```json\n", "\n```"),
            ("Sure! ", ""),
            ("", " -- end"),
        ];
        for (prefix, suffix) in wrappers {
            let raw = format!("{prefix}{record}{suffix}");
            let got = repair_json(&raw).unwrap();
            assert_eq!(parsed(got), parsed(record), "wrapper {prefix:?}/{suffix:?}");
        }
    }

    #[test]
    fn no_braces_is_an_error() {
        assert_eq!(repair_json(""), Err(RepairError::NoJsonObject));
        assert_eq!(
            repair_json("I could not read that resume."),
            Err(RepairError::NoJsonObject)
        );
        assert_eq!(repair_json("} backwards {"), Err(RepairError::NoJsonObject));
    }

    #[test]
    fn skips_unparseable_fragment_before_record() {
        let raw = r#"Template: {Name} then {"Name": "Jane"} done"#;
        assert_eq!(parsed(repair_json(raw).unwrap()), json!({"Name": "Jane"}));
    }

    #[test]
    fn first_parseable_fragment_wins() {
        let raw = r#"a {"x": 1} b {"y": 2} c"#;
        assert_eq!(repair_json(raw).unwrap(), r#"{"x": 1}"#);
    }

    #[test]
    fn truncated_record_falls_back_to_greedy_span() {
        let raw = r#"Result: {"Name": "Jane", "Experience": [{"Role": "Lead"}"#;
        // Only the inner object balances and parses.
        assert_eq!(repair_json(raw).unwrap(), r#"{"Role": "Lead"}"#);

        let raw = r#"Result: {"Name": "Jane", "x": } trailing"#;
        let got = repair_json(raw).unwrap();
        assert_eq!(got, r#"{"Name": "Jane", "x": }"#);
        assert!(serde_json::from_str::<Value>(got).is_err());
    }

    #[test]
    fn escaped_quotes_inside_strings() {
        let record = r#"{"Summary": "She said \"hi {\" and left"}"#;
        let raw = format!("note: {record} ok");
        assert_eq!(repair_json(&raw).unwrap(), record);
    }

    #[test]
    fn many_stray_braces_terminate() {
        let raw = format!("x{}", "{".repeat(2_000));
        assert_eq!(repair_json(&raw), Err(RepairError::NoJsonObject));
        let raw = format!("x{}}}", "{ ".repeat(2_000));
        assert!(repair_json(&raw).is_ok());
    }
}
