//! Best-effort recovery of a JSON object from free-form agent output.
//!
//! Order of attempts:
//! 1. Strip a leading code fence (tagged or untagged)
//! 2. Parse the whole trimmed text
//! 3. Scan for the first balanced `{...}` span (string- and escape-aware)

use serde::de::DeserializeOwned;

use super::error::AgentError;

/// Remove a surrounding markdown code fence, if any.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `JSON`, ...) up to the first newline.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Locate the first balanced object span in `text`.
///
/// Braces inside JSON string literals are ignored. Returns `None` when no
/// opening brace is ever closed.
pub fn find_object_span(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(rel) = text[search_from..].find('{') {
        let start = search_from + rel;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (i, &b) in bytes.iter().enumerate().skip(start) {
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
                    depth -= 1;
                    if depth == 0 {
                        return Some(&text[start..=i]);
                    }
                }
                _ => {}
            }
        }

        search_from = start + 1;
    }

    None
}

/// Parse a `T` out of agent output, tolerating fences and surrounding prose.
pub fn parse_agent_json<T: DeserializeOwned>(response: &str) -> Result<T, AgentError> {
    let text = strip_code_fence(response);
    if text.is_empty() {
        return Err(AgentError::MalformedResponse("empty response".to_string()));
    }

    if let Ok(value) = serde_json::from_str::<T>(text) {
        return Ok(value);
    }

    let span = find_object_span(text).ok_or_else(|| {
        AgentError::MalformedResponse("no JSON object found in response".to_string())
    })?;

    serde_json::from_str::<T>(span)
        .map_err(|e| AgentError::MalformedResponse(format!("invalid JSON object: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Probe {
        ok: bool,
        #[serde(default)]
        note: String,
    }

    #[test]
    fn strips_tagged_fence() {
        assert_eq!(strip_code_fence("```json\n{\"ok\": true}\n```"), "{\"ok\": true}");
    }

    #[test]
    fn strips_untagged_fence() {
        assert_eq!(strip_code_fence("```\n{\"ok\": true}\n```"), "{\"ok\": true}");
    }

    #[test]
    fn leaves_plain_text_alone() {
        assert_eq!(strip_code_fence("  {\"ok\": true}  "), "{\"ok\": true}");
    }

    #[test]
    fn parses_strict_json() {
        let p: Probe = parse_agent_json(r#"{"ok": true, "note": "x"}"#).unwrap();
        assert_eq!(p, Probe { ok: true, note: "x".into() });
    }

    #[test]
    fn parses_object_wrapped_in_prose() {
        let p: Probe = parse_agent_json("Here you go: {\"ok\": false} Hope it helps {not json}").unwrap();
        assert!(!p.ok);
    }

    #[test]
    fn braces_inside_strings_do_not_end_span() {
        let text = r#"prefix {"ok": true, "note": "a } inside \" quote {"} suffix }"#;
        let span = find_object_span(text).unwrap();
        assert_eq!(span, r#"{"ok": true, "note": "a } inside \" quote {"}"#);
        let p: Probe = parse_agent_json(text).unwrap();
        assert_eq!(p.note, "a } inside \" quote {");
    }

    #[test]
    fn nested_objects_are_kept_whole() {
        let span = find_object_span(r#"x {"a": {"b": 1}} y"#).unwrap();
        assert_eq!(span, r#"{"a": {"b": 1}}"#);
    }

    #[test]
    fn unbalanced_text_has_no_span() {
        assert_eq!(find_object_span("{ never closed"), None);
        assert_eq!(find_object_span("no braces"), None);
    }

    #[test]
    fn missing_object_is_malformed() {
        let err = parse_agent_json::<Probe>("I could not do it.").unwrap_err();
        assert!(matches!(err, AgentError::MalformedResponse(_)));
    }

    #[test]
    fn empty_response_is_malformed() {
        let err = parse_agent_json::<Probe>("   ").unwrap_err();
        assert!(err.to_string().contains("empty response"));
    }
}
