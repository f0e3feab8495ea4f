//! Lenient extraction of JSON objects from model output.
//!
//! Models asked for "JSON only" still wrap answers in code fences or add a
//! sentence before the object. Callers parse whatever object is embedded.

use serde::de::DeserializeOwned;

/// Find the first balanced `{...}` object in `text` and parse it.
pub fn extract_json_object(text: &str) -> Option<serde_json::Value> {
    let bytes = text.as_bytes();
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = balanced_end(bytes, start) {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text[start..=end]) {
                if value.is_object() {
                    return Some(value);
                }
            }
        }
        search_from = start + 1;
    }
    None
}

/// Extract and deserialize an embedded object.
pub fn parse_embedded<T: DeserializeOwned>(text: &str) -> Result<T, String> {
    let value = extract_json_object(text).ok_or_else(|| "no JSON object found".to_string())?;
    serde_json::from_value(value).map_err(|e| e.to_string())
}

/// Index of the `}` closing the object opened at `start`, skipping braces
/// inside string literals.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
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
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
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

    #[test]
    fn bare_object() {
        let v = extract_json_object(r#"{"complete": true}"#).unwrap();
        assert_eq!(v["complete"], true);
    }

    #[test]
    fn fenced_object_with_prose() {
        let text = "Sure, here you go:\n```json\n{\"thought\": \"use {braces}\", \"action\": \"list\"}\n```";
        let v = extract_json_object(text).unwrap();
        assert_eq!(v["action"], "list");
        assert_eq!(v["thought"], "use {braces}");
    }

    #[test]
    fn skips_invalid_leading_braces() {
        let v = extract_json_object("{not json} then {\"ok\": 1}").unwrap();
        assert_eq!(v["ok"], 1);
    }

    #[test]
    fn nothing_to_extract() {
        assert!(extract_json_object("plain text").is_none());
        assert!(extract_json_object("{\"unterminated\": ").is_none());
    }

    #[test]
    fn parse_into_struct() {
        #[derive(serde::Deserialize)]
        struct Verdict {
            complete: bool,
        }
        let v: Verdict = parse_embedded("answer: {\"complete\": false}").unwrap();
        assert!(!v.complete);
        assert!(parse_embedded::<Verdict>("{\"other\": 1}").is_err());
    }
}
