//! Observation summaries — raw skill results turned into bounded text.
//!
//! The summary keeps enough structure (counts, the first N names, key/value
//! pairs) for the next planning call to cite concrete facts.

use serde_json::Value;
use stratum_core::SkillOutcome;

/// Object fields tried, in order, when naming a list entry.
const NAME_FIELDS: &[&str] = &["name", "path", "title", "id"];

#[derive(Debug, Clone, Copy)]
pub struct ObservationSummarizer {
    max_chars: usize,
    list_preview: usize,
}

impl ObservationSummarizer {
    pub fn new(max_chars: usize, list_preview: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
            list_preview: list_preview.max(1),
        }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn summarize_outcome(&self, outcome: &SkillOutcome) -> String {
        if !outcome.success {
            let reason = outcome.error.as_deref().unwrap_or("skill reported failure");
            return self.failure(reason);
        }
        match &outcome.data {
            None | Some(Value::Null) => "Succeeded with no data".into(),
            Some(data) => self.summarize_value(data),
        }
    }

    pub fn failure(&self, reason: &str) -> String {
        truncate(&format!("FAILED: {reason}"), self.max_chars)
    }

    pub fn summarize_value(&self, value: &Value) -> String {
        let text = match value {
            Value::Object(map) if map.is_empty() => "empty object".to_string(),
            Value::Object(map) => map
                .iter()
                .map(|(key, v)| format!("{key}: {}", self.inline(v)))
                .collect::<Vec<_>>()
                .join("; "),
            other => self.inline(other),
        };
        truncate(&text, self.max_chars)
    }

    fn inline(&self, value: &Value) -> String {
        match value {
            Value::Null => "null".into(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            Value::Array(items) => self.list(items),
            Value::Object(map) => format!("object with {} keys", map.len()),
        }
    }

    fn list(&self, items: &[Value]) -> String {
        let noun = if items.len() == 1 { "item" } else { "items" };
        if items.is_empty() {
            return "0 items".into();
        }
        let names: Vec<String> = items.iter().take(self.list_preview).map(entry_name).collect();
        let mut out = format!("{} {}: {}", items.len(), noun, names.join(", "));
        if items.len() > self.list_preview {
            out.push_str(&format!(", and {} more", items.len() - self.list_preview));
        }
        out
    }
}

fn entry_name(item: &Value) -> String {
    match item {
        Value::String(s) => s.clone(),
        Value::Object(map) => NAME_FIELDS
            .iter()
            .find_map(|field| match map.get(*field) {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_else(|| item.to_string()),
        other => other.to_string(),
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut with `…`.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(1);
    let mut out: String = text.chars().take(keep).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn summarizer() -> ObservationSummarizer {
        ObservationSummarizer::new(500, 10)
    }

    #[test]
    fn list_keeps_count_and_names() {
        let s = summarizer().summarize_outcome(&SkillOutcome::ok(json!(["a.md", "b.md"])));
        assert_eq!(s, "2 items: a.md, b.md");
    }

    #[test]
    fn long_list_is_previewed() {
        let files: Vec<String> = (0..15).map(|i| format!("f{i}.txt")).collect();
        let s = ObservationSummarizer::new(500, 3).summarize_value(&json!(files));
        assert_eq!(s, "15 items: f0.txt, f1.txt, f2.txt, and 12 more");
    }

    #[test]
    fn objects_in_lists_are_named() {
        let s = summarizer().summarize_value(&json!([
            {"name": "alpha", "size": 10},
            {"id": 42},
            {"other": true}
        ]));
        assert_eq!(s, r#"3 items: alpha, 42, {"other":true}"#);
    }

    #[test]
    fn object_fields_are_listed() {
        let s = summarizer().summarize_value(&json!({"count": 2, "files": ["x.rs", "y.rs"]}));
        assert_eq!(s, "count: 2; files: 2 items: x.rs, y.rs");
    }

    #[test]
    fn failure_is_marked() {
        let s = summarizer().summarize_outcome(&SkillOutcome::failed("permission denied"));
        assert_eq!(s, "FAILED: permission denied");
    }

    #[test]
    fn summaries_are_bounded() {
        let long = "x".repeat(2_000);
        let s = ObservationSummarizer::new(100, 10).summarize_value(&json!(long));
        assert_eq!(s.chars().count(), 100);
        assert!(s.ends_with('…'));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = truncate("ééééé", 3);
        assert_eq!(s, "éé…");
    }

    #[test]
    fn empty_and_null_results() {
        let s = summarizer();
        assert_eq!(s.summarize_value(&json!([])), "0 items");
        assert_eq!(
            s.summarize_outcome(&SkillOutcome {
                success: true,
                data: None,
                error: None
            }),
            "Succeeded with no data"
        );
    }
}
