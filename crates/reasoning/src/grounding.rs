//! Grounding checks — literal citation matching against the evidence corpus.
//!
//! Pulls concrete entities out of model-written text and reports which of
//! them never appeared in the goal or any observation. This is a
//! plausibility check: it flags likely inventions, it cannot prove a text
//! faithful.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// `notes.md`, `src/main.rs`, `example.com`
    FileLike,
    /// Backticked or double-quoted text
    Literal,
    /// Two or more digits
    Number,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundedEntity {
    pub text: String,
    pub kind: EntityKind,
    pub grounded: bool,
}

/// Which entities in a text the corpus backs up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingReport {
    pub entities: Vec<GroundedEntity>,
}

impl GroundingReport {
    pub fn is_grounded(&self) -> bool {
        self.entities.iter().all(|e| e.grounded)
    }

    pub fn ungrounded(&self) -> Vec<&str> {
        self.entities
            .iter()
            .filter(|e| !e.grounded)
            .map(|e| e.text.as_str())
            .collect()
    }
}

const PATTERNS: &[(EntityKind, &str)] = &[
    (EntityKind::Literal, r"`([^`\n]{1,120})`"),
    (EntityKind::Literal, r#""([^"\n]{1,120})""#),
    (
        EntityKind::FileLike,
        r"([A-Za-z0-9_][A-Za-z0-9_/-]*(?:\.[A-Za-z0-9_-]+)*\.[A-Za-z][A-Za-z0-9]{0,7})\b",
    ),
    (EntityKind::Number, r"\b(\d{2,})\b"),
];

/// Abbreviations the file-like pattern would otherwise pick up.
const NOT_FILES: &[&str] = &["e.g", "i.e"];

pub struct GroundingChecker {
    patterns: Vec<(EntityKind, Regex)>,
}

impl GroundingChecker {
    pub fn new() -> Self {
        let patterns = PATTERNS
            .iter()
            .filter_map(|(kind, pattern)| {
                Regex::new(pattern)
                    .inspect_err(|e| warn!(error = %e, "Skipping invalid grounding pattern"))
                    .ok()
                    .map(|re| (*kind, re))
            })
            .collect();
        Self { patterns }
    }

    /// Concrete entities in `text`, first occurrence order, deduplicated.
    pub fn entities(&self, text: &str) -> Vec<(EntityKind, String)> {
        let mut found: Vec<(usize, EntityKind, String)> = Vec::new();
        for (kind, re) in &self.patterns {
            for caps in re.captures_iter(text) {
                let Some(m) = caps.get(1) else { continue };
                let entity = m.as_str().trim();
                if entity.is_empty()
                    || (*kind == EntityKind::FileLike
                        && NOT_FILES.iter().any(|n| entity.eq_ignore_ascii_case(n)))
                {
                    continue;
                }
                if found.iter().any(|(_, _, existing)| existing == entity) {
                    continue;
                }
                found.push((m.start(), *kind, entity.to_string()));
            }
        }
        found.sort_by_key(|(start, _, _)| *start);
        found.into_iter().map(|(_, kind, text)| (kind, text)).collect()
    }

    /// Check every entity in `text` for a literal occurrence in `corpus`.
    pub fn check(&self, text: &str, corpus: &str) -> GroundingReport {
        GroundingReport {
            entities: self
                .entities(text)
                .into_iter()
                .map(|(kind, text)| GroundedEntity {
                    grounded: corpus.contains(&text),
                    text,
                    kind,
                })
                .collect(),
        }
    }

    /// Values in a planner's `actionInput` the corpus does not contain.
    ///
    /// Path-like strings and multi-digit numbers are checked whole; other
    /// strings are checked entity by entity.
    pub fn ungrounded_inputs(&self, input: &Value, corpus: &str) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_ungrounded(input, corpus, &mut out);
        out
    }

    fn collect_ungrounded(&self, value: &Value, corpus: &str, out: &mut Vec<String>) {
        match value {
            Value::String(s) => {
                let s = s.trim();
                let path_like = !s.contains(char::is_whitespace)
                    && s.contains(|c: char| c == '/' || c == '.' || c.is_ascii_digit());
                if path_like {
                    if !corpus.contains(s) && !out.iter().any(|o| o == s) {
                        out.push(s.to_string());
                    }
                } else {
                    for entity in self.check(s, corpus).ungrounded() {
                        if !out.iter().any(|o| o == entity) {
                            out.push(entity.to_string());
                        }
                    }
                }
            }
            Value::Number(n) => {
                let text = n.to_string();
                if text.chars().filter(char::is_ascii_digit).count() >= 2
                    && !corpus.contains(&text)
                    && !out.contains(&text)
                {
                    out.push(text);
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.collect_ungrounded(item, corpus, out);
                }
            }
            Value::Object(map) => {
                for v in map.values() {
                    self.collect_ungrounded(v, corpus, out);
                }
            }
            Value::Null | Value::Bool(_) => {}
        }
    }
}

impl Default for GroundingChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_files_literals_and_numbers() {
        let checker = GroundingChecker::new();
        let entities = checker.entities(r#"Found a.md and src/main.rs, `cargo test` said "ok", 2048 bytes in 3 files."#);
        let texts: Vec<&str> = entities.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(texts, ["a.md", "src/main.rs", "cargo test", "ok", "2048"]);
        assert_eq!(entities[0].0, EntityKind::FileLike);
        assert_eq!(entities[4].0, EntityKind::Number);
    }

    #[test]
    fn sentence_punctuation_is_not_part_of_a_file() {
        let checker = GroundingChecker::new();
        let entities = checker.entities("The folder holds b.md.");
        assert_eq!(entities, vec![(EntityKind::FileLike, "b.md".to_string())]);
    }

    #[test]
    fn abbreviations_are_ignored() {
        assert!(GroundingChecker::new().entities("Use tools, e.g. grep.").iter().all(|(_, t)| t != "e.g"));
    }

    #[test]
    fn cited_entities_are_grounded() {
        let report = GroundingChecker::new().check("The directory holds a.md and b.md.", "2 items: a.md, b.md");
        assert!(report.is_grounded());
        assert_eq!(report.entities.len(), 2);
    }

    #[test]
    fn invented_file_is_flagged() {
        let report = GroundingChecker::new().check("It holds a.md, b.md and c.md.", "2 items: a.md, b.md");
        assert!(!report.is_grounded());
        assert_eq!(report.ungrounded(), ["c.md"]);
    }

    #[test]
    fn plain_prose_has_no_entities() {
        let report = GroundingChecker::new().check("There is nothing to report.", "");
        assert!(report.entities.is_empty());
        assert!(report.is_grounded());
    }

    #[test]
    fn action_input_values_are_checked() {
        let checker = GroundingChecker::new();
        let corpus = "list files in docs\n2 items: a.md, b.md";
        let input = json!({"path": "a.md", "other": "docs/zzz.md", "limit": 25, "recursive": true});
        assert_eq!(checker.ungrounded_inputs(&input, corpus), ["25", "docs/zzz.md"]);
    }

    #[test]
    fn grounded_inputs_are_clean() {
        let checker = GroundingChecker::new();
        let input = json!({"dir": "docs", "file": "b.md"});
        assert!(checker.ungrounded_inputs(&input, "list files in docs; 2 items: a.md, b.md").is_empty());
    }
}
