//! Deterministic redaction of safety matches.

use crate::safety::{SafetyCategory, SafetyMatch, SafetyScanner};
use tracing::warn;

/// Rescans after redaction in case a replacement joined two fragments into
/// a new match.
const MAX_PASSES: usize = 3;

const FULL_REDACTION: &str = "[WITHHELD]";

/// A redacted span in the input of the pass that removed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redaction {
    pub category: SafetyCategory,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    pub text: String,
    pub redactions: Vec<Redaction>,
}

impl Sanitized {
    pub fn changed(&self) -> bool {
        !self.redactions.is_empty()
    }
}

/// Replace every safety match with `[REDACTED:CATEGORY]`.
///
/// The returned text never contains a substring the scanner matches.
pub fn sanitize(text: &str, scanner: &SafetyScanner) -> Sanitized {
    let mut current = text.to_string();
    let mut redactions = Vec::new();

    for _ in 0..MAX_PASSES {
        let matches = scanner.scan(&current);
        if matches.is_empty() {
            return Sanitized {
                text: current,
                redactions,
            };
        }
        let merged = merge_spans(&matches);
        current = redact(&current, &merged);
        redactions.extend(merged);
    }

    if scanner.is_clean(&current) {
        return Sanitized {
            text: current,
            redactions,
        };
    }

    warn!("Redaction did not converge, withholding the whole text");
    redactions.push(Redaction {
        category: SafetyCategory::SensitiveData,
        start: 0,
        end: current.len(),
    });
    Sanitized {
        text: FULL_REDACTION.into(),
        redactions,
    }
}

/// Merge overlapping or touching spans. Input must be ordered by start; the
/// merged span keeps the category of its most severe member.
fn merge_spans(matches: &[SafetyMatch]) -> Vec<Redaction> {
    let mut merged: Vec<(Redaction, stratum_core::Severity)> = Vec::new();
    for m in matches {
        match merged.last_mut() {
            Some((last, severity)) if m.start <= last.end => {
                last.end = last.end.max(m.end);
                if m.severity > *severity {
                    *severity = m.severity;
                    last.category = m.category;
                }
            }
            _ => merged.push((
                Redaction {
                    category: m.category,
                    start: m.start,
                    end: m.end,
                },
                m.severity,
            )),
        }
    }
    merged.into_iter().map(|(r, _)| r).collect()
}

fn redact(text: &str, spans: &[Redaction]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        out.push_str(&text[cursor..span.start]);
        out.push_str(&span.category.redaction_tag());
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}
