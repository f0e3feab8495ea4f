//! `stratum scan` — offline safety check and redaction.

use std::io::Read;
use stratum_config::Thresholds;
use stratum_metacognition::{SafetyScanner, SafetyValidator, Validator, sanitize};

/// Safety verdict plus sanitized text, as printed by the command.
pub async fn render(text: &str) -> String {
    let validator = SafetyValidator::new(SafetyScanner::builtin());
    let threshold = Thresholds::default().safety;

    let assessment = match validator.validate(text, None).await {
        Ok(assessment) => assessment,
        Err(e) => return format!("❌ Safety validator failed: {e}\n"),
    };
    let passed = assessment.score >= threshold;

    let mut out = format!(
        "Safety score: {:.2} (threshold {:.2}) {}\n",
        assessment.score,
        threshold,
        if passed { "✅ passed" } else { "❌ failed" }
    );
    for issue in &assessment.issues {
        out.push_str(&format!(
            "  [{}] {}: {}",
            format!("{:?}", issue.severity).to_lowercase(),
            issue.category,
            issue.description
        ));
        if let Some(evidence) = &issue.evidence {
            out.push_str(&format!(" ({evidence})"));
        }
        out.push('\n');
    }

    let sanitized = sanitize(text, validator.scanner());
    if sanitized.changed() {
        out.push_str(&format!(
            "\nSanitized ({} redactions):\n{}\n",
            sanitized.redactions.len(),
            sanitized.text
        ));
    }
    out
}

pub async fn run(text: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let text = match text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    print!("{}", render(&text).await);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clean_text_passes_without_sanitizing() {
        let out = render("The weather is nice today.").await;
        assert!(out.starts_with("Safety score: 1.00"));
        assert!(out.contains("passed"));
        assert!(!out.contains("Sanitized"));
    }

    #[tokio::test]
    async fn api_key_is_reported_and_redacted() {
        let out = render("Here's my key: sk-ABCDEFG123").await;
        assert!(out.contains("failed"));
        assert!(out.contains("sensitive_data"));
        assert!(out.contains("[REDACTED:SENSITIVE_DATA]"));
        assert!(!out.contains("sk-ABCDEFG123"));
    }
}
