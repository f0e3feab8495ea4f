//! Refinement engine — the single corrective pass over a failed response.
//!
//! Order is fixed by validator priority:
//! 1. safety: deterministic redaction, no model call;
//! 2. alignment then consistency: one generative rewrite carrying every
//!    actionable issue and suggestion from the failed validators;
//! 3. the rewrite is re-sanitized, and on failure or timeout the sanitized
//!    text is kept with a `fallback_reason`.

use crate::safety::SafetyScanner;
use crate::sanitizer::sanitize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stratum_core::{
    AppliedChange, AuditRecord, AuditSink, AuditSource, AuditStatus, CallOptions, CorrelationId,
    IssueRef, Message, ModelCaller, ModelRole, Persona, RefinementResult, ValidationIssue,
    ValidationReport, ValidatorKind, call_with_timeout,
};
use tracing::{debug, info, warn};

/// Category of the issue a failed-closed validator raises; nothing in the
/// response can fix it.
const UNAVAILABLE: &str = "validator_unavailable";

pub struct RefinementEngine {
    caller: Arc<dyn ModelCaller>,
    persona: Persona,
    scanner: SafetyScanner,
    timeout: Duration,
    audit: Arc<dyn AuditSink>,
}

impl RefinementEngine {
    pub fn new(
        caller: Arc<dyn ModelCaller>,
        persona: Persona,
        scanner: SafetyScanner,
        timeout: Duration,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            caller,
            persona,
            scanner,
            timeout,
            audit,
        }
    }

    /// Refine `text` against `report`. Returns `None` when the report passed.
    pub async fn refine(
        &self,
        text: &str,
        report: &ValidationReport,
        correlation_id: &CorrelationId,
    ) -> Option<RefinementResult> {
        if report.overall_passed {
            return None;
        }

        let started = Instant::now();
        let mut applied_changes = Vec::new();
        let mut current = text.to_string();

        if report.failed(ValidatorKind::Safety) {
            let sanitized = sanitize(&current, &self.scanner);
            if sanitized.changed() {
                debug!(redactions = sanitized.redactions.len(), "Safety sanitization applied");
                applied_changes.push(AppliedChange {
                    driver: ValidatorKind::Safety,
                    issue_refs: refs_for(report, ValidatorKind::Safety),
                    before: current.clone(),
                    after: sanitized.text.clone(),
                });
                current = sanitized.text;
            }
        }

        let mut fallback_reason = None;
        let drivers: Vec<ValidatorKind> = [ValidatorKind::Alignment, ValidatorKind::Consistency]
            .into_iter()
            .filter(|kind| report.failed(*kind))
            .collect();
        let mut issue_refs = Vec::new();
        let mut issues = Vec::new();
        for kind in &drivers {
            for (index, issue) in report.issues_for(*kind).iter().enumerate() {
                if issue.category != UNAVAILABLE {
                    issue_refs.push(IssueRef {
                        validator: *kind,
                        index,
                    });
                    issues.push(issue);
                }
            }
        }

        if let Some(driver) = drivers.first().copied().filter(|_| !issues.is_empty()) {
            match self.rewrite(&current, &issues).await {
                Ok(rewritten) => {
                    // A rewrite must not reintroduce anything the scanner flags.
                    let rewritten = sanitize(&rewritten, &self.scanner).text;
                    if rewritten != current {
                        applied_changes.push(AppliedChange {
                            driver,
                            issue_refs,
                            before: current.clone(),
                            after: rewritten.clone(),
                        });
                        current = rewritten;
                    }
                }
                Err(reason) => {
                    warn!(error = %reason, "Generative rewrite failed, keeping sanitized text");
                    fallback_reason = Some(reason);
                }
            }
        }

        let changed = current != text;
        let duration_ms = started.elapsed().as_millis() as u64;
        let status = if fallback_reason.is_some() {
            AuditStatus::Failed
        } else {
            AuditStatus::Succeeded
        };
        self.audit.record(
            &AuditRecord::new(correlation_id, AuditSource::Refinement, "refinement", status, duration_ms)
                .with_details(format!("changed={changed} changes={}", applied_changes.len())),
        );
        info!(changed, changes = applied_changes.len(), duration_ms, "Refinement finished");

        Some(RefinementResult {
            original_text: text.to_string(),
            refined_text: current,
            changed,
            applied_changes,
            fallback_reason,
        })
    }

    async fn rewrite(&self, text: &str, issues: &[&ValidationIssue]) -> Result<String, String> {
        let mut instructions = String::from(
            "Rewrite your previous response so it fixes every issue below, in the order listed. \
Keep everything that is not affected. Do not add new facts. \
Return only the rewritten response.\n\n## Issues\n",
        );
        for (i, issue) in issues.iter().enumerate() {
            instructions.push_str(&format!(
                "{}. [{} / {}] {}",
                i + 1,
                issue.validator,
                issue.category,
                issue.description
            ));
            if let Some(suggestion) = &issue.suggestion {
                instructions.push_str(&format!(" (suggestion: {suggestion})"));
            }
            instructions.push('\n');
        }

        let messages = vec![
            Message::system(self.persona.system_prompt()),
            Message::assistant(text),
            Message::user(instructions),
        ];
        let response = call_with_timeout(
            self.caller.as_ref(),
            &ModelRole::Persona,
            messages,
            &CallOptions::default().with_temperature(0.3),
            self.timeout,
        )
        .await
        .map_err(|e| e.to_string())?;

        let rewritten = response.content.trim();
        if rewritten.is_empty() {
            return Err("rewrite was empty".into());
        }
        Ok(rewritten.to_string())
    }
}

fn refs_for(report: &ValidationReport, kind: ValidatorKind) -> Vec<IssueRef> {
    (0..report.issues_for(kind).len())
        .map(|index| IssueRef {
            validator: kind,
            index,
        })
        .collect()
}
