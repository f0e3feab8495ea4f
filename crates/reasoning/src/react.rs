//! ReAct loop — Plan → Act → Observe → Reflect, then one synthesis pass.
//!
//! One step is planned at a time from the goal and the full trace. Skill
//! failures become failure observations so the next planning call can
//! change strategy; only planning parse exhaustion, the iteration limit,
//! an iteration timeout, or a failed model call end the loop early.
//!
//! # Trace Format
//!
//! Each iteration records:
//! - **Thought**: the planner's reasoning
//! - **Action**: which skill was called with what input (or `finish`)
//! - **Observation**: a bounded summary of the skill result
//!
//! A failed loop still returns its partial trace and a human-readable
//! reason.

use crate::grounding::{GroundingChecker, GroundingReport};
use crate::observation::ObservationSummarizer;
use crate::planner::{PlannedStep, Planner};
use crate::reflector::Reflector;
use crate::state::LoopState;
use crate::synthesis::Synthesizer;
use crate::trace::{ReasoningStep, ReasoningTrace};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stratum_config::{ConfigError, ReasoningSettings, ResolvedConfig};
use stratum_core::{
    AuditRecord, AuditSink, AuditSource, AuditStatus, CorrelationId, ModelCaller,
    ReasoningError, SkillDescriptor, SkillError, SkillOutcome, SkillRegistry,
};
use tracing::{debug, info, warn};

const LOOP_SUBJECT: &str = "react_loop";

/// The result of one loop invocation.
///
/// Use [`ReactOutcome::succeeded`] to test for success. `trace.completed`
/// only records that reflection judged the goal satisfied; a synthesis
/// failure after that leaves it `true` with `state == Failed`.
#[derive(Debug, Clone)]
pub struct ReactOutcome {
    /// The synthesized answer; `None` when the loop failed.
    pub answer: Option<String>,
    /// Every step taken, including on failure.
    pub trace: ReasoningTrace,
    /// `Done` or `Failed`.
    pub state: LoopState,
    pub error: Option<ReasoningError>,
    /// Why the loop ended, in plain words.
    pub reason: String,
    /// Literal citation check of the answer against the trace.
    pub grounding: Option<GroundingReport>,
    pub duration_ms: u64,
}

impl ReactOutcome {
    pub fn succeeded(&self) -> bool {
        self.state == LoopState::Done && self.answer.is_some()
    }
}

/// What ACTING produced.
enum Acted {
    Finish,
    Outcome(SkillOutcome),
    Error(String),
}

/// Mutable state of one run. Never shared across invocations.
struct Run {
    state: LoopState,
    trace: ReasoningTrace,
    last_reason: String,
}

impl Run {
    fn advance(&mut self, next: LoopState) {
        if self.state.can_transition_to(next) {
            debug!(from = %self.state, to = %next, "Loop transition");
            self.state = next;
        } else {
            warn!(from = %self.state, to = %next, "Rejected loop transition");
        }
    }
}

pub struct ReactLoop {
    planner: Planner,
    reflector: Reflector,
    synthesizer: Synthesizer,
    skills: Arc<dyn SkillRegistry>,
    summarizer: ObservationSummarizer,
    grounding: GroundingChecker,
    settings: ReasoningSettings,
    audit: Arc<dyn AuditSink>,
}

impl ReactLoop {
    pub fn new(
        caller: Arc<dyn ModelCaller>,
        skills: Arc<dyn SkillRegistry>,
        settings: ReasoningSettings,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, ConfigError> {
        if !(1..=100).contains(&settings.max_iterations) {
            return Err(ConfigError::ValidationError(format!(
                "max_iterations must be in 1..=100, got {}",
                settings.max_iterations
            )));
        }
        if settings.iteration_timeout.is_zero()
            || settings.model_timeout.is_zero()
            || settings.skill_timeout.is_zero()
        {
            return Err(ConfigError::ValidationError(
                "reasoning timeouts must be greater than zero".into(),
            ));
        }

        Ok(Self {
            planner: Planner::new(caller.clone(), settings.model_timeout, settings.planning_retries),
            reflector: Reflector::new(caller.clone(), settings.model_timeout),
            synthesizer: Synthesizer::new(caller, settings.model_timeout),
            skills,
            summarizer: ObservationSummarizer::new(
                settings.observation_max_chars,
                settings.observation_list_preview,
            ),
            grounding: GroundingChecker::new(),
            settings,
            audit,
        })
    }

    pub fn from_config(
        config: &ResolvedConfig,
        caller: Arc<dyn ModelCaller>,
        skills: Arc<dyn SkillRegistry>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, ConfigError> {
        Self::new(caller, skills, config.reasoning.clone(), audit)
    }

    pub fn settings(&self) -> &ReasoningSettings {
        &self.settings
    }

    /// Run the loop for `goal` until it is done, fails, or hits the
    /// iteration limit.
    pub async fn run(&self, goal: &str, correlation_id: &CorrelationId) -> ReactOutcome {
        let started = Instant::now();
        let max = self.settings.max_iterations;
        let menu = self.skills.describe(self.settings.skill_domain.as_deref());
        let mut run = Run {
            state: LoopState::Planning,
            trace: ReasoningTrace::new(goal, max),
            last_reason: String::new(),
        };

        info!(
            correlation_id = %correlation_id,
            max_iterations = max,
            skills = menu.len(),
            "ReAct loop started"
        );
        self.audit.record(&AuditRecord::new(
            correlation_id,
            AuditSource::Reasoning,
            LOOP_SUBJECT,
            AuditStatus::Started,
            0,
        ));

        let mut iteration = 0u32;
        let failure = loop {
            iteration += 1;
            match self.iterate(&mut run, iteration, &menu, correlation_id).await {
                Ok(true) => break None,
                Ok(false) if iteration >= max => {
                    break Some(ReasoningError::IterationLimit { max });
                }
                Ok(false) => run.advance(LoopState::Planning),
                Err(e) => break Some(e),
            }
        };

        let (answer, grounding, failure) = match failure {
            Some(e) => (None, None, Some(e)),
            None => {
                run.trace.completed = true;
                run.advance(LoopState::Done);
                match self.synthesizer.synthesize(&run.trace).await {
                    Ok(answer) => {
                        let report = self.grounding.check(&answer, &run.trace.evidence_corpus());
                        if !report.is_grounded() {
                            warn!(
                                correlation_id = %correlation_id,
                                ungrounded = ?report.ungrounded(),
                                "Answer cites entities no observation contains"
                            );
                        }
                        (Some(answer), Some(report), None)
                    }
                    Err(e) => (None, None, Some(e)),
                }
            }
        };

        let reason = match &failure {
            Some(e) => {
                // Done → Failed is not a transition; a failed synthesis
                // overrides the terminal state directly.
                run.state = LoopState::Failed;
                e.to_string()
            }
            None => run.last_reason.clone(),
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let status = if failure.is_none() {
            AuditStatus::Succeeded
        } else {
            AuditStatus::Failed
        };
        self.audit.record(
            &AuditRecord::new(correlation_id, AuditSource::Reasoning, LOOP_SUBJECT, status, duration_ms)
                .with_details(format!("{}; {}", run.trace.summarize(), reason)),
        );
        match &failure {
            Some(e) => warn!(
                correlation_id = %correlation_id,
                iterations = run.trace.iterations_used,
                error = %e,
                "ReAct loop failed"
            ),
            None => info!(
                correlation_id = %correlation_id,
                iterations = run.trace.iterations_used,
                duration_ms,
                "ReAct loop done"
            ),
        }

        ReactOutcome {
            answer,
            trace: run.trace,
            state: run.state,
            error: failure,
            reason,
            grounding,
            duration_ms,
        }
    }

    /// One full iteration under the iteration deadline. Returns whether the
    /// reflector judged the goal complete.
    async fn iterate(
        &self,
        run: &mut Run,
        iteration: u32,
        menu: &[SkillDescriptor],
        correlation_id: &CorrelationId,
    ) -> Result<bool, ReasoningError> {
        let started = Instant::now();
        let deadline = started + self.settings.iteration_timeout;

        let result = self.step(run, iteration, menu, deadline).await;

        if let Err(e) = &result {
            run.advance(LoopState::Failed);
            self.audit.record(
                &AuditRecord::new(
                    correlation_id,
                    AuditSource::Reasoning,
                    format!("iteration {iteration}"),
                    AuditStatus::Failed,
                    started.elapsed().as_millis() as u64,
                )
                .with_details(e.to_string()),
            );
        } else if let Some(step) = run.trace.last().filter(|s| s.iteration == iteration) {
            let status = if step.success {
                AuditStatus::Succeeded
            } else {
                AuditStatus::Failed
            };
            self.audit.record(
                &AuditRecord::new(
                    correlation_id,
                    AuditSource::Reasoning,
                    format!("iteration {iteration}"),
                    status,
                    started.elapsed().as_millis() as u64,
                )
                .with_details(format!("action={} {}", step.action, run.last_reason)),
            );
        }
        result
    }

    async fn step(
        &self,
        run: &mut Run,
        iteration: u32,
        menu: &[SkillDescriptor],
        deadline: Instant,
    ) -> Result<bool, ReasoningError> {
        // ── Planning ──
        let plan = self
            .within(deadline, iteration, "planning", self.planner.plan(&run.trace, menu))
            .await?;
        debug!(iteration, action = %plan.action, thought = %plan.thought, "Planned");

        // ── Acting ──
        run.advance(LoopState::Acting);
        let ungrounded_inputs = if plan.is_finish() {
            vec![]
        } else {
            self.grounding
                .ungrounded_inputs(&plan.action_input, &run.trace.evidence_corpus())
        };
        if !ungrounded_inputs.is_empty() {
            warn!(iteration, values = ?ungrounded_inputs, "Action input cites values no observation contains");
        }
        let acted = self.act(&plan, iteration, deadline).await?;

        // ── Observing ──
        run.advance(LoopState::Observing);
        let (observation, raw_tool_result, success) = match acted {
            Acted::Finish => (
                "No action taken: the planner judged the goal satisfied by earlier observations."
                    .to_string(),
                None,
                true,
            ),
            Acted::Outcome(outcome) => (
                self.summarizer.summarize_outcome(&outcome),
                outcome.data,
                outcome.success,
            ),
            Acted::Error(reason) => (self.summarizer.failure(&reason), None, false),
        };
        run.trace
            .push(ReasoningStep {
                iteration,
                thought: plan.thought,
                action: plan.action,
                action_input: plan.action_input,
                observation,
                raw_tool_result,
                success,
                ungrounded_inputs,
                timestamp: Utc::now(),
            })
            .map_err(|full| ReasoningError::IterationLimit {
                max: full.max_iterations,
            })?;

        // ── Reflecting ──
        run.advance(LoopState::Reflecting);
        let reflection = self
            .within(deadline, iteration, "reflection", self.reflector.reflect(&run.trace))
            .await?;
        debug!(iteration, complete = reflection.complete, reason = %reflection.reason, "Reflected");
        run.last_reason = reflection.reason;
        Ok(reflection.complete)
    }

    /// Invoke the planned skill. Skill errors and skill timeouts become
    /// failure observations; running past the iteration deadline does not.
    async fn act(
        &self,
        plan: &PlannedStep,
        iteration: u32,
        deadline: Instant,
    ) -> Result<Acted, ReasoningError> {
        if plan.is_finish() {
            return Ok(Acted::Finish);
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(self.iteration_timeout(iteration, "acting"));
        }
        let iteration_bound = remaining < self.settings.skill_timeout;
        let budget = self.settings.skill_timeout.min(remaining);

        let invocation = self.skills.invoke(&plan.action, plan.action_input.clone());
        match tokio::time::timeout(budget, invocation).await {
            Ok(Ok(outcome)) => Ok(Acted::Outcome(outcome)),
            Ok(Err(e)) => {
                debug!(iteration, skill = %plan.action, error = %e, "Skill failed");
                Ok(Acted::Error(e.to_string()))
            }
            Err(_) if iteration_bound => Err(self.iteration_timeout(iteration, "acting")),
            Err(_) => {
                let err = SkillError::Timeout {
                    skill: plan.action.clone(),
                    timeout_ms: budget.as_millis() as u64,
                };
                warn!(iteration, error = %err, "Skill timed out");
                Ok(Acted::Error(err.to_string()))
            }
        }
    }

    /// Run `fut` with whatever is left of the iteration deadline.
    async fn within<T, F>(
        &self,
        deadline: Instant,
        iteration: u32,
        phase: &str,
        fut: F,
    ) -> Result<T, ReasoningError>
    where
        F: Future<Output = Result<T, ReasoningError>>,
    {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(self.iteration_timeout(iteration, phase));
        }
        match tokio::time::timeout(remaining, fut).await {
            Ok(result) => result,
            Err(_) => Err(self.iteration_timeout(iteration, phase)),
        }
    }

    fn iteration_timeout(&self, iteration: u32, phase: &str) -> ReasoningError {
        ReasoningError::Timeout {
            phase: format!("iteration {iteration} ({phase})"),
            timeout_ms: duration_ms(self.settings.iteration_timeout),
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    d.as_millis() as u64
}
