//! The orchestrator: drives one case through the triage pipeline.
//!
//! STAGE ORDER (fixed, strictly sequential, never backtracks):
//!   1. Parsing       reference text → CaseReference
//!   2. Aggregating   CaseReference → CaseContext   (partial failures warn)
//!   3. Synthesizing  CaseContext → raw model text  (transient errors retried in place)
//!   4. Validating    raw text → CaseReport
//!   5. Done
//!
//! RULES:
//!   - Any fatal error moves the run to Failed, recording the stage it
//!     happened in and why. A failed run produces no report.
//!   - Warnings accumulate across stages and travel with the outcome.
//!   - Runs share nothing; each builds its own context and report.

use crate::{
    aggregator::{aggregate, Aggregation, CaseContext},
    case_ref::parse_case_reference,
    config::TriageConfig,
    error::{TriageError, TriageResult},
    reasoning::ReasoningClient,
    records::RecordSources,
    report::CaseReport,
    sink::{Delivery, ReportSink},
    synthesizer::{RetryPolicy, Synthesizer},
    types::{CaseId, RunId},
    validator::validate_response,
    warning::Warning,
};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Parsing,
    Aggregating,
    Synthesizing,
    Validating,
    Done,
    Failed,
}

impl Stage {
    fn next(self) -> Option<Stage> {
        match self {
            Stage::Parsing => Some(Stage::Aggregating),
            Stage::Aggregating => Some(Stage::Synthesizing),
            Stage::Synthesizing => Some(Stage::Validating),
            Stage::Validating => Some(Stage::Done),
            Stage::Done | Stage::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Parsing => "Parsing",
            Stage::Aggregating => "Aggregating",
            Stage::Synthesizing => "Synthesizing",
            Stage::Validating => "Validating",
            Stage::Done => "Done",
            Stage::Failed => "Failed",
        })
    }
}

#[derive(Debug, Clone)]
pub struct CompletedCase {
    pub run_id:   RunId,
    pub case_id:  CaseId,
    pub report:   CaseReport,
    pub context:  CaseContext,
    pub warnings: Vec<Warning>,
    pub trail:    Vec<Stage>,
    /// Reasoning calls made, retries included.
    pub attempts: u32,
}

impl CompletedCase {
    pub fn delivery(&self) -> Delivery<'_> {
        Delivery {
            run_id: &self.run_id,
            case_id: &self.case_id,
            report: &self.report,
            warnings: &self.warnings,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FailedCase {
    pub run_id:   RunId,
    /// None when the reference could not be parsed.
    pub case_id:  Option<CaseId>,
    /// The stage the run was in when it failed.
    pub stage:    Stage,
    pub reason:   String,
    pub warnings: Vec<Warning>,
    pub trail:    Vec<Stage>,
}

impl FailedCase {
    pub fn summary(&self) -> String {
        format!("{} failed: {}", self.stage, self.reason)
    }
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(CompletedCase),
    Failed(FailedCase),
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }

    pub fn run_id(&self) -> &str {
        match self {
            RunOutcome::Completed(c) => &c.run_id,
            RunOutcome::Failed(f) => &f.run_id,
        }
    }

    pub fn warnings(&self) -> &[Warning] {
        match self {
            RunOutcome::Completed(c) => &c.warnings,
            RunOutcome::Failed(f) => &f.warnings,
        }
    }

    pub fn trail(&self) -> &[Stage] {
        match self {
            RunOutcome::Completed(c) => &c.trail,
            RunOutcome::Failed(f) => &f.trail,
        }
    }

    pub fn report(&self) -> Option<&CaseReport> {
        match self {
            RunOutcome::Completed(c) => Some(&c.report),
            RunOutcome::Failed(_) => None,
        }
    }
}

/// Stage bookkeeping for one run.
struct CaseRun {
    run_id:   RunId,
    case_id:  Option<CaseId>,
    stage:    Stage,
    trail:    Vec<Stage>,
    warnings: Vec<Warning>,
}

impl CaseRun {
    fn start() -> Self {
        let run_id = uuid::Uuid::new_v4().to_string();
        log::info!("run {run_id}: {}", Stage::Parsing);
        Self {
            run_id,
            case_id: None,
            stage: Stage::Parsing,
            trail: vec![Stage::Parsing],
            warnings: Vec::new(),
        }
    }

    fn advance(&mut self) {
        let Some(next) = self.stage.next() else {
            return;
        };
        log::info!(
            "run {} case {}: {} -> {next}",
            self.run_id,
            self.case_id.as_deref().unwrap_or("-"),
            self.stage
        );
        self.stage = next;
        self.trail.push(next);
    }

    fn fail(mut self, error: TriageError) -> RunOutcome {
        let reason = error.to_string();
        log::error!(
            "run {} case {}: {} failed: {reason}",
            self.run_id,
            self.case_id.as_deref().unwrap_or("-"),
            self.stage
        );
        self.trail.push(Stage::Failed);
        RunOutcome::Failed(FailedCase {
            run_id: self.run_id,
            case_id: self.case_id,
            stage: self.stage,
            reason,
            warnings: self.warnings,
            trail: self.trail,
        })
    }
}

pub struct Orchestrator {
    sources: RecordSources,
    client:  Box<dyn ReasoningClient>,
    config:  TriageConfig,
}

impl Orchestrator {
    /// `config` is expected to have passed `TriageConfig::validate`.
    pub fn new(sources: RecordSources, client: Box<dyn ReasoningClient>, config: TriageConfig) -> Self {
        Self {
            sources,
            client,
            config,
        }
    }

    pub fn config(&self) -> &TriageConfig {
        &self.config
    }

    /// Run one case to a terminal stage. Never panics on bad input; every
    /// fatal condition becomes `RunOutcome::Failed`.
    pub fn run(&self, reference_text: &str) -> RunOutcome {
        let mut run = CaseRun::start();

        let reference = match parse_case_reference(reference_text) {
            Ok(r) => r,
            Err(e) => return run.fail(e.into()),
        };
        run.case_id = Some(reference.case_id.clone());
        run.advance();

        let Aggregation { context, warnings } =
            aggregate(&reference, &self.sources, &self.config.limits);
        run.warnings.extend(warnings);
        run.advance();

        let synthesizer = Synthesizer::new(
            self.client.as_ref(),
            RetryPolicy::from_config(&self.config.retry),
            &self.config.analytics,
            self.config.limits.max_prompt_chars,
        );
        let synthesis = match synthesizer.synthesize(&context, &mut run.warnings) {
            Ok(s) => s,
            Err(e) => return run.fail(e),
        };
        run.advance();

        let validated = match validate_response(&synthesis.raw_text) {
            Ok(v) => v,
            Err(e) => return run.fail(e.into()),
        };
        for w in &validated.warnings {
            log::warn!("case {}: {w}", reference.case_id);
        }
        run.warnings.extend(validated.warnings);
        let report = validated.report.with_data_limitations(&context.gaps);
        run.advance();

        log::info!(
            "run {} case {}: score {} ({}) with {} warnings",
            run.run_id,
            reference.case_id,
            report.suspicion_score,
            report.risk_band(),
            run.warnings.len()
        );

        RunOutcome::Completed(CompletedCase {
            run_id: run.run_id,
            case_id: reference.case_id,
            report,
            context,
            warnings: run.warnings,
            trail: run.trail,
            attempts: synthesis.attempts,
        })
    }

    /// Run one case and hand a completed report to `sink`. Sink failures
    /// surface as `Err`; the case outcome itself is unaffected.
    pub fn process(
        &self,
        reference_text: &str,
        sink: &mut dyn ReportSink,
    ) -> TriageResult<(RunOutcome, Option<String>)> {
        let outcome = self.run(reference_text);
        let location = match &outcome {
            RunOutcome::Completed(c) => Some(sink.deliver(&c.delivery())?),
            RunOutcome::Failed(_) => None,
        };
        Ok((outcome, location))
    }
}
