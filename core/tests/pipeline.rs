//! End-to-end runs through the orchestrator with scripted collaborators.

use triage_core::{
    config::TriageConfig,
    error::CallError,
    pipeline::{Orchestrator, RunOutcome, Stage},
    records::{OfflineSource, RecordSources},
    sink::{FileSink, MemorySink},
    warning::{DataCategory, Warning},
};

mod common;
use common::{
    init_logging, scenario_source, scenario_sources, well_formed_reply, ScriptedClient, SCENARIO_REFERENCE,
};

fn orchestrator(sources: RecordSources, client: &ScriptedClient) -> Orchestrator {
    init_logging();
    Orchestrator::new(sources, Box::new(client.clone()), TriageConfig::default_test())
}

const FULL_TRAIL: [Stage; 5] = [
    Stage::Parsing,
    Stage::Aggregating,
    Stage::Synthesizing,
    Stage::Validating,
    Stage::Done,
];

#[test]
fn scenario_case_completes() {
    let client = ScriptedClient::replying(well_formed_reply("78"));
    let outcome = orchestrator(scenario_sources(), &client).run(SCENARIO_REFERENCE);

    let RunOutcome::Completed(done) = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(done.case_id, "CA6373");
    assert_eq!(done.trail, FULL_TRAIL);
    assert_eq!(done.report.suspicion_score, 78);
    assert_eq!(done.attempts, 1);
    assert!(done.warnings.is_empty(), "unexpected warnings: {:?}", done.warnings);
    assert!(!done.report.narrative.contains("Data limitations"));

    // The model saw the case's own records and nothing else.
    let user = &client.prompts()[0].user;
    assert!(user.contains("9500.00") && user.contains("9800.00"));
    assert!(!user.contains("50000.00"));
    assert_eq!(done.context.transactions.len(), 8);
}

#[test]
fn each_run_gets_its_own_id() {
    let client = ScriptedClient::new(vec![
        Ok(well_formed_reply("50")),
        Ok(well_formed_reply("50")),
    ]);
    let orch = orchestrator(scenario_sources(), &client);
    let a = orch.run(SCENARIO_REFERENCE);
    let b = orch.run(SCENARIO_REFERENCE);
    assert!(a.is_completed() && b.is_completed());
    assert_ne!(a.run_id(), b.run_id());
    assert_eq!(a.report(), b.report());
}

/// A missing source is a warning, not a failure, and the narrative says
/// what was missing.
#[test]
fn unavailable_transactions_still_complete_with_limitations() {
    let source = scenario_source();
    let sources = RecordSources::new(
        Box::new(source.clone()),
        Box::new(OfflineSource::new("transaction", "connection refused")),
        Box::new(source),
    );
    let client = ScriptedClient::replying(well_formed_reply("35"));
    let outcome = orchestrator(sources, &client).run(SCENARIO_REFERENCE);

    assert!(outcome.is_completed(), "{outcome:?}");
    assert_eq!(outcome.trail(), &FULL_TRAIL[..]);
    assert!(outcome.warnings().iter().any(|w| matches!(
        w,
        Warning::SourceUnavailable { category: DataCategory::Transactions, .. }
    )));
    let narrative = &outcome.report().unwrap().narrative;
    assert!(narrative.contains("Data limitations"), "{narrative}");
    assert!(narrative.contains("transaction history source unavailable"));
}

/// A referenced prior case that belongs to another customer is named in
/// the narrative's data limitations.
#[test]
fn withheld_prior_case_reaches_the_narrative() {
    let client = ScriptedClient::replying(well_formed_reply("45"));
    let reference = "Case ID: CA6373, CustID: CUST9051, Previous Cases: CA9999";
    let outcome = orchestrator(scenario_sources(), &client).run(reference);

    let narrative = &outcome.report().expect("completed").narrative;
    assert!(
        narrative.contains("referenced prior case CA9999 belongs to another customer"),
        "{narrative}"
    );
    assert!(client.prompts()[0].user.contains("DATA GAPS"));
}

#[test]
fn malformed_model_output_fails_at_validation() {
    let client = ScriptedClient::replying("I am unable to assess this case.");
    let outcome = orchestrator(scenario_sources(), &client).run(SCENARIO_REFERENCE);

    let RunOutcome::Failed(failed) = outcome else {
        panic!("expected failure");
    };
    assert_eq!(failed.stage, Stage::Validating);
    assert_eq!(failed.case_id.as_deref(), Some("CA6373"));
    assert_eq!(
        failed.trail,
        vec![
            Stage::Parsing,
            Stage::Aggregating,
            Stage::Synthesizing,
            Stage::Validating,
            Stage::Failed
        ]
    );
    assert!(failed.summary().starts_with("Validating failed:"));
}

#[test]
fn unparseable_reference_fails_at_parsing_without_calls() {
    let client = ScriptedClient::replying(well_formed_reply("10"));
    let outcome = orchestrator(scenario_sources(), &client).run("Name: nobody in particular");

    let RunOutcome::Failed(failed) = outcome else {
        panic!("expected failure");
    };
    assert_eq!(failed.stage, Stage::Parsing);
    assert_eq!(failed.case_id, None);
    assert_eq!(failed.trail, vec![Stage::Parsing, Stage::Failed]);
    assert_eq!(client.calls(), 0);
}

#[test]
fn fatal_call_error_fails_at_synthesis() {
    let client = ScriptedClient::new(vec![Err(CallError::Fatal("HTTP 401: bad key".into()))]);
    let outcome = orchestrator(scenario_sources(), &client).run(SCENARIO_REFERENCE);

    let RunOutcome::Failed(failed) = outcome else {
        panic!("expected failure");
    };
    assert_eq!(failed.stage, Stage::Synthesizing);
    assert!(failed.reason.contains("bad key"), "{}", failed.reason);
    assert_eq!(client.calls(), 1);
}

#[test]
fn exhausted_retries_fail_with_warnings_kept() {
    let client = ScriptedClient::new(vec![
        Err(CallError::Transient("HTTP 503".into())),
        Err(CallError::Transient("HTTP 503".into())),
        Err(CallError::Transient("HTTP 503".into())),
    ]);
    let outcome = orchestrator(scenario_sources(), &client).run(SCENARIO_REFERENCE);

    let RunOutcome::Failed(failed) = outcome else {
        panic!("expected failure");
    };
    assert_eq!(failed.stage, Stage::Synthesizing);
    assert_eq!(client.calls(), 3);
    let retried = failed
        .warnings
        .iter()
        .filter(|w| matches!(w, Warning::CallRetried { .. }))
        .count();
    assert_eq!(retried, 2);
}

#[test]
fn clamped_score_warning_travels_with_outcome() {
    let client = ScriptedClient::replying(well_formed_reply("140"));
    let outcome = orchestrator(scenario_sources(), &client).run(SCENARIO_REFERENCE);
    assert_eq!(outcome.report().unwrap().suspicion_score, 100);
    assert!(outcome
        .warnings()
        .contains(&Warning::ScoreClamped { reported: 140, clamped: 100 }));
}

#[test]
fn completed_reports_reach_the_sink() {
    let client = ScriptedClient::new(vec![Ok(well_formed_reply("61")), Ok("no format".into())]);
    let orch = orchestrator(scenario_sources(), &client);
    let mut sink = MemorySink::new();

    let (outcome, location) = orch.process(SCENARIO_REFERENCE, &mut sink).unwrap();
    assert!(outcome.is_completed());
    assert_eq!(location.as_deref(), Some("memory[0]"));
    assert_eq!(sink.delivered.len(), 1);
    assert_eq!(sink.delivered[0].case_id, "CA6373");
    assert_eq!(sink.delivered[0].run_id, outcome.run_id());

    // A failed run delivers nothing.
    let (outcome, location) = orch.process(SCENARIO_REFERENCE, &mut sink).unwrap();
    assert!(!outcome.is_completed());
    assert!(location.is_none());
    assert_eq!(sink.delivered.len(), 1);
}

#[test]
fn file_sink_writes_report_and_sidecar() {
    let dir = tempfile::tempdir().unwrap();
    let client = ScriptedClient::replying(well_formed_reply("61"));
    let orch = orchestrator(scenario_sources(), &client);
    let mut sink = FileSink::new(dir.path().join("reports"));

    let (outcome, location) = orch.process(SCENARIO_REFERENCE, &mut sink).unwrap();
    let path = location.expect("report path");
    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, outcome.report().unwrap().render());
    assert!(path.contains("case_report_CA6373_"));

    let sidecar = std::fs::read_to_string(path.replace(".txt", ".json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&sidecar).unwrap();
    assert_eq!(json["case_id"], "CA6373");
    assert_eq!(json["suspicion_score"], 61);
    assert_eq!(json["risk_band"], "medium_high");
}
