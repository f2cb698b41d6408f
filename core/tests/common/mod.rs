//! Shared fixtures: the CA6373 / CUST9051 scenario and a scripted
//! reasoning client.
#![allow(dead_code)]

use chrono::NaiveDate;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use triage_core::{
    error::CallError,
    prompt::Prompt,
    reasoning::ReasoningClient,
    records::{CustomerProfile, MemorySource, PriorCase, RecordSources, TransactionRecord},
};

pub const SCENARIO_REFERENCE: &str =
    "Case ID: CA6373, CustID: CUST9051, Accounts: ACC212,ACC223, Previous Cases: CA7248";

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid test date")
}

pub fn txn(id: &str, account: &str, customer: &str, day: &str, amount: f64) -> TransactionRecord {
    TransactionRecord {
        transaction_id: if id.is_empty() { None } else { Some(id.to_string()) },
        account_id: account.to_string(),
        customer_id: customer.to_string(),
        date: date(day),
        amount,
    }
}

pub fn profile(customer_id: &str, name: &str, accounts: &[&str]) -> CustomerProfile {
    CustomerProfile {
        customer_id: customer_id.to_string(),
        name: name.to_string(),
        accounts: accounts.iter().map(|a| a.to_string()).collect(),
        employer: Some("Harbour Logistics Ltd".into()),
        location: Some("Leeds".into()),
        occupation: None,
        age: Some(38),
    }
}

pub fn prior(case_id: &str, customer: &str, accounts: &[&str]) -> PriorCase {
    PriorCase {
        case_id: case_id.to_string(),
        customer_id: customer.to_string(),
        account_ids: accounts.iter().map(|a| a.to_string()).collect(),
        transaction_ids: Vec::new(),
        disposition_reason: "Activity explained by documented asset sale".into(),
        tier_closed: Some("2".into()),
    }
}

/// CUST9051 with two accounts, eight transactions, one prior case, plus
/// rows belonging to an unrelated customer that must never leak in.
pub fn scenario_source() -> MemorySource {
    MemorySource::new()
        .with_customer(profile("CUST9051", "Dana Whitfield", &["ACC212", "ACC223"]))
        .with_customer(profile("CUST0001", "Someone Else", &["ACC999"]))
        .with_transaction(txn("T1", "ACC212", "CUST9051", "2024-01-05", 2_150.0))
        .with_transaction(txn("T2", "ACC223", "CUST9051", "2024-02-05", 2_190.0))
        .with_transaction(txn("T3", "ACC212", "CUST9051", "2024-03-05", 2_170.0))
        .with_transaction(txn("T4", "ACC212", "CUST9051", "2024-04-05", 2_160.0))
        .with_transaction(txn("T5", "ACC223", "CUST9051", "2024-05-05", 2_180.0))
        .with_transaction(txn("T6", "ACC212", "CUST9051", "2024-06-05", 2_155.0))
        .with_transaction(txn("T7", "ACC223", "CUST9051", "2024-07-02", 9_500.0))
        .with_transaction(txn("T8", "ACC223", "CUST9051", "2024-07-03", 9_800.0))
        .with_transaction(txn("X1", "ACC999", "CUST0001", "2024-03-01", 50_000.0))
        .with_prior_case(prior("CA7248", "CUST9051", &["ACC212"]))
        .with_prior_case(prior("CA9999", "CUST0001", &["ACC999"]))
}

pub fn sources_from(source: MemorySource) -> RecordSources {
    RecordSources::new(
        Box::new(source.clone()),
        Box::new(source.clone()),
        Box::new(source),
    )
}

/// Route `log` output through the test harness; safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn scenario_sources() -> RecordSources {
    sources_from(scenario_source())
}

pub fn well_formed_reply(score: &str) -> String {
    format!(
        "CASE DESCRIPTION:\n\
         Two cash deposits of 9,500 and 9,800 into ACC223 sit far above the customer's \
         salary-like baseline of roughly 2,170 per month.\n\n\
         SUSPICION SCORE: {score}\n\n\
         NARRATIVE:\n\
         The customer's history shows stable monthly credits. July 2024 breaks the pattern \
         with two just-below-threshold deposits. Prior case CA7248 closed at tier 2. \
         Escalation for enhanced due diligence is recommended.\n"
    )
}

struct Script {
    replies: VecDeque<Result<String, CallError>>,
    prompts: Vec<Prompt>,
}

/// Plays back canned replies in order and records every prompt it sees.
/// Clones share the same script.
#[derive(Clone)]
pub struct ScriptedClient {
    inner: Arc<Mutex<Script>>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<Result<String, CallError>>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Script {
                replies: replies.into(),
                prompts: Vec::new(),
            })),
        }
    }

    pub fn replying(text: impl Into<String>) -> Self {
        Self::new(vec![Ok(text.into())])
    }

    pub fn calls(&self) -> usize {
        self.inner.lock().unwrap().prompts.len()
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.inner.lock().unwrap().prompts.clone()
    }
}

impl ReasoningClient for ScriptedClient {
    fn complete(&self, prompt: &Prompt) -> Result<String, CallError> {
        let mut script = self.inner.lock().unwrap();
        script.prompts.push(prompt.clone());
        script
            .replies
            .pop_front()
            .unwrap_or_else(|| Err(CallError::Fatal("script exhausted".into())))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
