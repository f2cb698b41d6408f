//! Recoverable conditions recorded while a case moves through the pipeline.
//!
//! RULE: A warning never stops a run. Anything that must stop a run is a
//! `TriageError` instead. Warnings travel with the report (or with the
//! failure) to the output sink.

use crate::types::{CaseId, CustomerId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three record relations a case draws on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataCategory {
    CustomerProfile,
    Transactions,
    PriorCases,
}

impl DataCategory {
    pub fn label(&self) -> &'static str {
        match self {
            DataCategory::CustomerProfile => "customer profile",
            DataCategory::Transactions => "transaction history",
            DataCategory::PriorCases => "prior cases",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Warning {
    // ── Aggregation ────────────────────────────────
    SourceUnavailable {
        category: DataCategory,
        reason: String,
    },
    NoMatches {
        category: DataCategory,
    },
    DuplicateCustomerId {
        customer_id: CustomerId,
        matches: usize,
    },
    ForeignPriorCase {
        case_id: CaseId,
        owner: CustomerId,
    },
    PriorCaseNotFound {
        case_id: CaseId,
    },
    TransactionsCapped {
        kept: usize,
        dropped: usize,
    },

    // ── Synthesis ──────────────────────────────────
    PromptTruncated {
        transactions_dropped: usize,
        prior_cases_dropped: usize,
        hard_cut: bool,
    },
    CallRetried {
        attempt: u32,
        reason: String,
    },

    // ── Validation ─────────────────────────────────
    ScoreClamped {
        reported: i64,
        clamped: u8,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::SourceUnavailable { category, reason } => {
                write!(f, "{} unavailable: {reason}", category.label())
            }
            Warning::NoMatches { category } => {
                write!(f, "no {} records matched this case", category.label())
            }
            Warning::DuplicateCustomerId { customer_id, matches } => write!(
                f,
                "customer id {customer_id} appears {matches} times in master data; first match used"
            ),
            Warning::ForeignPriorCase { case_id, owner } => write!(
                f,
                "prior case {case_id} belongs to customer {owner} and was excluded"
            ),
            Warning::PriorCaseNotFound { case_id } => {
                write!(f, "prior case {case_id} not found in case history")
            }
            Warning::TransactionsCapped { kept, dropped } => write!(
                f,
                "transaction history capped at {kept} most recent records ({dropped} older omitted)"
            ),
            Warning::PromptTruncated {
                transactions_dropped,
                prior_cases_dropped,
                hard_cut,
            } => {
                write!(
                    f,
                    "prompt truncated to fit size limit ({transactions_dropped} transactions, \
                     {prior_cases_dropped} prior cases dropped"
                )?;
                if *hard_cut {
                    write!(f, ", case data cut short")?;
                }
                write!(f, ")")
            }
            Warning::CallRetried { attempt, reason } => {
                write!(f, "reasoning call attempt {attempt} failed transiently: {reason}")
            }
            Warning::ScoreClamped { reported, clamped } => write!(
                f,
                "model reported suspicion score {reported}; clamped to {clamped}"
            ),
        }
    }
}
