//! AML case triage core.
//!
//! A case reference goes in; a `CaseReport` (description, suspicion score,
//! narrative) comes out. See `pipeline` for the stage order.

pub mod aggregator;
pub mod analytics;
pub mod case_ref;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod prompt;
pub mod reasoning;
pub mod records;
pub mod report;
pub mod sink;
pub mod store;
pub mod synthesizer;
pub mod types;
pub mod validator;
pub mod warning;
