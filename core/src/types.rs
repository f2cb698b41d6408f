//! Shared primitive types used across the triage pipeline.

/// Identifier of the case under review (e.g. `CA6373`).
pub type CaseId = String;

/// Stable customer identifier from the master dataset (e.g. `CUST9051`).
pub type CustomerId = String;

/// Account number as it appears in the master and transaction datasets.
pub type AccountId = String;

/// Transaction reference. Opaque; never parsed.
pub type TransactionId = String;

/// Per-run identifier, fresh for every case processed.
pub type RunId = String;
