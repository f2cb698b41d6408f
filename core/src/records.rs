//! Record relations consulted during aggregation.
//!
//! RULE: Sources are read-only lookups by key. They may return rows that
//! do not match exactly (a loose SQL filter, a stale cache); the
//! aggregator re-checks ownership before anything reaches a case context.

use crate::{
    error::SourceError,
    types::{AccountId, CaseId, CustomerId, TransactionId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type SourceResult<T> = Result<T, SourceError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub customer_id: CustomerId,
    pub name: String,
    pub accounts: Vec<AccountId>,
    pub employer: Option<String>,
    pub location: Option<String>,
    pub occupation: Option<String>,
    pub age: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: Option<TransactionId>,
    pub account_id: AccountId,
    pub customer_id: CustomerId,
    pub date: NaiveDate,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorCase {
    pub case_id: CaseId,
    pub customer_id: CustomerId,
    pub account_ids: Vec<AccountId>,
    pub transaction_ids: Vec<TransactionId>,
    pub disposition_reason: String,
    pub tier_closed: Option<String>,
}

/// Customer/account master data.
pub trait CustomerSource: Send + Sync {
    fn customers_by_id(&self, customer_id: &str) -> SourceResult<Vec<CustomerProfile>>;
}

/// Transaction history. Rows come back in source order.
pub trait TransactionSource: Send + Sync {
    fn transactions_for(
        &self,
        customer_id: &str,
        account_ids: &[AccountId],
    ) -> SourceResult<Vec<TransactionRecord>>;
}

/// Prior-case history.
pub trait PriorCaseSource: Send + Sync {
    fn cases_by_ids(&self, case_ids: &[CaseId]) -> SourceResult<Vec<PriorCase>>;
    fn cases_for_customer(&self, customer_id: &str) -> SourceResult<Vec<PriorCase>>;
}

/// The three relations a case is resolved against.
pub struct RecordSources {
    pub customers: Box<dyn CustomerSource>,
    pub transactions: Box<dyn TransactionSource>,
    pub prior_cases: Box<dyn PriorCaseSource>,
}

impl RecordSources {
    pub fn new(
        customers: Box<dyn CustomerSource>,
        transactions: Box<dyn TransactionSource>,
        prior_cases: Box<dyn PriorCaseSource>,
    ) -> Self {
        Self {
            customers,
            transactions,
            prior_cases,
        }
    }
}

// ── In-memory relations ─────────────────────────────────────────────

/// Vec-backed relations. Used for tests and for datasets small enough to
/// load up front.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pub customers: Vec<CustomerProfile>,
    pub transactions: Vec<TransactionRecord>,
    pub prior_cases: Vec<PriorCase>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_customer(mut self, c: CustomerProfile) -> Self {
        self.customers.push(c);
        self
    }

    pub fn with_transaction(mut self, t: TransactionRecord) -> Self {
        self.transactions.push(t);
        self
    }

    pub fn with_prior_case(mut self, p: PriorCase) -> Self {
        self.prior_cases.push(p);
        self
    }
}

impl CustomerSource for MemorySource {
    fn customers_by_id(&self, customer_id: &str) -> SourceResult<Vec<CustomerProfile>> {
        Ok(self
            .customers
            .iter()
            .filter(|c| c.customer_id == customer_id)
            .cloned()
            .collect())
    }
}

impl TransactionSource for MemorySource {
    fn transactions_for(
        &self,
        customer_id: &str,
        account_ids: &[AccountId],
    ) -> SourceResult<Vec<TransactionRecord>> {
        Ok(self
            .transactions
            .iter()
            .filter(|t| t.customer_id == customer_id || account_ids.contains(&t.account_id))
            .cloned()
            .collect())
    }
}

impl PriorCaseSource for MemorySource {
    fn cases_by_ids(&self, case_ids: &[CaseId]) -> SourceResult<Vec<PriorCase>> {
        Ok(self
            .prior_cases
            .iter()
            .filter(|p| case_ids.contains(&p.case_id))
            .cloned()
            .collect())
    }

    fn cases_for_customer(&self, customer_id: &str) -> SourceResult<Vec<PriorCase>> {
        Ok(self
            .prior_cases
            .iter()
            .filter(|p| p.customer_id == customer_id)
            .cloned()
            .collect())
    }
}

// ── Unreachable relation ────────────────────────────────────────────

/// Stands in for a relation whose backing file could not be opened.
/// Every lookup reports the original failure.
#[derive(Debug, Clone)]
pub struct OfflineSource {
    source_name: &'static str,
    reason: String,
}

impl OfflineSource {
    pub fn new(source_name: &'static str, reason: impl Into<String>) -> Self {
        Self {
            source_name,
            reason: reason.into(),
        }
    }

    fn fail<T>(&self) -> SourceResult<T> {
        Err(SourceError::Unavailable {
            source_name: self.source_name,
            reason: self.reason.clone(),
        })
    }
}

impl CustomerSource for OfflineSource {
    fn customers_by_id(&self, _customer_id: &str) -> SourceResult<Vec<CustomerProfile>> {
        self.fail()
    }
}

impl TransactionSource for OfflineSource {
    fn transactions_for(
        &self,
        _customer_id: &str,
        _account_ids: &[AccountId],
    ) -> SourceResult<Vec<TransactionRecord>> {
        self.fail()
    }
}

impl PriorCaseSource for OfflineSource {
    fn cases_by_ids(&self, _case_ids: &[CaseId]) -> SourceResult<Vec<PriorCase>> {
        self.fail()
    }

    fn cases_for_customer(&self, _customer_id: &str) -> SourceResult<Vec<PriorCase>> {
        self.fail()
    }
}
