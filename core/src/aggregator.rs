//! Data aggregator: resolves a `CaseReference` against the three record
//! relations and produces the `CaseContext` the synthesizer works from.
//!
//! LOOKUP POLICY (fixed):
//!   1. Customer profile: exact customer id match, first row wins.
//!   2. Transactions: customer id OR referenced account, de-duplicated,
//!      sorted by date, capped at the most recent N.
//!   3. Prior cases: explicit ids first, customer id fallback.
//!
//! RULES:
//!   - Nothing belonging to another customer or an unreferenced account
//!     may enter a context, whatever the source returns.
//!   - An unreachable source empties its category and adds a warning.
//!     Aggregation itself never fails.
//!   - Lookups may run concurrently; merge order is always
//!     profile → transactions → prior cases.

use crate::{
    case_ref::CaseReference,
    config::LimitsConfig,
    records::{CustomerProfile, PriorCase, RecordSources, SourceResult, TransactionRecord},
    warning::{DataCategory, Warning},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A category the synthesizer has to work without, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataGap {
    pub category: DataCategory,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseContext {
    pub reference: CaseReference,
    pub profile: Option<CustomerProfile>,
    /// Oldest first.
    pub transactions: Vec<TransactionRecord>,
    pub prior_cases: Vec<PriorCase>,
    pub gaps: Vec<DataGap>,
}

impl CaseContext {
    /// True when the transaction was named in the case reference.
    pub fn is_flagged(&self, txn: &TransactionRecord) -> bool {
        txn.transaction_id
            .as_ref()
            .is_some_and(|id| self.reference.transaction_ids.contains(id))
    }

    pub fn belongs_to_case(&self, txn: &TransactionRecord) -> bool {
        owns_transaction(&self.reference, txn)
    }
}

#[derive(Debug, Clone)]
pub struct Aggregation {
    pub context: CaseContext,
    pub warnings: Vec<Warning>,
}

fn owns_transaction(reference: &CaseReference, txn: &TransactionRecord) -> bool {
    txn.customer_id == reference.customer_id || reference.owns_account(&txn.account_id)
}

fn owns_prior_case(reference: &CaseReference, case: &PriorCase) -> bool {
    case.customer_id == reference.customer_id
        || case.account_ids.iter().any(|a| reference.owns_account(a))
}

/// Build the context for one case.
pub fn aggregate(
    reference: &CaseReference,
    sources: &RecordSources,
    limits: &LimitsConfig,
) -> Aggregation {
    let lookup_profiles = || sources.customers.customers_by_id(&reference.customer_id);
    let lookup_transactions = || {
        sources
            .transactions
            .transactions_for(&reference.customer_id, &reference.account_ids)
    };
    let lookup_prior_cases = || {
        if reference.prior_case_ids.is_empty() {
            sources.prior_cases.cases_for_customer(&reference.customer_id)
        } else {
            sources.prior_cases.cases_by_ids(&reference.prior_case_ids)
        }
    };

    let (profiles, (transactions, prior_cases)) = if limits.parallel_lookups {
        rayon::join(lookup_profiles, || {
            rayon::join(lookup_transactions, lookup_prior_cases)
        })
    } else {
        (lookup_profiles(), (lookup_transactions(), lookup_prior_cases()))
    };

    let mut warnings = Vec::new();
    let mut gaps = Vec::new();

    let profile = resolve_profile(reference, profiles, &mut warnings, &mut gaps);
    let transactions = resolve_transactions(
        reference,
        transactions,
        limits.transaction_cap,
        &mut warnings,
        &mut gaps,
    );
    let prior_cases = resolve_prior_cases(reference, prior_cases, &mut warnings, &mut gaps);

    for w in &warnings {
        log::warn!("case {}: {w}", reference.case_id);
    }
    log::info!(
        "case {}: aggregated profile={} transactions={} prior_cases={} gaps={}",
        reference.case_id,
        profile.is_some(),
        transactions.len(),
        prior_cases.len(),
        gaps.len(),
    );

    Aggregation {
        context: CaseContext {
            reference: reference.clone(),
            profile,
            transactions,
            prior_cases,
            gaps,
        },
        warnings,
    }
}

fn record_unavailable(
    category: DataCategory,
    reason: String,
    warnings: &mut Vec<Warning>,
    gaps: &mut Vec<DataGap>,
) {
    gaps.push(DataGap {
        category,
        detail: format!("{} source unavailable", category.label()),
    });
    warnings.push(Warning::SourceUnavailable { category, reason });
}

fn record_no_matches(category: DataCategory, warnings: &mut Vec<Warning>, gaps: &mut Vec<DataGap>) {
    gaps.push(DataGap {
        category,
        detail: format!("no {} records found", category.label()),
    });
    warnings.push(Warning::NoMatches { category });
}

fn resolve_profile(
    reference: &CaseReference,
    looked_up: SourceResult<Vec<CustomerProfile>>,
    warnings: &mut Vec<Warning>,
    gaps: &mut Vec<DataGap>,
) -> Option<CustomerProfile> {
    let category = DataCategory::CustomerProfile;
    let rows = match looked_up {
        Ok(rows) => rows,
        Err(e) => {
            record_unavailable(category, e.to_string(), warnings, gaps);
            return None;
        }
    };

    let mut matches = rows
        .into_iter()
        .filter(|c| c.customer_id == reference.customer_id);
    let first = matches.next();
    let extra = matches.count();

    match first {
        None => {
            record_no_matches(category, warnings, gaps);
            None
        }
        Some(profile) => {
            if extra > 0 {
                warnings.push(Warning::DuplicateCustomerId {
                    customer_id: reference.customer_id.clone(),
                    matches: extra + 1,
                });
            }
            Some(profile)
        }
    }
}

fn resolve_transactions(
    reference: &CaseReference,
    looked_up: SourceResult<Vec<TransactionRecord>>,
    cap: usize,
    warnings: &mut Vec<Warning>,
    gaps: &mut Vec<DataGap>,
) -> Vec<TransactionRecord> {
    let category = DataCategory::Transactions;
    let rows = match looked_up {
        Ok(rows) => rows,
        Err(e) => {
            record_unavailable(category, e.to_string(), warnings, gaps);
            return Vec::new();
        }
    };

    let mut seen_ids = HashSet::new();
    let mut kept: Vec<TransactionRecord> = Vec::new();
    for txn in rows.into_iter().filter(|t| owns_transaction(reference, t)) {
        let duplicate = match &txn.transaction_id {
            Some(id) => !seen_ids.insert(id.clone()),
            None => kept.contains(&txn),
        };
        if !duplicate {
            kept.push(txn);
        }
    }

    if kept.is_empty() {
        record_no_matches(category, warnings, gaps);
        return kept;
    }

    // Stable: same-day rows keep source order.
    kept.sort_by_key(|t| t.date);

    if kept.len() > cap {
        let dropped = kept.len() - cap;
        kept.drain(..dropped);
        warnings.push(Warning::TransactionsCapped {
            kept: kept.len(),
            dropped,
        });
    }
    kept
}

fn resolve_prior_cases(
    reference: &CaseReference,
    looked_up: SourceResult<Vec<PriorCase>>,
    warnings: &mut Vec<Warning>,
    gaps: &mut Vec<DataGap>,
) -> Vec<PriorCase> {
    let category = DataCategory::PriorCases;
    let rows = match looked_up {
        Ok(rows) => rows,
        Err(e) => {
            record_unavailable(category, e.to_string(), warnings, gaps);
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    let mut owned = Vec::new();
    let mut foreign = Vec::new();
    for case in rows {
        if !seen.insert(case.case_id.clone()) {
            continue;
        }
        if owns_prior_case(reference, &case) {
            owned.push(case);
        } else {
            foreign.push((case.case_id.clone(), case.customer_id.clone()));
            warnings.push(Warning::ForeignPriorCase {
                case_id: case.case_id,
                owner: case.customer_id,
            });
        }
    }

    let explicit = &reference.prior_case_ids;
    if !explicit.is_empty() {
        // Withheld referenced cases are missing context too.
        for (id, owner) in foreign {
            gaps.push(DataGap {
                category,
                detail: format!("referenced prior case {id} belongs to another customer ({owner})"),
            });
        }

        // Reference order, not source order.
        owned.sort_by_key(|c| explicit.iter().position(|id| *id == c.case_id));

        for id in explicit {
            if !seen.contains(id) {
                warnings.push(Warning::PriorCaseNotFound {
                    case_id: id.clone(),
                });
                gaps.push(DataGap {
                    category,
                    detail: format!("referenced prior case {id} not found"),
                });
            }
        }
    }

    if owned.is_empty() && explicit.is_empty() {
        record_no_matches(category, warnings, gaps);
    }
    owned
}
