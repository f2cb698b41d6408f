//! Case reference parser: turns the analyst's "Label: value" text into
//! a `CaseReference`.
//!
//! RULES:
//!   - Label matching ignores case, surrounding whitespace and `_`.
//!   - A line may hold several pairs; a new pair starts wherever a
//!     recognized label followed by `:` appears.
//!   - Placeholder values (N/A, none, null, empty) count as absent.
//!   - Only Case ID and CustID are required.

use crate::{
    error::ParseError,
    types::{AccountId, CaseId, CustomerId, TransactionId},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const PLACEHOLDERS: [&str; 5] = ["n/a", "na", "none", "null", "empty"];
const LIST_DELIMITERS: [char; 3] = [',', ';', '|'];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseReference {
    pub case_id: CaseId,
    pub customer_name: Option<String>,
    pub customer_id: CustomerId,
    pub account_ids: Vec<AccountId>,
    pub transaction_ids: Vec<TransactionId>,
    pub prior_case_ids: Vec<CaseId>,
}

impl CaseReference {
    /// Minimal reference with only the required identifiers set.
    pub fn new(case_id: impl Into<CaseId>, customer_id: impl Into<CustomerId>) -> Self {
        Self {
            case_id: case_id.into(),
            customer_id: customer_id.into(),
            ..Self::default()
        }
    }

    pub fn with_accounts<I, S>(mut self, accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<AccountId>,
    {
        for a in accounts {
            push_unique(&mut self.account_ids, a.into());
        }
        self
    }

    pub fn with_prior_cases<I, S>(mut self, cases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CaseId>,
    {
        for c in cases {
            push_unique(&mut self.prior_case_ids, c.into());
        }
        self
    }

    pub fn with_transactions<I, S>(mut self, txns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TransactionId>,
    {
        for t in txns {
            push_unique(&mut self.transaction_ids, t.into());
        }
        self
    }

    pub fn owns_account(&self, account_id: &str) -> bool {
        self.account_ids.iter().any(|a| a == account_id)
    }
}

/// Which `CaseReference` slot a label feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    CaseId,
    Name,
    CustomerId,
    Accounts,
    Transactions,
    PriorCases,
}

impl Field {
    /// Map a normalized label (lowercase, no whitespace or underscores).
    fn from_label(label: &str) -> Option<Self> {
        let field = match label {
            "caseid" => Field::CaseId,
            "name" | "customername" | "customer" => Field::Name,
            "custid" | "customerid" => Field::CustomerId,
            "accounts" | "account" | "accountnumbers" | "acc" => Field::Accounts,
            "transactions" | "transaction" | "transactionid" | "transactionids" | "txn"
            | "txns" => Field::Transactions,
            "previouscases" | "prevcases" | "priorcases" => Field::PriorCases,
            _ => return None,
        };
        Some(field)
    }
}

fn label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // A label is only recognized at the start of a line or right after a
        // pair separator, so account numbers like "ACC212" never split values.
        Regex::new(
            r"(?i)(?:^|[,;])\s*((?:case[\s_]*id|customer[\s_]*name|customer[\s_]*id|cust[\s_]*id|customer|name|account[\s_]*numbers|accounts?|acc|transaction[\s_]*ids?|transactions?|txns?|previous[\s_]*cases|prev[\s_]*cases|prior[\s_]*cases))\s*:",
        )
        .expect("label pattern compiles")
    })
}

fn normalize_label(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn is_placeholder(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || PLACEHOLDERS.iter().any(|p| v.eq_ignore_ascii_case(p))
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(&LIST_DELIMITERS[..])
        .map(str::trim)
        .filter(|v| !is_placeholder(v))
        .map(str::to_string)
}

/// Extract `(field, value)` pairs from a single line.
fn pairs_in_line(line: &str) -> Vec<(Field, &str)> {
    let matches: Vec<_> = label_pattern().captures_iter(line).collect();
    let mut pairs = Vec::with_capacity(matches.len());

    for (i, caps) in matches.iter().enumerate() {
        let (Some(whole), Some(label)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Some(field) = Field::from_label(&normalize_label(label.as_str())) else {
            continue;
        };
        let value_end = matches
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(line.len());
        let value = line[whole.end()..value_end]
            .trim()
            .trim_end_matches(|c| c == ',' || c == ';')
            .trim();
        pairs.push((field, value));
    }
    pairs
}

/// Parse case-reference text into a `CaseReference`.
pub fn parse_case_reference(text: &str) -> Result<CaseReference, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let mut case_id: Option<String> = None;
    let mut customer_id: Option<String> = None;
    let mut reference = CaseReference::default();

    for line in text.lines() {
        let pairs = pairs_in_line(line);
        if pairs.is_empty() {
            if !line.trim().is_empty() {
                log::debug!("case reference: ignoring unrecognized line {:?}", line.trim());
            }
            continue;
        }

        for (field, value) in pairs {
            match field {
                Field::CaseId => set_once(&mut case_id, value, "Case ID"),
                Field::CustomerId => set_once(&mut customer_id, value, "CustID"),
                Field::Name => set_once(&mut reference.customer_name, value, "Name"),
                Field::Accounts => {
                    for v in split_list(value) {
                        push_unique(&mut reference.account_ids, v);
                    }
                }
                Field::Transactions => {
                    for v in split_list(value) {
                        push_unique(&mut reference.transaction_ids, v);
                    }
                }
                Field::PriorCases => {
                    for v in split_list(value) {
                        push_unique(&mut reference.prior_case_ids, v);
                    }
                }
            }
        }
    }

    reference.case_id = case_id.ok_or(ParseError::MissingField { label: "Case ID" })?;
    reference.customer_id = customer_id.ok_or(ParseError::MissingField { label: "CustID" })?;

    log::debug!(
        "case reference parsed: case={} customer={} accounts={} transactions={} prior_cases={}",
        reference.case_id,
        reference.customer_id,
        reference.account_ids.len(),
        reference.transaction_ids.len(),
        reference.prior_case_ids.len(),
    );
    Ok(reference)
}

/// First non-placeholder value wins.
fn set_once(slot: &mut Option<String>, value: &str, label: &str) {
    if is_placeholder(value) {
        return;
    }
    match slot {
        Some(existing) => {
            if existing != value.trim() {
                log::warn!("case reference: repeated '{label}' ignored ({existing} kept)");
            }
        }
        None => *slot = Some(value.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_normalize_across_spellings() {
        assert_eq!(Field::from_label(&normalize_label("Case_ID")), Some(Field::CaseId));
        assert_eq!(Field::from_label(&normalize_label(" Cust ID ")), Some(Field::CustomerId));
        assert_eq!(
            Field::from_label(&normalize_label("Previous Cases")),
            Some(Field::PriorCases)
        );
        assert_eq!(Field::from_label(&normalize_label("Notes")), None);
    }

    #[test]
    fn account_numbers_do_not_start_new_pairs() {
        let pairs = pairs_in_line("Accounts: ACC212,ACC223, Previous Cases: CA7248");
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0], (Field::Accounts, "ACC212,ACC223"));
        assert_eq!(pairs[1], (Field::PriorCases, "CA7248"));
    }
}
