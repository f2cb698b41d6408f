//! CSV → SQLite import for the three record relations.
//!
//! Column names follow the bank's export headers; common spellings are
//! accepted through serde aliases. Rows that cannot be read are skipped
//! with a warning, never silently.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;
use triage_core::{
    records::{CustomerProfile, PriorCase, TransactionRecord},
    store::RecordStore,
};

#[derive(Debug, Deserialize)]
struct CustomerRow {
    #[serde(alias = "CustID", alias = "CUSTID", alias = "cust_id", alias = "CustomerID")]
    customer_id: String,
    #[serde(alias = "Name", alias = "NAME")]
    name: String,
    #[serde(default, alias = "Accounts", alias = "ACCOUNTS", alias = "Account")]
    accounts: Option<String>,
    #[serde(default, alias = "Employer", alias = "EMPLOYER")]
    employer: Option<String>,
    #[serde(default, alias = "Location", alias = "LOCATION")]
    location: Option<String>,
    #[serde(default, alias = "Occupation", alias = "OCCUPATION")]
    occupation: Option<String>,
    #[serde(default, alias = "Age", alias = "AGE")]
    age: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TransactionRow {
    #[serde(default, alias = "TXN_ID", alias = "TransactionID", alias = "Transaction ID")]
    transaction_id: Option<String>,
    #[serde(alias = "ACCOUNT", alias = "Account", alias = "account")]
    account_id: String,
    #[serde(alias = "CUSTID", alias = "CustID", alias = "cust_id")]
    customer_id: String,
    #[serde(alias = "DATE", alias = "Date")]
    date: String,
    #[serde(alias = "AMOUNT", alias = "Amount")]
    amount: String,
}

#[derive(Debug, Deserialize)]
struct CaseRow {
    #[serde(alias = "CaseID", alias = "Case ID", alias = "CASE_ID")]
    case_id: String,
    #[serde(alias = "CustID", alias = "CUSTID", alias = "cust_id")]
    customer_id: String,
    #[serde(default, alias = "Accounts", alias = "ACCOUNTS")]
    account_ids: Option<String>,
    #[serde(default, alias = "Transactions", alias = "TRANSACTIONS")]
    transaction_ids: Option<String>,
    #[serde(default, alias = "Disposition Reason", alias = "Reason", alias = "DISPOSITION")]
    disposition_reason: Option<String>,
    #[serde(default, alias = "Tier Closed", alias = "Tier", alias = "TIER")]
    tier_closed: Option<String>,
}

fn split_list(value: Option<String>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split([',', ';', '|'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];

fn parse_date(raw: &str) -> Option<NaiveDate> {
    // Exports sometimes carry a time part.
    let day = raw.trim().split([' ', 'T']).next().unwrap_or_default();
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(day, f).ok())
}

fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    cleaned.parse().ok()
}

fn read_rows<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("cannot open {}", path.display()))?;
    let mut rows = Vec::new();
    for (i, result) in reader.deserialize::<T>().enumerate() {
        match result {
            Ok(row) => rows.push(row),
            // +2: header line, 1-based numbering.
            Err(e) => log::warn!("{}: skipping row {}: {e}", path.display(), i + 2),
        }
    }
    Ok(rows)
}

pub fn customers(path: &Path, store: &RecordStore) -> Result<usize> {
    let profiles: Vec<CustomerProfile> = read_rows::<CustomerRow>(path)?
        .into_iter()
        .map(|r| CustomerProfile {
            customer_id: r.customer_id,
            name: r.name,
            accounts: split_list(r.accounts),
            employer: non_empty(r.employer),
            location: non_empty(r.location),
            occupation: non_empty(r.occupation),
            age: r.age,
        })
        .collect();
    Ok(store.insert_customers(&profiles)?)
}

pub fn transactions(path: &Path, store: &RecordStore) -> Result<usize> {
    let mut records = Vec::new();
    for (i, r) in read_rows::<TransactionRow>(path)?.into_iter().enumerate() {
        let (Some(date), Some(amount)) = (parse_date(&r.date), parse_amount(&r.amount)) else {
            log::warn!(
                "{}: skipping transaction {} with unreadable date {:?} or amount {:?}",
                path.display(),
                i + 1,
                r.date,
                r.amount
            );
            continue;
        };
        records.push(TransactionRecord {
            transaction_id: non_empty(r.transaction_id),
            account_id: r.account_id,
            customer_id: r.customer_id,
            date,
            amount,
        });
    }
    Ok(store.insert_transactions(&records)?)
}

pub fn prior_cases(path: &Path, store: &RecordStore) -> Result<usize> {
    let cases: Vec<PriorCase> = read_rows::<CaseRow>(path)?
        .into_iter()
        .map(|r| PriorCase {
            case_id: r.case_id,
            customer_id: r.customer_id,
            account_ids: split_list(r.account_ids),
            transaction_ids: split_list(r.transaction_ids),
            disposition_reason: r.disposition_reason.unwrap_or_default(),
            tier_closed: non_empty(r.tier_closed),
        })
        .collect();
    Ok(store.insert_prior_cases(&cases)?)
}
