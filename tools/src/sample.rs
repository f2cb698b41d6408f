//! Sample case reference and record data for trying the tool end to end.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use std::path::{Path, PathBuf};
use triage_core::{
    records::{CustomerProfile, PriorCase, TransactionRecord},
    store::RecordStore,
};

pub const SAMPLE_CASE: &str = "\
Case ID: CA6373
Name: Dana Whitfield
CustID: CUST9051
Accounts: ACC212,ACC223
Transactions: TX9051-031,TX9051-032
Previous Cases: CA7248
";

/// Write `case_input.txt` into `input_dir`. Returns its path.
pub fn write_case_file(input_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(input_dir)
        .with_context(|| format!("cannot create {}", input_dir.display()))?;
    let path = input_dir.join("case_input.txt");
    std::fs::write(&path, SAMPLE_CASE)
        .with_context(|| format!("cannot write {}", path.display()))?;
    Ok(path)
}

/// Seed a records database matching the sample case. Existing files are
/// left alone; returns false in that case.
pub fn seed_records(db_path: &str) -> Result<bool> {
    if Path::new(db_path).exists() {
        return Ok(false);
    }
    if let Some(parent) = Path::new(db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = RecordStore::open(db_path)?;
    store.migrate()?;

    store.insert_customers(&[CustomerProfile {
        customer_id: "CUST9051".into(),
        name: "Dana Whitfield".into(),
        accounts: vec!["ACC212".into(), "ACC223".into()],
        employer: Some("Harbour Logistics Ltd".into()),
        location: Some("Leeds".into()),
        occupation: Some("Warehouse supervisor".into()),
        age: Some(38),
    }])?;

    store.insert_transactions(&sample_transactions())?;

    store.insert_prior_cases(&[PriorCase {
        case_id: "CA7248".into(),
        customer_id: "CUST9051".into(),
        account_ids: vec!["ACC212".into()],
        transaction_ids: vec!["TX9051-007".into()],
        disposition_reason: "Cash deposits explained by documented vehicle sale".into(),
        tier_closed: Some("2".into()),
    }])?;
    Ok(true)
}

/// Thirty months of modest salary-like credits, then two large round
/// cash deposits in the final month.
fn sample_transactions() -> Vec<TransactionRecord> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 15).unwrap_or_default();
    let mut out: Vec<TransactionRecord> = (0..30)
        .map(|i| TransactionRecord {
            transaction_id: Some(format!("TX9051-{:03}", i + 1)),
            account_id: if i % 3 == 0 { "ACC223" } else { "ACC212" }.into(),
            customer_id: "CUST9051".into(),
            date: start + Duration::days(30 * i),
            amount: 2_150.0 + (i % 5) as f64 * 37.5,
        })
        .collect();
    let last = start + Duration::days(30 * 30);
    for (n, amount) in [(31, 9_500.0), (32, 9_800.0)] {
        out.push(TransactionRecord {
            transaction_id: Some(format!("TX9051-{n:03}")),
            account_id: "ACC223".into(),
            customer_id: "CUST9051".into(),
            date: last + Duration::days(n - 31),
            amount,
        });
    }
    out
}
