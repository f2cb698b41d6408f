//! SQLite record store: schema, lookups, read-only access, missing files.

use triage_core::{
    aggregator::aggregate,
    case_ref::parse_case_reference,
    config::LimitsConfig,
    error::{SourceError, TriageResult},
    records::{CustomerSource, PriorCaseSource, RecordSources, TransactionSource},
    store::RecordStore,
    warning::{DataCategory, Warning},
};

mod common;
use common::{prior, profile, txn, SCENARIO_REFERENCE};

fn seeded(store: &RecordStore) -> TriageResult<()> {
    store.migrate()?;
    store.insert_customers(&[
        profile("CUST9051", "Dana Whitfield", &["ACC212", "ACC223"]),
        profile("CUST0001", "Someone Else", &["ACC999"]),
    ])?;
    store.insert_transactions(&[
        txn("T1", "ACC212", "CUST9051", "2024-01-05", 2_150.0),
        txn("T2", "ACC223", "CUST9051", "2024-02-05", 2_190.0),
        txn("", "ACC212", "CUST7777", "2024-02-10", 75.0),
        txn("X1", "ACC999", "CUST0001", "2024-03-01", 50_000.0),
    ])?;
    store.insert_prior_cases(&[
        prior("CA7248", "CUST9051", &["ACC212"]),
        prior("CA9999", "CUST0001", &["ACC999"]),
    ])?;
    Ok(())
}

#[test]
fn migrate_is_idempotent() -> TriageResult<()> {
    let store = RecordStore::in_memory()?;
    store.migrate()?;
    store.migrate()?;
    assert_eq!(store.counts()?, (0, 0, 0));
    Ok(())
}

#[test]
fn customer_lookup_round_trips_profile() -> TriageResult<()> {
    let store = RecordStore::in_memory()?;
    seeded(&store)?;
    let rows = store.customers_by_id("CUST9051")?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0], profile("CUST9051", "Dana Whitfield", &["ACC212", "ACC223"]));
    assert!(store.customers_by_id("CUST-NONE")?.is_empty());
    Ok(())
}

/// Customer id OR account membership, in insertion order.
#[test]
fn transaction_lookup_matches_customer_or_account() -> TriageResult<()> {
    let store = RecordStore::in_memory()?;
    seeded(&store)?;
    let rows = store.transactions_for("CUST9051", &["ACC212".into()])?;
    let amounts: Vec<f64> = rows.iter().map(|t| t.amount).collect();
    assert_eq!(amounts, vec![2_150.0, 2_190.0, 75.0]);
    assert_eq!(rows[0].date, common::date("2024-01-05"));
    assert_eq!(rows[2].transaction_id, None);

    let only_customer = store.transactions_for("CUST9051", &[])?;
    assert_eq!(only_customer.len(), 2);
    Ok(())
}

#[test]
fn prior_case_lookup_by_ids_and_customer() -> TriageResult<()> {
    let store = RecordStore::in_memory()?;
    seeded(&store)?;
    let by_id = store.cases_by_ids(&["CA9999".into(), "CA7248".into()])?;
    assert_eq!(by_id.len(), 2);
    assert_eq!(by_id[0].case_id, "CA7248", "insertion order, not argument order");
    assert_eq!(by_id[0].account_ids, vec!["ACC212"]);

    assert!(store.cases_by_ids(&[])?.is_empty());
    assert_eq!(store.cases_for_customer("CUST0001")?[0].case_id, "CA9999");
    Ok(())
}

/// A file written by import can be reopened read-only and used as all
/// three sources at once.
#[test]
fn read_only_file_store_serves_aggregation() -> TriageResult<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("records.db");
    let path = path.to_str().unwrap();
    seeded(&RecordStore::open(path)?)?;

    let open = || RecordStore::open_read_only(path, "records").unwrap();
    let sources = RecordSources::new(Box::new(open()), Box::new(open()), Box::new(open()));
    let reference = parse_case_reference(SCENARIO_REFERENCE)?;
    let agg = aggregate(&reference, &sources, &LimitsConfig::default());

    assert_eq!(agg.context.transactions.len(), 3);
    assert!(agg.context.transactions.iter().all(|t| t.account_id != "ACC999"));
    assert_eq!(agg.context.prior_cases.len(), 1);
    assert!(agg.warnings.is_empty(), "unexpected warnings: {:?}", agg.warnings);
    Ok(())
}

#[test]
fn missing_file_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.db");
    let err = RecordStore::open_read_only(path.to_str().unwrap(), "transaction")
        .err()
        .expect("opening a missing file read-only must fail");
    assert!(matches!(err, SourceError::Unavailable { source_name: "transaction", .. }));
}

/// A database without the expected tables fails at query time and is
/// reported by the aggregator as an unavailable category.
#[test]
fn schema_less_database_degrades_to_warning() -> TriageResult<()> {
    let seeded_store = RecordStore::in_memory()?;
    seeded(&seeded_store)?;
    let bare = RecordStore::in_memory()?;

    let sources = RecordSources::new(
        Box::new(seeded_store),
        Box::new(bare),
        Box::new(RecordStore::in_memory()?),
    );
    let reference = parse_case_reference(SCENARIO_REFERENCE)?;
    let agg = aggregate(&reference, &sources, &LimitsConfig::default());

    assert!(agg.context.profile.is_some());
    assert!(agg.warnings.iter().any(|w| matches!(
        w,
        Warning::SourceUnavailable { category: DataCategory::Transactions, .. }
    )));
    assert!(agg.warnings.iter().any(|w| matches!(
        w,
        Warning::SourceUnavailable { category: DataCategory::PriorCases, .. }
    )));
    Ok(())
}
