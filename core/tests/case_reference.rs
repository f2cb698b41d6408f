//! Case reference parser: label variants, list splitting, required fields.

use triage_core::{case_ref::parse_case_reference, error::ParseError};

mod common;
use common::SCENARIO_REFERENCE;

/// The single-line analyst format splits into separate pairs.
#[test]
fn one_line_reference_parses_every_pair() {
    let r = parse_case_reference(SCENARIO_REFERENCE).unwrap();
    assert_eq!(r.case_id, "CA6373");
    assert_eq!(r.customer_id, "CUST9051");
    assert_eq!(r.account_ids, vec!["ACC212", "ACC223"]);
    assert_eq!(r.prior_case_ids, vec!["CA7248"]);
    assert!(r.transaction_ids.is_empty());
    assert_eq!(r.customer_name, None);
}

/// Line-per-label input with alias spellings and mixed case.
#[test]
fn multi_line_reference_with_aliases() {
    let text = "\
case_id:   CASE-2025-001
Customer Name: John Smith
cust id: CUST9001
Account Numbers: ACC602; ACC372 | ACC590
TXN: TX001,TX002
Prior Cases: PREV-001, PREV-002
";
    let r = parse_case_reference(text).unwrap();
    assert_eq!(r.case_id, "CASE-2025-001");
    assert_eq!(r.customer_name.as_deref(), Some("John Smith"));
    assert_eq!(r.customer_id, "CUST9001");
    assert_eq!(r.account_ids, vec!["ACC602", "ACC372", "ACC590"]);
    assert_eq!(r.transaction_ids, vec!["TX001", "TX002"]);
    assert_eq!(r.prior_case_ids, vec!["PREV-001", "PREV-002"]);
}

/// Only the two identifiers are required; everything else defaults empty.
#[test]
fn optional_labels_may_be_absent() {
    let r = parse_case_reference("Case ID: CA1\nCustID: CUST1\n").unwrap();
    assert_eq!(r.case_id, "CA1");
    assert_eq!(r.customer_id, "CUST1");
    assert!(r.account_ids.is_empty());
    assert!(r.transaction_ids.is_empty());
    assert!(r.prior_case_ids.is_empty());
    assert!(r.customer_name.is_none());
}

#[test]
fn missing_case_id_is_a_parse_error() {
    let err = parse_case_reference("CustID: CUST1\nAccounts: ACC1").unwrap_err();
    assert_eq!(err, ParseError::MissingField { label: "Case ID" });
}

#[test]
fn missing_customer_id_is_a_parse_error() {
    let err = parse_case_reference("Case ID: CA1\nName: Jo").unwrap_err();
    assert_eq!(err, ParseError::MissingField { label: "CustID" });
}

#[test]
fn empty_or_blank_text_is_a_parse_error() {
    assert_eq!(parse_case_reference("").unwrap_err(), ParseError::Empty);
    assert_eq!(parse_case_reference("  \n\t\n").unwrap_err(), ParseError::Empty);
}

/// Placeholder values count as absent, including for required fields.
#[test]
fn placeholders_count_as_absent() {
    let r = parse_case_reference("Case ID: CA1\nCustID: CUST1\nAccounts: N/A\nPrevious Cases: none")
        .unwrap();
    assert!(r.account_ids.is_empty());
    assert!(r.prior_case_ids.is_empty());

    let err = parse_case_reference("Case ID: CA1\nCustID: null").unwrap_err();
    assert_eq!(err, ParseError::MissingField { label: "CustID" });
}

/// Single-valued labels keep their first value; list labels accumulate
/// without duplicates.
#[test]
fn repeated_labels_first_wins_lists_accumulate() {
    let text = "\
Case ID: CA1
Case ID: CA2
CustID: CUST1
Accounts: ACC1, ACC2
Accounts: ACC2, ACC3
";
    let r = parse_case_reference(text).unwrap();
    assert_eq!(r.case_id, "CA1");
    assert_eq!(r.account_ids, vec!["ACC1", "ACC2", "ACC3"]);
}

/// Free text and unknown labels are ignored rather than rejected.
#[test]
fn unrecognized_lines_are_ignored() {
    let text = "Alert raised by monitoring\nCase ID: CA1\nNotes: call back Tuesday\nCustID: CUST1";
    let r = parse_case_reference(text).unwrap();
    assert_eq!(r.case_id, "CA1");
    assert_eq!(r.customer_id, "CUST1");
}
