//! Identity loader: canonicalization, multiplicity, layouts, and row skips.

use reach_core::{
    error::ReachError,
    identity_loader::{load_identity_file, read_identity, RawIdentityRow},
};
use std::path::Path;

fn load(table: &str) -> reach_core::identity_loader::IdentityAccounts {
    read_identity(table.as_bytes(), Path::new("identity.csv")).expect("identity table loads")
}

#[test]
fn composite_rows_collapse_to_counted_accounts() {
    let accounts = load("value_userId\nA_1\nA_2\nB_3\n");

    assert_eq!(accounts.len(), 2);
    assert_eq!(accounts.get("A").unwrap().occurrence_count, 2);
    assert_eq!(accounts.get("B").unwrap().occurrence_count, 1);
}

#[test]
fn occurrences_sum_to_accepted_rows() {
    let accounts = load("value_userId\nA_1\nA_2\n\"\"\nB_3\nC\n_x\nC_9_9\n");

    assert_eq!(accounts.stats.rows_accepted, 5);
    assert_eq!(accounts.stats.rows_skipped_empty, 2);
    assert_eq!(accounts.total_occurrences(), accounts.stats.rows_accepted);
    assert_eq!(accounts.get("C").unwrap().occurrence_count, 2);
}

#[test]
fn raw_layout_joins_value_and_user() {
    let accounts = load("_id,userId,value\n1,u1,acct9\n2,u2,acct9\n3,u3,acct4\n4,u4,\n");

    assert_eq!(accounts.get("acct9").unwrap().occurrence_count, 2);
    assert_eq!(accounts.get("acct4").unwrap().occurrence_count, 1);
    assert_eq!(accounts.stats.rows_skipped_empty, 1);
    assert_eq!(accounts.total_occurrences(), 3);
}

#[test]
fn raw_row_composite_token_is_value_then_user() {
    let row = RawIdentityRow {
        source_id: "65f0".into(),
        user_id: "u-1".into(),
        value: "acct".into(),
    };
    assert_eq!(row.composite_token(), "acct_u-1");
}

#[test]
fn wrong_column_count_is_malformed_not_fatal() {
    let accounts = load("_id,userId,value\n1,u1,A\n2,u2\n3,u3,B,extra\n4,u4,B\n");

    assert_eq!(accounts.stats.rows_read, 4);
    assert_eq!(accounts.stats.rows_malformed, 2);
    assert_eq!(accounts.len(), 2);
    assert_eq!(accounts.total_occurrences(), 2);
}

#[test]
fn header_without_identity_columns_is_rejected() {
    let err = read_identity("foo,bar\n1,2\n".as_bytes(), Path::new("bad.csv")).unwrap_err();
    assert!(
        matches!(err, ReachError::MissingColumn { ref column, .. } if column == "value_userId"),
        "unexpected error: {err}"
    );
}

#[test]
fn absent_file_is_source_missing() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_identity_file("DE", &dir.path().join("nope.csv")).unwrap_err();
    assert!(
        matches!(err, ReachError::SourceMissing { ref country, .. } if country == "DE"),
        "unexpected error: {err}"
    );
}

#[test]
fn header_only_file_yields_no_accounts() {
    let accounts = load("value_userId\n");
    assert!(accounts.is_empty());
    assert_eq!(accounts.stats.rows_read, 0);
}
