//! Conformance table tests
//!
//! Tests for the data-driven table: bounded concurrency, skip handling,
//! per-case connection isolation, and report ordering.

use crate::fixtures::TestEntry;
use crate::mock::{MockEstablisher, Reply};
use crate::pool::ConformanceTable;
use crate::runner::{TestFailure, TestOutcome};
use mongosql_core::{
    BsonType, ColumnMeta, ConnectionConfig, Discovery, ErrorKind, HostAddress, ResultSet, Row,
    TypedCell,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

fn base_config() -> ConnectionConfig {
    ConnectionConfig::new(
        "integration_test",
        Discovery::Direct {
            hosts: vec![HostAddress::new("localhost", None)],
        },
    )
}

fn select_one() -> Reply {
    Reply::Rows(ResultSet::new(
        vec![ColumnMeta::new("", "a", BsonType::Int)],
        vec![Row::from(vec![TypedCell::Int32(1)])],
    ))
}

fn passing_entry(description: &str) -> TestEntry {
    let mut entry = TestEntry::new(description, "integration_test", "SELECT 1 AS a");
    entry.expected_result = Some(vec![vec![serde_json::json!(1)]]);
    entry
}

#[tokio::test]
async fn test_all_cases_pass() {
    let entries = (0..5).map(|i| passing_entry(&format!("case {}", i))).collect();
    let table = ConformanceTable::new(entries, base_config());
    let establisher = Arc::new(MockEstablisher::new().reply("SELECT 1 AS a", select_one()));

    let report = table.run_all(establisher.clone(), 2).await;

    assert_eq!(report.passed(), 5);
    assert!(report.is_success());
    assert_eq!(establisher.tracker.established.load(Ordering::SeqCst), 5);
    assert_eq!(establisher.tracker.closed.load(Ordering::SeqCst), 5);
}

#[rstest]
#[case::serial(1)]
#[case::pair(2)]
#[case::wide(4)]
#[tokio::test]
async fn test_pool_bounds_concurrency(#[case] pool_size: usize) {
    let entries = (0..8).map(|i| passing_entry(&format!("case {}", i))).collect();
    let table = ConformanceTable::new(entries, base_config());
    let establisher = Arc::new(
        MockEstablisher::new()
            .reply("SELECT 1 AS a", select_one())
            .delay(Duration::from_millis(20)),
    );

    let report = table.run_all(establisher.clone(), pool_size).await;

    assert_eq!(report.passed(), 8);
    let peak = establisher.tracker.peak.load(Ordering::SeqCst);
    assert!(peak >= 1 && peak <= pool_size, "peak {} exceeds pool size {}", peak, pool_size);
}

#[tokio::test]
async fn test_zero_pool_size_is_clamped() {
    let table = ConformanceTable::new(vec![passing_entry("only")], base_config());
    let establisher = Arc::new(MockEstablisher::new().reply("SELECT 1 AS a", select_one()));

    let report = table.run_all(establisher, 0).await;
    assert_eq!(report.passed(), 1);
}

#[tokio::test]
async fn test_skipped_entries_never_run() {
    let mut skipped = passing_entry("known gap");
    skipped.skip_reason = Some("collection not loaded".to_string());
    let mut meta = TestEntry::new("catalogs", "integration_test", "");
    meta.sql = None;
    meta.meta_function = Some(vec![serde_json::json!("getCatalogs")]);

    let table = ConformanceTable::new(vec![skipped, passing_entry("runs"), meta], base_config());
    let establisher = Arc::new(MockEstablisher::new().reply("SELECT 1 AS a", select_one()));

    let report = table.run_all(establisher.clone(), 4).await;

    assert_eq!(report.passed(), 1);
    assert_eq!(report.failed(), 0);
    assert_eq!(report.skipped(), 2);
    assert_eq!(establisher.tracker.established.load(Ordering::SeqCst), 1);
    assert_eq!(establisher.tracker.queries.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_connection_failure_fails_only_its_case() {
    let mut refused = passing_entry("other database");
    refused.db = "locked".to_string();

    let table = ConformanceTable::new(
        vec![passing_entry("first"), refused, passing_entry("last")],
        base_config(),
    );
    let establisher = Arc::new(
        MockEstablisher::new()
            .reply("SELECT 1 AS a", select_one())
            .refuse("locked"),
    );

    let report = table.run_all(establisher, 2).await;

    assert_eq!(report.passed(), 2);
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "other database");
    assert!(matches!(
        failures[0].1,
        TestFailure::ConnectionFailed(err) if err.kind == ErrorKind::AuthenticationRejected
    ));
}

#[tokio::test]
async fn test_each_case_connects_to_its_database() {
    let mut other = passing_entry("other");
    other.db = "other_db".to_string();
    let mut unnamed = passing_entry("unnamed");
    unnamed.db = String::new();

    let table = ConformanceTable::new(vec![passing_entry("default"), other, unnamed], base_config());
    let establisher = Arc::new(MockEstablisher::new().reply("SELECT 1 AS a", select_one()));

    table.run_all(establisher.clone(), 1).await;

    let mut databases = establisher.tracker.databases.lock().unwrap().clone();
    databases.sort();
    assert_eq!(
        databases,
        vec!["integration_test", "integration_test", "other_db"]
    );
}

#[tokio::test]
async fn test_report_keeps_fixture_order() {
    let mut failing = passing_entry("b fails");
    failing.expected_result = Some(vec![vec![serde_json::json!(2)]]);
    let entries = vec![passing_entry("a passes"), failing, passing_entry("c passes")];

    let table = ConformanceTable::new(entries, base_config());
    let establisher = Arc::new(
        MockEstablisher::new()
            .reply("SELECT 1 AS a", select_one())
            .delay(Duration::from_millis(5)),
    );

    let report = table.run_all(establisher, 3).await;

    let order: Vec<&str> = report.cases().iter().map(|c| c.description.as_str()).collect();
    assert_eq!(order, vec!["a passes", "b fails", "c passes"]);
    assert!(matches!(report.cases()[1].outcome, TestOutcome::Failed(_)));
    assert!(report.to_string().contains("FAILED b fails: cell mismatch at row 0, column 0"));
}

#[tokio::test]
async fn test_load_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("select.yml"),
        "tests:\n  - description: literal\n    db: integration_test\n    sql: SELECT 1 AS a\n    expected_result:\n      - [1]\n",
    )
    .unwrap();

    let table = ConformanceTable::load(dir.path(), base_config()).unwrap();
    assert_eq!(table.entries().len(), 1);

    let establisher = Arc::new(MockEstablisher::new().reply("SELECT 1 AS a", select_one()));
    assert!(table.run_all(establisher, 1).await.is_success());
}
