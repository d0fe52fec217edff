//! Execution of a single fixture entry against a live connection.

use crate::compare::{Mismatch, compare_metadata, compare_row_count, compare_rows};
use crate::fixtures::TestEntry;
use mongosql_core::{CauseChain, ConnectError, Connection, ErrorKind, MongoSqlError};
use thiserror::Error;

/// Why a case failed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TestFailure {
    /// The statement itself failed
    #[error("execution error ({kind}): {message}")]
    ExecutionError {
        kind: ErrorKind,
        message: String,
        chain: CauseChain,
    },

    /// No connection could be established for the case
    #[error("connection failed: {0}")]
    ConnectionFailed(ConnectError),

    #[error(transparent)]
    Mismatch(#[from] Mismatch),

    /// The entry itself cannot be run as written
    #[error("invalid fixture: {0}")]
    InvalidFixture(String),

    /// The worker running the case stopped before reporting
    #[error("aborted: {0}")]
    Aborted(String),
}

impl From<MongoSqlError> for TestFailure {
    fn from(err: MongoSqlError) -> Self {
        let ConnectError {
            kind,
            message,
            chain,
        } = err.into_connect_error();
        TestFailure::ExecutionError {
            kind,
            message,
            chain,
        }
    }
}

impl TestFailure {
    /// Cause chain of an execution or connection failure
    pub fn chain(&self) -> Option<&CauseChain> {
        match self {
            TestFailure::ExecutionError { chain, .. } => Some(chain),
            TestFailure::ConnectionFailed(err) => Some(&err.chain),
            _ => None,
        }
    }
}

/// Result of one fixture entry
#[derive(Debug, Clone, PartialEq)]
pub enum TestOutcome {
    Passed,
    Failed(TestFailure),
    Skipped(String),
}

impl TestOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, TestOutcome::Passed)
    }

    pub fn failure(&self) -> Option<&TestFailure> {
        match self {
            TestOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Run one entry and check its result
///
/// Checks run in order: execution, column metadata (when declared), row
/// count, then rows. The first failing check decides the outcome. Skipped
/// entries are filtered out before this is called.
#[tracing::instrument(skip_all, fields(description = %entry.description, db = %entry.db))]
pub async fn run(entry: &TestEntry, conn: &dyn Connection) -> TestOutcome {
    match check(entry, conn).await {
        Ok(()) => {
            tracing::debug!("passed");
            TestOutcome::Passed
        }
        Err(failure) => {
            tracing::debug!(%failure, "failed");
            TestOutcome::Failed(failure)
        }
    }
}

async fn check(entry: &TestEntry, conn: &dyn Connection) -> Result<(), TestFailure> {
    let sql = entry
        .sql
        .as_deref()
        .ok_or_else(|| TestFailure::InvalidFixture("entry has no sql statement".to_string()))?;
    let expected_rows = entry
        .expected_rows()
        .map_err(|e| TestFailure::InvalidFixture(e.to_string()))?;

    let result = conn.query(sql).await?;

    if entry.declares_metadata() {
        compare_metadata(entry, &result.columns)?;
    }
    compare_row_count(entry, result.row_count())?;
    if let Some(expected) = expected_rows {
        compare_rows(&expected, &result.rows, entry.is_ordered())?;
    }
    Ok(())
}
