//! Data-driven conformance table run on a bounded worker pool.
//!
//! Each fixture entry becomes an independent case. A worker establishes
//! its own connection, runs the case, and closes the connection before its
//! permit is released, so no connection is ever shared between cases.

use crate::fixtures::{FixtureLoadError, TestEntry, load_fixtures};
use crate::report::RunReport;
use crate::runner::{TestFailure, TestOutcome, run};
use mongosql_core::{ConnectionConfig, ConnectionResult, Establisher};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Fixture entries plus the connection settings every case starts from
#[derive(Debug, Clone)]
pub struct ConformanceTable {
    entries: Vec<TestEntry>,
    base: ConnectionConfig,
}

impl ConformanceTable {
    pub fn new(entries: Vec<TestEntry>, base: ConnectionConfig) -> Self {
        Self { entries, base }
    }

    /// Load every fixture under `dir` once
    pub fn load(dir: impl AsRef<Path>, base: ConnectionConfig) -> Result<Self, FixtureLoadError> {
        let entries = load_fixtures(dir).collect()?;
        tracing::info!(entries = entries.len(), "loaded conformance fixtures");
        Ok(Self::new(entries, base))
    }

    pub fn entries(&self) -> &[TestEntry] {
        &self.entries
    }

    /// Connection settings for one case: the base config on the entry's database
    pub fn config_for(&self, entry: &TestEntry) -> ConnectionConfig {
        let mut config = self.base.clone();
        if !entry.db.is_empty() {
            config.database = entry.db.clone();
        }
        config
    }

    /// Run every case with at most `pool_size` in flight
    ///
    /// Skipped entries are recorded without being executed. A case whose
    /// connection cannot be established fails on its own; the others still
    /// run. The report lists cases in fixture order.
    pub async fn run_all(&self, establisher: Arc<dyn Establisher>, pool_size: usize) -> RunReport {
        let pool_size = pool_size.max(1);
        let semaphore = Arc::new(Semaphore::new(pool_size));
        let mut outcomes: Vec<Option<TestOutcome>> = vec![None; self.entries.len()];
        let mut workers = JoinSet::new();

        for (index, entry) in self.entries.iter().enumerate() {
            if let Some(reason) = entry.skip_reason() {
                tracing::debug!(description = %entry.description, reason, "skipping");
                outcomes[index] = Some(TestOutcome::Skipped(reason.to_string()));
                continue;
            }

            let entry = entry.clone();
            let config = self.config_for(&entry);
            let establisher = establisher.clone();
            let semaphore = semaphore.clone();

            workers.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (
                        index,
                        TestOutcome::Failed(TestFailure::Aborted("worker pool closed".to_string())),
                    );
                };
                (index, run_case(&entry, &config, establisher.as_ref()).await)
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(e) => tracing::warn!(error = %e, "conformance worker did not finish"),
            }
        }

        let mut report = RunReport::new();
        for (entry, outcome) in self.entries.iter().zip(outcomes) {
            let outcome = outcome.unwrap_or_else(|| {
                TestOutcome::Failed(TestFailure::Aborted("worker did not report".to_string()))
            });
            report.record(entry.description.clone(), outcome);
        }

        tracing::info!(
            passed = report.passed(),
            failed = report.failed(),
            skipped = report.skipped(),
            pool_size,
            "conformance run complete"
        );
        report
    }
}

async fn run_case(
    entry: &TestEntry,
    config: &ConnectionConfig,
    establisher: &dyn Establisher,
) -> TestOutcome {
    let conn = match establisher.establish(config).await {
        ConnectionResult::Established(conn) => conn,
        ConnectionResult::Failed(err) => {
            tracing::warn!(description = %entry.description, error = %err, "could not connect");
            return TestOutcome::Failed(TestFailure::ConnectionFailed(err));
        }
    };

    let outcome = run(entry, conn.as_ref()).await;
    if let Err(e) = conn.close().await {
        tracing::warn!(description = %entry.description, error = %e, "failed to close connection");
    }
    outcome
}
