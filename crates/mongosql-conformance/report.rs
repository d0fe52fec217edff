//! Aggregate results of a conformance run.

use crate::runner::{TestFailure, TestOutcome};
use std::fmt;

/// Outcome of one named case
#[derive(Debug, Clone, PartialEq)]
pub struct CaseResult {
    pub description: String,
    pub outcome: TestOutcome,
}

/// Results of every case in a run, in fixture order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    cases: Vec<CaseResult>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, description: impl Into<String>, outcome: TestOutcome) {
        self.cases.push(CaseResult {
            description: description.into(),
            outcome,
        });
    }

    pub fn cases(&self) -> &[CaseResult] {
        &self.cases
    }

    pub fn passed(&self) -> usize {
        self.cases.iter().filter(|c| c.outcome.is_passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    pub fn skipped(&self) -> usize {
        self.skips().count()
    }

    /// Description and detail of every failed case
    pub fn failures(&self) -> impl Iterator<Item = (&str, &TestFailure)> {
        self.cases.iter().filter_map(|c| match &c.outcome {
            TestOutcome::Failed(failure) => Some((c.description.as_str(), failure)),
            _ => None,
        })
    }

    /// Description and reason of every skipped case
    pub fn skips(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cases.iter().filter_map(|c| match &c.outcome {
            TestOutcome::Skipped(reason) => Some((c.description.as_str(), reason.as_str())),
            _ => None,
        })
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} passed, {} failed, {} skipped",
            self.passed(),
            self.failed(),
            self.skipped()
        )?;
        for (description, failure) in self.failures() {
            writeln!(f, "FAILED {}: {}", description, failure)?;
            if let Some(chain) = failure.chain() {
                writeln!(f, "  caused by: {}", chain)?;
            }
        }
        for (description, reason) in self.skips() {
            writeln!(f, "SKIPPED {}: {}", description, reason)?;
        }
        Ok(())
    }
}
