//! MongoSQL Conformance Suite
//!
//! Declarative SQL conformance testing for MongoSQL connections. Fixture
//! files describe a statement and the result it must produce; the runner
//! replays them against connections from the establisher and reports every
//! difference with typed expected-vs-actual detail.
//!
//! # Architecture
//!
//! - **Fixtures**: YAML (or JSON) files under a directory tree, loaded lazily with `walkdir`
//! - **Typed comparison**: cells compare by BSON type, so `1` never matches `1.0`
//! - **Data-driven table**: one independent case per entry, run on a bounded worker pool
//! - **Environment-gated live suites**: ignored by default, enabled with `--ignored`
//!
//! # Usage
//!
//! ```bash
//! # Offline unit tests
//! cargo test -p mongosql-conformance
//!
//! # Live suites against a local Atlas Data Federation instance
//! export ADF_TEST_LOCAL_USER=... ADF_TEST_LOCAL_PWD=... ADF_TEST_LOCAL_AUTH_DB=admin
//! cargo test -p mongosql-conformance -- --ignored adf_tests
//!
//! # Refresh baselines from the live results
//! cargo test -p mongosql-conformance -- --ignored test_generate_baselines
//! ```

#![warn(clippy::all)]

pub mod baseline;
pub mod compare;
pub mod env;
pub mod fixtures;
pub mod pool;
pub mod report;
pub mod runner;
pub mod support;

pub use compare::Mismatch;
pub use fixtures::{FixtureLoadError, Fixtures, TestEntry, load_fixtures};
pub use pool::ConformanceTable;
pub use report::RunReport;
pub use runner::{TestFailure, TestOutcome, run};

#[cfg(test)]
mod mock;

#[cfg(test)]
mod runner_tests;

#[cfg(test)]
mod pool_tests;

#[cfg(test)]
mod connection_tests;

#[cfg(test)]
mod gssapi_tests;

#[cfg(test)]
mod adf_tests;
