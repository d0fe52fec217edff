//! Shared setup for the conformance suites.

use mongosql_core::{ConnectionConfig, ConnectionResult};
use mongosql_driver::establish;

use crate::env::{DEFAULT_TEST_DB, EnvError, EnvSource};

/// Initialize logging for tests if not already initialized
///
/// `RUST_LOG` wins when set; otherwise the driver and runner log at debug.
pub fn initialize_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new("mongosql_driver=debug,mongosql_conformance=debug")
        });
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

/// Establish against the local Atlas Data Federation instance
pub async fn adf_connection(env: &EnvSource, db: Option<&str>) -> Result<ConnectionResult, EnvError> {
    initialize_logging();
    let (uri, props) = env.adf_connection(db.unwrap_or(DEFAULT_TEST_DB))?;
    Ok(establish(&uri, &props).await)
}

/// Base config for fixture tables run against Atlas Data Federation
pub fn adf_table_config(env: &EnvSource) -> anyhow::Result<ConnectionConfig> {
    use anyhow::Context;

    let (uri, props) = env.adf_connection(DEFAULT_TEST_DB)?;
    ConnectionConfig::from_uri(&uri, &props)
        .with_context(|| format!("invalid Atlas Data Federation settings for {}", uri))
}
