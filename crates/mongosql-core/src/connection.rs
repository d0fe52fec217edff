//! Connection trait

use crate::{ResultSet, Result, SqlDialect};
use async_trait::async_trait;

/// An established MongoSQL connection
///
/// A connection runs one statement at a time. Concurrent callers should each
/// establish their own connection rather than share one.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "mongosql")
    fn driver_name(&self) -> &str;

    /// Database statements run against
    fn database(&self) -> &str;

    /// SQL dialect the server translates with
    fn dialect(&self) -> SqlDialect;

    /// Execute a query and collect its typed rows and column metadata
    async fn query(&self, sql: &str) -> Result<ResultSet>;

    /// Close the connection. Closing twice is a no-op.
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}
