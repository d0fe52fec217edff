//! Establisher trait and connection outcomes

use crate::{ConnectError, Connection, ConnectionConfig, ErrorKind, MongoSqlError};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Outcome of a connection attempt
pub enum ConnectionResult {
    Established(Arc<dyn Connection>),
    Failed(ConnectError),
}

impl ConnectionResult {
    pub fn is_established(&self) -> bool {
        matches!(self, ConnectionResult::Established(_))
    }

    /// Failure kind, if the attempt failed
    pub fn kind(&self) -> Option<ErrorKind> {
        self.error().map(|e| e.kind)
    }

    pub fn error(&self) -> Option<&ConnectError> {
        match self {
            ConnectionResult::Established(_) => None,
            ConnectionResult::Failed(err) => Some(err),
        }
    }

    pub fn into_result(self) -> std::result::Result<Arc<dyn Connection>, ConnectError> {
        match self {
            ConnectionResult::Established(conn) => Ok(conn),
            ConnectionResult::Failed(err) => Err(err),
        }
    }
}

impl From<crate::Result<Arc<dyn Connection>>> for ConnectionResult {
    fn from(result: crate::Result<Arc<dyn Connection>>) -> Self {
        match result {
            Ok(conn) => ConnectionResult::Established(conn),
            Err(err) => ConnectionResult::Failed(MongoSqlError::into_connect_error(err)),
        }
    }
}

impl fmt::Debug for ConnectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionResult::Established(conn) => f
                .debug_tuple("Established")
                .field(&conn.driver_name())
                .finish(),
            ConnectionResult::Failed(err) => f.debug_tuple("Failed").field(err).finish(),
        }
    }
}

/// Something that can turn a [`ConnectionConfig`] into a live connection
#[async_trait]
pub trait Establisher: Send + Sync {
    /// Get the establisher identifier (e.g., "mongosql")
    fn id(&self) -> &'static str;

    /// Open a connection. Every partially acquired resource is released
    /// before a `Failed` result is returned.
    async fn establish(&self, config: &ConnectionConfig) -> ConnectionResult;
}
