//! MongoSQL driver - Connection establisher over the `mongodb` crate
//!
//! This crate turns a [`mongosql_core::ConnectionConfig`] into a live
//! connection that runs SQL through the server-side `$sql` aggregation
//! stage.
//!
//! # Features
//!
//! - PASSWORD, X.509, GSSAPI and NONE authentication
//! - Direct and SRV discovery
//! - X.509 material from PEM files or inline text, PKCS#1 or PKCS#8,
//!   encrypted or not
//! - CA trust from a file or an inline bundle
//! - Cluster detection, rejecting deployments that cannot run SQL
//! - Failures classified with their full cause chain
//!
//! # Example
//!
//! ```ignore
//! use mongosql_core::ConnectionProperties;
//! use mongosql_driver::establish;
//!
//! let props = ConnectionProperties::new().with("password", "secret");
//! let result = establish("mongodb://reporter@localhost:27017/sales", &props).await;
//! let conn = result.into_result()?;
//! let rows = conn.query("SELECT * FROM orders").await?;
//! ```

pub mod cells;
#[cfg(test)]
mod cells_tests;
pub mod classify;
#[cfg(test)]
mod classify_tests;
pub mod cluster;
#[cfg(test)]
mod cluster_tests;
mod connection;
pub mod credentials;
#[cfg(test)]
mod credentials_tests;
mod driver;
#[cfg(test)]
mod driver_tests;
pub mod jaas;
#[cfg(test)]
mod jaas_tests;
pub mod schema;
#[cfg(test)]
mod schema_tests;
#[cfg(test)]
mod test_support;
pub mod tls;

pub use cluster::ClusterType;
pub use connection::*;
pub use credentials::{ClientIdentity, CredentialError};
pub use driver::*;
pub use schema::ResultSchema;
pub use tls::{TlsError, TlsMaterial};
