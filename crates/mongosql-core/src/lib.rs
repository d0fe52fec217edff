//! MongoSQL Core - Core abstractions for MongoSQL connections
//!
//! This crate provides the types shared by the connection establisher and
//! the conformance runner. It defines:
//!
//! - `ConnectionConfig` - Validated, per-mechanism connection configuration
//! - `ConnectionUri` - Direct and SRV connection string grammar
//! - `Establisher` / `Connection` - Traits for opening and using connections
//! - `CauseChain` - Searchable linked list of nested failures
//! - Common types like `TypedCell`, `ColumnMeta`, `ResultSet`, etc.

mod config;
mod connection;
mod driver;
mod error;
pub mod security;
mod types;
mod uri;

pub use config::*;
pub use connection::*;
pub use driver::*;
pub use error::*;
pub use security::*;
pub use types::*;
pub use uri::*;
