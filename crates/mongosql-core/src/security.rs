//! Security-related configuration types for MongoSQL connections
//!
//! This module provides the TLS trust settings used when establishing
//! connections, including CA files and inline CA bundles.

mod tls_config;

pub use tls_config::*;
