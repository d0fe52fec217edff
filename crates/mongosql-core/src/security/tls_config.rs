//! TLS Configuration Types
//!
//! Trust material for the server certificate comes either from a CA file on
//! disk or from an inline PEM bundle. A bundle may hold several concatenated
//! certificates and every one of them is loaded into the trust store.

use crate::{MongoSqlError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const CERTIFICATE_BEGIN: &str = "-----BEGIN CERTIFICATE-----";

/// Where the CA certificates used to verify the server come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaSource {
    /// Path to a PEM file, possibly holding several certificates
    File(PathBuf),
    /// PEM text holding one or more concatenated certificates
    InlineBundle(String),
}

impl CaSource {
    /// Number of certificates in an inline bundle; `None` for files
    pub fn inline_certificate_count(&self) -> Option<usize> {
        match self {
            CaSource::File(_) => None,
            CaSource::InlineBundle(pem) => Some(pem.matches(CERTIFICATE_BEGIN).count()),
        }
    }
}

/// Configuration for TLS connections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Whether the connection is encrypted
    pub enabled: bool,
    /// CA trust material; platform roots are used when absent
    pub ca: Option<CaSource>,
    /// Skip server certificate validation entirely
    #[serde(default)]
    pub allow_invalid_certificates: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

impl TlsConfig {
    /// Create a disabled TLS configuration
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ca: None,
            allow_invalid_certificates: false,
        }
    }

    /// Create an enabled TLS configuration that trusts the platform roots
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::disabled()
        }
    }

    /// Trust the certificates in the given PEM file
    pub fn ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca = Some(CaSource::File(path.into()));
        self
    }

    /// Trust the certificates in an inline PEM bundle
    pub fn ca_bundle(mut self, pem: impl Into<String>) -> Self {
        self.ca = Some(CaSource::InlineBundle(pem.into()));
        self
    }

    pub fn allow_invalid_certificates(mut self, allow: bool) -> Self {
        self.allow_invalid_certificates = allow;
        self
    }

    pub fn has_trust_material(&self) -> bool {
        self.ca.is_some()
    }

    /// Validate the TLS configuration
    pub fn validate(&self) -> Result<()> {
        if !self.enabled && self.ca.is_some() {
            return Err(MongoSqlError::Configuration(
                "CA trust material provided but TLS is disabled".to_string(),
            ));
        }

        match &self.ca {
            Some(CaSource::File(path)) if path.as_os_str().is_empty() => Err(
                MongoSqlError::Configuration("CA file path cannot be empty".to_string()),
            ),
            Some(source @ CaSource::InlineBundle(_))
                if source.inline_certificate_count() == Some(0) =>
            {
                Err(MongoSqlError::Configuration(
                    "CA bundle contains no certificates".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests;
