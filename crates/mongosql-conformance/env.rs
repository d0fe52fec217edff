//! Environment-derived configuration for the live suites.
//!
//! Variables are read once into an [`EnvSource`], so the helpers below can
//! be exercised with a fixed set of values instead of the process
//! environment. A missing required variable is an [`EnvError`], which the
//! suites propagate as a setup failure rather than a test assertion.

use mongosql_core::{ConnectionProperties, ErrorKind};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub const ADF_TEST_LOCAL_HOST: &str = "ADF_TEST_LOCAL_HOST";
pub const ADF_TEST_LOCAL_USER: &str = "ADF_TEST_LOCAL_USER";
pub const ADF_TEST_LOCAL_PWD: &str = "ADF_TEST_LOCAL_PWD";
pub const ADF_TEST_LOCAL_AUTH_DB: &str = "ADF_TEST_LOCAL_AUTH_DB";
pub const SRV_TEST_HOST: &str = "SRV_TEST_HOST";
pub const SRV_TEST_USER: &str = "SRV_TEST_USER";
pub const SRV_TEST_PWD: &str = "SRV_TEST_PWD";
pub const SRV_TEST_AUTH_DB: &str = "SRV_TEST_AUTH_DB";
pub const SRV_TEST_EXPECT: &str = "SRV_TEST_EXPECT";
pub const LOCAL_MDB_PORT_ENT: &str = "LOCAL_MDB_PORT_ENT";
pub const LOCAL_MDB_USER: &str = "LOCAL_MDB_USER";
pub const LOCAL_MDB_PWD: &str = "LOCAL_MDB_PWD";
pub const MONGODB_URI: &str = "MONGODB_URI";
pub const X509_PEM_PATH: &str = "X509_PEM_PATH";
pub const X509_PEM_CONTENTS: &str = "X509_PEM_CONTENTS";
pub const X509_PASSPHRASE: &str = "X509_PASSPHRASE";
pub const X509_TLS_CA_FILE: &str = "X509_TLS_CA_FILE";
pub const JAAS_CONFIG_PATH: &str = "JAAS_CONFIG_PATH";
pub const MONGOSQL_FIXTURE_DIR: &str = "MONGOSQL_FIXTURE_DIR";

/// Host used when `ADF_TEST_LOCAL_HOST` is not set
pub const DEFAULT_ADF_HOST: &str = "mongodb://localhost";

/// Database used by the fixture suites when an entry names none
pub const DEFAULT_TEST_DB: &str = "integration_test";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvError {
    #[error("environment variable {0} must be set")]
    Missing(String),

    #[error("environment variable {name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
}

/// Expected outcome of establishing over SRV against a direct cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrvExpectation {
    Establishes,
    FailsWith(ErrorKind),
}

impl FromStr for SrvExpectation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "establishes" => Ok(SrvExpectation::Establishes),
            "timeout" => Ok(SrvExpectation::FailsWith(ErrorKind::Timeout)),
            "configuration_invalid" => {
                Ok(SrvExpectation::FailsWith(ErrorKind::ConfigurationInvalid))
            }
            "authentication_rejected" => {
                Ok(SrvExpectation::FailsWith(ErrorKind::AuthenticationRejected))
            }
            "feature_unsupported" => Ok(SrvExpectation::FailsWith(ErrorKind::FeatureUnsupported)),
            other => Err(format!("unknown SRV expectation '{}'", other)),
        }
    }
}

/// Snapshot of the variables the suites read
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    vars: BTreeMap<String, String>,
}

impl EnvSource {
    /// Snapshot the process environment
    pub fn process() -> Self {
        std::env::vars().collect()
    }

    /// Value of a variable, treating an empty value as unset
    pub fn optional(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn required(&self, name: &str) -> Result<&str, EnvError> {
        self.optional(name)
            .ok_or_else(|| EnvError::Missing(name.to_string()))
    }

    /// Fixture root, falling back to this crate's `fixtures` directory
    pub fn fixture_dir(&self) -> PathBuf {
        self.optional(MONGOSQL_FIXTURE_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures"))
    }

    /// URI and properties for the local Atlas Data Federation instance
    pub fn adf_connection(&self, db: &str) -> Result<(String, ConnectionProperties), EnvError> {
        let uri = self.optional(ADF_TEST_LOCAL_HOST).unwrap_or(DEFAULT_ADF_HOST);
        let props = ConnectionProperties::new()
            .with("user", self.required(ADF_TEST_LOCAL_USER)?)
            .with("password", self.required(ADF_TEST_LOCAL_PWD)?)
            .with("authSource", self.required(ADF_TEST_LOCAL_AUTH_DB)?)
            .with("database", db)
            .with("ssl", "false");
        Ok((uri.to_string(), props))
    }

    /// URI and properties for the SRV-discovered cluster
    pub fn srv_connection(&self, db: &str) -> Result<(String, ConnectionProperties), EnvError> {
        let uri = format!("mongodb+srv://{}/", self.required(SRV_TEST_HOST)?);
        let props = ConnectionProperties::new()
            .with("user", self.required(SRV_TEST_USER)?)
            .with("password", self.required(SRV_TEST_PWD)?)
            .with("authSource", self.required(SRV_TEST_AUTH_DB)?)
            .with("database", db);
        Ok((uri, props))
    }

    /// URI and properties for the local Enterprise server
    pub fn enterprise_connection(
        &self,
        db: &str,
    ) -> Result<(String, ConnectionProperties), EnvError> {
        let port = self.required(LOCAL_MDB_PORT_ENT)?;
        let port: u16 = port.parse().map_err(|e: std::num::ParseIntError| EnvError::Invalid {
            name: LOCAL_MDB_PORT_ENT.to_string(),
            value: port.to_string(),
            reason: e.to_string(),
        })?;
        let uri = format!("mongodb://localhost:{}/", port);
        let props = ConnectionProperties::new()
            .with("user", self.required(LOCAL_MDB_USER)?)
            .with("password", self.required(LOCAL_MDB_PWD)?)
            .with("database", db);
        Ok((uri, props))
    }

    /// Cluster URI for the X.509 and GSSAPI suites
    pub fn mongodb_uri(&self) -> Result<&str, EnvError> {
        self.required(MONGODB_URI)
    }

    pub fn srv_expectation(&self) -> Result<SrvExpectation, EnvError> {
        let raw = self.optional(SRV_TEST_EXPECT).unwrap_or("establishes");
        raw.parse().map_err(|reason| EnvError::Invalid {
            name: SRV_TEST_EXPECT.to_string(),
            value: raw.to_string(),
            reason,
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvSource {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
