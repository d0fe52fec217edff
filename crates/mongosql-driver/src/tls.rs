//! TLS trust and client identity material
//!
//! Builds the `mongodb` TLS options for a connection attempt. CA bundles
//! given inline and decrypted X.509 identities are written to private
//! temporary files, because the driver only reads TLS material from disk.
//! Those files live exactly as long as the [`TlsMaterial`] that owns them.

use crate::credentials::{ClientIdentity, CredentialError};
use mongodb::options::{Tls, TlsOptions};
use mongosql_core::{CaSource, MongoSqlError, TlsConfig};
use openssl::error::ErrorStack;
use openssl::x509::X509;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Error types for TLS material
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    /// Failed to read the CA file
    #[error("Failed to load CA certificate from {path}: {source}")]
    CaFileLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The CA material parsed but held no certificate
    #[error("No certificates found in {origin}")]
    NoCertificates { origin: String },

    /// The CA material is not valid PEM
    #[error("Invalid CA certificates in {origin}: {source}")]
    InvalidCertificates { origin: String, source: ErrorStack },

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("Failed to write TLS material: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TlsError> for MongoSqlError {
    fn from(err: TlsError) -> Self {
        match err {
            TlsError::Credential(err) => err.into(),
            TlsError::Io(err) => MongoSqlError::Io(err),
            other => MongoSqlError::Configuration(other.to_string()),
        }
    }
}

/// Parse every certificate in a PEM bundle
pub fn load_ca_certificates(pem: &[u8], origin: &str) -> Result<Vec<X509>, TlsError> {
    let certificates = X509::stack_from_pem(pem).map_err(|source| TlsError::InvalidCertificates {
        origin: origin.to_string(),
        source,
    })?;
    if certificates.is_empty() {
        return Err(TlsError::NoCertificates {
            origin: origin.to_string(),
        });
    }
    Ok(certificates)
}

/// TLS options plus the temporary files they point at
#[derive(Debug)]
pub struct TlsMaterial {
    tls: Tls,
    ca_certificates: usize,
    ca_file: Option<NamedTempFile>,
    identity_file: Option<NamedTempFile>,
}

impl TlsMaterial {
    /// Resolve trust and identity material for one connection attempt
    pub fn build(
        config: &TlsConfig,
        identity: Option<&ClientIdentity>,
    ) -> Result<Self, TlsError> {
        if !config.enabled {
            debug!("TLS disabled");
            return Ok(Self {
                tls: Tls::Disabled,
                ca_certificates: 0,
                ca_file: None,
                identity_file: None,
            });
        }

        let mut options = TlsOptions::default();
        let mut ca_file = None;
        let mut ca_certificates = 0;

        match &config.ca {
            Some(CaSource::File(path)) => {
                ca_certificates = count_file_certificates(path)?;
                debug!(path = %path.display(), ca_certificates, "using CA file");
                options.ca_file_path = Some(path.clone());
            }
            Some(CaSource::InlineBundle(bundle)) => {
                ca_certificates = load_ca_certificates(bundle.as_bytes(), "inline CA bundle")?.len();
                let file = write_temp("mongosql-ca-", bundle.as_bytes())?;
                debug!(ca_certificates, "using inline CA bundle");
                options.ca_file_path = Some(file.path().to_path_buf());
                ca_file = Some(file);
            }
            None => debug!("no CA material, using platform roots"),
        }

        let identity_file = identity.map(ClientIdentity::write_temp).transpose()?;
        if let Some(file) = &identity_file {
            options.cert_key_file_path = Some(file.path().to_path_buf());
        }

        if config.allow_invalid_certificates {
            warn!("server certificate validation disabled");
            options.allow_invalid_certificates = Some(true);
        }

        info!(
            ca_certificates,
            client_certificate = identity_file.is_some(),
            "TLS material prepared"
        );

        Ok(Self {
            tls: Tls::Enabled(options),
            ca_certificates,
            ca_file,
            identity_file,
        })
    }

    /// TLS setting for `ClientOptions`
    pub fn tls(&self) -> Tls {
        self.tls.clone()
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.tls, Tls::Enabled(_))
    }

    /// Number of trusted CA certificates loaded from configured material
    pub fn ca_certificate_count(&self) -> usize {
        self.ca_certificates
    }

    /// Paths of the temporary files backing this material
    pub fn temp_paths(&self) -> Vec<&Path> {
        self.ca_file
            .iter()
            .chain(self.identity_file.iter())
            .map(NamedTempFile::path)
            .collect()
    }
}

fn count_file_certificates(path: &Path) -> Result<usize, TlsError> {
    let pem = std::fs::read(path).map_err(|source| TlsError::CaFileLoad {
        path: path.to_path_buf(),
        source,
    })?;
    load_ca_certificates(&pem, &path.display().to_string()).map(|certs| certs.len())
}

fn write_temp(prefix: &str, contents: &[u8]) -> Result<NamedTempFile, TlsError> {
    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(".pem")
        .tempfile()?;
    file.write_all(contents)?;
    file.flush()?;
    Ok(file)
}
