//! X.509 client credential material
//!
//! Client certificates arrive either as a PEM file or inline through the
//! password field. Inline material may be raw PEM (often flattened onto one
//! line with escaped newlines) or a JSON envelope of the form
//! `{"pem": "...", "passphrase": "..."}`. Keys may be PKCS#1 or PKCS#8,
//! encrypted or not.
//!
//! The first private key and the first certificate found are used. The
//! decrypted pair is only ever written to a private temporary file that the
//! caller drops once the TLS layer has read it.

use mongosql_core::{CredentialSource, MongoSqlError};
use openssl::error::ErrorStack;
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::LazyLock;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

static PEM_BLOCK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)-----BEGIN ([A-Z0-9 ]+)-----.*?-----END [A-Z0-9 ]+-----").expect("valid regex")
});

static PEM_MARKER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-----(?:BEGIN|END) [A-Z0-9 ]+-----").expect("valid regex"));

static PEM_HEADER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(Proc-Type|DEK-Info):\s*(\S+)").expect("valid regex"));

const ENCRYPTED_HEADER: &str = "Proc-Type: 4,ENCRYPTED";

/// Private key encodings accepted in credential material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEncoding {
    Pkcs1,
    Pkcs8,
    Sec1,
}

impl fmt::Display for KeyEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KeyEncoding::Pkcs1 => "PKCS#1",
            KeyEncoding::Pkcs8 => "PKCS#8",
            KeyEncoding::Sec1 => "SEC1",
        })
    }
}

/// Error types for credential material
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Failed to read the PEM file
    #[error("Failed to read PEM file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Neither a PEM path nor inline contents were given
    #[error("No PEM path provided and passphrase is empty")]
    Missing,

    #[error(
        "Private key not found (encrypted or unencrypted) and X.509 certificate not found in the PEM file"
    )]
    NothingFound,

    #[error("Private key not found (encrypted or unencrypted) in the PEM file")]
    KeyNotFound,

    #[error("X.509 certificate not found in the PEM file")]
    CertificateNotFound,

    /// Encrypted key without a passphrase
    #[error("Encrypted {encoding} key found but no passphrase was provided")]
    PassphraseRequired { encoding: KeyEncoding },

    #[error("Incorrect password or decryption error for {encoding} key")]
    Decryption {
        encoding: KeyEncoding,
        source: ErrorStack,
    },

    #[error("Invalid {encoding} private key: {source}")]
    InvalidKey {
        encoding: KeyEncoding,
        source: ErrorStack,
    },

    #[error("Invalid X.509 certificate: {0}")]
    InvalidCertificate(#[source] ErrorStack),

    #[error("Private key does not match the certificate public key")]
    KeyMismatch,

    #[error("Failed to write credential material: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CredentialError> for MongoSqlError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Missing | CredentialError::Read { .. } => {
                MongoSqlError::Configuration(err.to_string())
            }
            CredentialError::Io(io) => MongoSqlError::Io(io),
            other => MongoSqlError::Authentication(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PemEnvelope {
    pem: String,
    #[serde(default)]
    passphrase: Option<String>,
}

/// Split inline contents into PEM text and an optional envelope passphrase
///
/// JSON objects with a `pem` key and JSON string literals are unwrapped;
/// anything else is taken as raw PEM.
pub fn unwrap_envelope(contents: &str) -> (String, Option<String>) {
    let trimmed = contents.trim();
    if let Ok(envelope) = serde_json::from_str::<PemEnvelope>(trimmed) {
        debug!("inline credential material is a JSON envelope");
        return (
            envelope.pem,
            envelope.passphrase.filter(|p| !p.is_empty()),
        );
    }
    if let Ok(literal) = serde_json::from_str::<String>(trimmed) {
        return (literal, None);
    }
    (contents.to_string(), None)
}

/// Restore PEM line structure
///
/// Unescapes `\n` sequences, puts BEGIN/END markers and encryption headers
/// on their own lines, splits flattened base64 bodies, drops blank lines
/// and leaves the single blank line PEM requires after `DEK-Info`.
pub fn normalize_pem(raw: &str) -> String {
    let unescaped = raw
        .replace("\\\\n", "\n")
        .replace("\\n", "\n")
        .replace("\\r", "\n")
        .replace("\r\n", "\n")
        .replace('\r', "\n");
    let marked = PEM_MARKER_REGEX.replace_all(&unescaped, "\n$0\n");
    let headed = PEM_HEADER_REGEX.replace_all(&marked, "\n$1: $2\n");

    let mut lines: Vec<&str> = Vec::new();
    for line in headed.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with("-----") || line.starts_with("Proc-Type:") {
            lines.push(line);
        } else if line.starts_with("DEK-Info:") {
            lines.push(line);
            lines.push("");
        } else {
            lines.extend(line.split_whitespace());
        }
    }

    let mut normalized = lines.join("\n");
    normalized.push('\n');
    normalized
}

/// A decoded client certificate with its private key
pub struct ClientIdentity {
    certificate: X509,
    key: PKey<Private>,
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("subject", &self.subject())
            .finish_non_exhaustive()
    }
}

impl ClientIdentity {
    /// Resolve credential material from its configured source
    ///
    /// A PEM path wins and `passphrase` decrypts its key. Inline contents
    /// may carry their own passphrase in a JSON envelope, which takes
    /// precedence over `passphrase`.
    pub fn load(
        source: &CredentialSource,
        passphrase: Option<&str>,
    ) -> Result<Self, CredentialError> {
        match source {
            CredentialSource::PemPath(path) => {
                debug!(path = %path.display(), "loading X.509 material from file");
                let contents =
                    std::fs::read_to_string(path).map_err(|source| CredentialError::Read {
                        path: path.clone(),
                        source,
                    })?;
                Self::from_pem(&normalize_pem(&contents), passphrase)
            }
            CredentialSource::Inline(contents) if contents.trim().is_empty() => {
                Err(CredentialError::Missing)
            }
            CredentialSource::Inline(contents) => {
                let (pem, envelope_passphrase) = unwrap_envelope(contents);
                let passphrase = envelope_passphrase.as_deref().or(passphrase);
                Self::from_pem(&normalize_pem(&pem), passphrase)
            }
        }
    }

    /// Parse normalized PEM text holding a certificate and a private key
    pub fn from_pem(pem: &str, passphrase: Option<&str>) -> Result<Self, CredentialError> {
        let mut certificate: Option<X509> = None;
        let mut key: Option<PKey<Private>> = None;

        for block in PEM_BLOCK_REGEX.captures_iter(pem) {
            let text = block.get(0).map_or("", |m| m.as_str());
            let label = block.get(1).map_or("", |m| m.as_str());

            let encoding = match label {
                "CERTIFICATE" => {
                    if certificate.is_some() {
                        warn!("additional X.509 certificate in PEM material ignored");
                        continue;
                    }
                    certificate = Some(
                        X509::from_pem(text.as_bytes()).map_err(CredentialError::InvalidCertificate)?,
                    );
                    continue;
                }
                "PRIVATE KEY" | "ENCRYPTED PRIVATE KEY" => KeyEncoding::Pkcs8,
                "RSA PRIVATE KEY" => KeyEncoding::Pkcs1,
                "EC PRIVATE KEY" => KeyEncoding::Sec1,
                other => {
                    debug!(label = other, "skipping unrelated PEM object");
                    continue;
                }
            };

            if key.is_some() {
                warn!(%encoding, "additional private key in PEM material ignored");
                continue;
            }
            let encrypted = label == "ENCRYPTED PRIVATE KEY" || text.contains(ENCRYPTED_HEADER);
            key = Some(decode_key(text, encoding, encrypted, passphrase)?);
        }

        let (certificate, key) = match (certificate, key) {
            (Some(certificate), Some(key)) => (certificate, key),
            (None, None) => return Err(CredentialError::NothingFound),
            (Some(_), None) => return Err(CredentialError::KeyNotFound),
            (None, Some(_)) => return Err(CredentialError::CertificateNotFound),
        };

        let matches = certificate
            .public_key()
            .map(|public| public.public_eq(&key))
            .map_err(CredentialError::InvalidCertificate)?;
        if !matches {
            return Err(CredentialError::KeyMismatch);
        }

        Ok(Self { certificate, key })
    }

    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    /// Subject distinguished name values, comma separated
    pub fn subject(&self) -> String {
        self.certificate
            .subject_name()
            .entries()
            .filter_map(|entry| entry.data().as_utf8().ok().map(|s| s.to_string()))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Certificate followed by the unencrypted PKCS#8 key
    pub fn to_pem(&self) -> Result<Vec<u8>, CredentialError> {
        let mut pem = self
            .certificate
            .to_pem()
            .map_err(CredentialError::InvalidCertificate)?;
        let key = self
            .key
            .private_key_to_pem_pkcs8()
            .map_err(|source| CredentialError::InvalidKey {
                encoding: KeyEncoding::Pkcs8,
                source,
            })?;
        pem.extend_from_slice(&key);
        Ok(pem)
    }

    /// Write the identity to a private temporary file
    ///
    /// The file is removed when the returned handle is dropped.
    pub fn write_temp(&self) -> Result<NamedTempFile, CredentialError> {
        let mut file = tempfile::Builder::new()
            .prefix("mongosql-x509-")
            .suffix(".pem")
            .tempfile()?;
        file.write_all(&self.to_pem()?)?;
        file.flush()?;
        Ok(file)
    }
}

fn decode_key(
    block: &str,
    encoding: KeyEncoding,
    encrypted: bool,
    passphrase: Option<&str>,
) -> Result<PKey<Private>, CredentialError> {
    if encrypted {
        let passphrase = passphrase
            .filter(|p| !p.is_empty())
            .ok_or(CredentialError::PassphraseRequired { encoding })?;
        PKey::private_key_from_pem_passphrase(block.as_bytes(), passphrase.as_bytes())
            .map_err(|source| CredentialError::Decryption { encoding, source })
    } else {
        PKey::private_key_from_pem(block.as_bytes())
            .map_err(|source| CredentialError::InvalidKey { encoding, source })
    }
}
