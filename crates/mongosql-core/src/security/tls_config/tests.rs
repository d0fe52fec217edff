//! Tests for TLS Configuration Types

use super::*;
use std::path::PathBuf;

const TWO_CERTS: &str = "-----BEGIN CERTIFICATE-----\nAAA\n-----END CERTIFICATE-----\n\
-----BEGIN CERTIFICATE-----\nBBB\n-----END CERTIFICATE-----\n";

#[test]
fn test_tls_config_disabled_by_default() {
    let config = TlsConfig::default();

    assert!(!config.enabled);
    assert!(config.ca.is_none());
    assert!(!config.has_trust_material());
    assert!(config.validate().is_ok());
}

#[test]
fn test_tls_config_with_ca_file() {
    let config = TlsConfig::enabled().ca_file("/etc/ssl/certs/ca.pem");

    assert_eq!(
        config.ca,
        Some(CaSource::File(PathBuf::from("/etc/ssl/certs/ca.pem")))
    );
    assert!(config.has_trust_material());
    assert!(config.validate().is_ok());
}

#[test]
fn test_tls_config_bundle_counts_certificates() {
    let config = TlsConfig::enabled().ca_bundle(TWO_CERTS);

    assert_eq!(
        config.ca.as_ref().and_then(CaSource::inline_certificate_count),
        Some(2)
    );
    assert!(config.validate().is_ok());
}

#[test]
fn test_tls_config_validation_ca_without_tls() {
    let config = TlsConfig::disabled().ca_file("/tmp/ca.pem");
    assert!(config.validate().is_err());
}

#[test]
fn test_tls_config_validation_empty_ca_path() {
    let config = TlsConfig::enabled().ca_file("");
    assert!(config.validate().is_err());
}

#[test]
fn test_tls_config_validation_bundle_without_certificates() {
    let config = TlsConfig::enabled().ca_bundle("not a pem");
    assert!(config.validate().is_err());
}

#[test]
fn test_tls_config_allow_invalid_certificates() {
    let config = TlsConfig::enabled().allow_invalid_certificates(true);
    assert!(config.allow_invalid_certificates);
    assert!(!config.has_trust_material());
}

#[test]
fn test_tls_config_serialization() {
    let config = TlsConfig::enabled().ca_file("/tmp/ca.pem");

    let json = serde_json::to_string(&config).expect("serialization failed");
    let back: TlsConfig = serde_json::from_str(&json).expect("deserialization failed");

    assert_eq!(back, config);
}
