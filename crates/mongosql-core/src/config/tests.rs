//! Tests for connection configuration

use super::*;
use pretty_assertions::assert_eq;
use rstest::rstest;

const X509_URI: &str =
    "mongodb://localhost:27017/?authSource=$external&authMechanism=MONGODB-X509&tls=true";

fn props(pairs: &[(&str, &str)]) -> ConnectionProperties {
    pairs.iter().copied().collect()
}

#[test]
fn test_password_mechanism_from_properties() {
    let config = ConnectionConfig::from_uri(
        "jdbc:mongodb://localhost",
        &props(&[
            ("user", "alice"),
            ("password", "secret"),
            ("authSource", "admin"),
            ("database", "integration_test"),
        ]),
    )
    .unwrap();

    assert_eq!(
        config.mechanism,
        AuthMechanism::Password {
            username: "alice".into(),
            password: "secret".into(),
            auth_source: Some("admin".into()),
        }
    );
    assert_eq!(config.database, "integration_test");
    assert_eq!(
        config.discovery,
        Discovery::Direct {
            hosts: vec![HostAddress::new("localhost", None)]
        }
    );
    assert!(!config.tls.enabled);
    assert_eq!(config.dialect, SqlDialect::MongoSql);
}

#[test]
fn test_missing_database_is_rejected() {
    let err = ConnectionConfig::from_uri("mongodb://localhost", &ConnectionProperties::new())
        .unwrap_err();
    assert_eq!(err.to_string(), "Configuration error: Database not specified");
}

#[test]
fn test_database_from_uri_path() {
    let config =
        ConnectionConfig::from_uri("mongodb://localhost/sales", &ConnectionProperties::new())
            .unwrap();
    assert_eq!(config.database, "sales");
    assert_eq!(config.mechanism, AuthMechanism::None);
}

#[test]
fn test_x509_pem_path_takes_priority_over_inline() {
    let config = ConnectionConfig::from_uri(
        X509_URI,
        &props(&[
            ("database", "test"),
            ("x509PemPath", "/certs/client.pem"),
            ("password", "changeit"),
        ]),
    )
    .unwrap();

    assert_eq!(
        config.mechanism,
        AuthMechanism::X509 {
            source: CredentialSource::PemPath("/certs/client.pem".into()),
            passphrase: Some("changeit".into()),
        }
    );
    assert!(config.tls.enabled);
}

#[test]
fn test_x509_inline_contents_from_password() {
    let pem = "-----BEGIN CERTIFICATE-----\\nAAA\\n-----END CERTIFICATE-----";
    let config =
        ConnectionConfig::from_uri(X509_URI, &props(&[("database", "test"), ("password", pem)]))
            .unwrap();

    assert_eq!(
        config.mechanism,
        AuthMechanism::X509 {
            source: CredentialSource::Inline(pem.into()),
            passphrase: None,
        }
    );
}

#[test]
fn test_x509_without_material_is_rejected() {
    let err = ConnectionConfig::from_uri(X509_URI, &props(&[("database", "test")])).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Configuration error: No PEM path provided and passphrase is empty"
    );
}

#[test]
fn test_x509_rejects_non_external_auth_source() {
    let err = ConnectionConfig::from_uri(
        "mongodb://localhost/?authMechanism=MONGODB-X509&authSource=admin",
        &props(&[("database", "test"), ("x509PemPath", "/c.pem")]),
    )
    .unwrap_err();
    assert!(matches!(err, MongoSqlError::Configuration(_)));
}

#[test]
fn test_x509_rejects_disabled_tls() {
    let err = ConnectionConfig::from_uri(
        "mongodb://localhost/?authMechanism=MONGODB-X509&tls=false",
        &props(&[("database", "test"), ("x509PemPath", "/c.pem")]),
    )
    .unwrap_err();
    assert!(err.to_string().contains("requires TLS"));
}

#[test]
fn test_password_without_auth_source_leaves_it_unset() {
    let config = ConnectionConfig::from_uri(
        "mongodb+srv://cluster0.example.com/",
        &props(&[("user", "alice"), ("password", "secret"), ("database", "test")]),
    )
    .unwrap();

    assert!(matches!(
        config.mechanism,
        AuthMechanism::Password {
            auth_source: None,
            ..
        }
    ));
}

#[rstest]
#[case::plain("/certs/ca.pem")]
#[case::plus_sign("/certs/ca+prod.pem")]
fn test_ca_file_property_and_uri_option_are_equivalent(#[case] path: &str) {
    let via_property = ConnectionConfig::from_uri(
        X509_URI,
        &props(&[
            ("database", "test"),
            ("x509PemPath", "/c.pem"),
            ("tlscafile", path),
        ]),
    )
    .unwrap();
    let via_uri = ConnectionConfig::from_uri(
        &format!("{}&tlscafile={}", X509_URI, path),
        &props(&[("database", "test"), ("x509PemPath", "/c.pem")]),
    )
    .unwrap();

    assert_eq!(via_property.tls, via_uri.tls);
    assert_eq!(via_property.tls.ca, Some(CaSource::File(path.into())));
}

#[test]
fn test_ca_file_given_twice_with_same_value_is_accepted() {
    let config = ConnectionConfig::from_uri(
        &format!("{}&tlscafile=/certs/ca.pem", X509_URI),
        &props(&[
            ("database", "test"),
            ("x509PemPath", "/c.pem"),
            ("tlsCAFile", "/certs/ca.pem"),
        ]),
    )
    .unwrap();
    assert!(config.tls.has_trust_material());
}

#[test]
fn test_ca_file_conflict_is_rejected() {
    let err = ConnectionConfig::from_uri(
        &format!("{}&tlscafile=/certs/a.pem", X509_URI),
        &props(&[
            ("database", "test"),
            ("x509PemPath", "/c.pem"),
            ("tlscafile", "/certs/b.pem"),
        ]),
    )
    .unwrap_err();
    assert!(err.to_string().contains("tlscafile"));
}

#[test]
fn test_ca_bundle_property() {
    let bundle = "-----BEGIN CERTIFICATE-----\nA\n-----END CERTIFICATE-----\n";
    let config = ConnectionConfig::from_uri(
        X509_URI,
        &props(&[
            ("database", "test"),
            ("x509PemPath", "/c.pem"),
            ("tlscabundle", bundle),
        ]),
    )
    .unwrap();
    assert_eq!(config.tls.ca, Some(CaSource::InlineBundle(bundle.into())));
}

#[test]
fn test_gssapi_mechanism() {
    let config = ConnectionConfig::from_uri(
        "mongodb://kdc.example.com/?authMechanism=GSSAPI",
        &props(&[
            ("database", "test"),
            ("jaasconfigpath", "/etc/jaas.conf"),
            ("gssapiserverauth", "true"),
        ]),
    )
    .unwrap();

    assert_eq!(
        config.mechanism,
        AuthMechanism::Gssapi {
            jaas_config_path: "/etc/jaas.conf".into(),
            login_context_name: DEFAULT_LOGIN_CONTEXT.into(),
            server_auth: true,
            username: None,
        }
    );
}

#[test]
fn test_gssapi_requires_jaas_path() {
    let err = ConnectionConfig::from_uri(
        "mongodb://kdc.example.com/?authMechanism=GSSAPI",
        &props(&[("database", "test")]),
    )
    .unwrap_err();
    assert!(err.to_string().contains("jaasconfigpath"));
}

#[test]
fn test_srv_discovery_enables_tls_by_default() {
    let config = ConnectionConfig::from_uri(
        "mongodb+srv://cluster0.example.net/",
        &props(&[("database", "test"), ("user", "u"), ("password", "p")]),
    )
    .unwrap();

    assert_eq!(
        config.discovery,
        Discovery::Srv {
            host: "cluster0.example.net".into()
        }
    );
    assert!(config.tls.enabled);
}

#[test]
fn test_srv_with_port_is_rejected() {
    let err = ConnectionConfig::from_uri(
        "mongodb+srv://cluster0.example.net:27017/",
        &props(&[("database", "test")]),
    )
    .unwrap_err();
    assert!(matches!(err, MongoSqlError::Configuration(_)));
}

#[rstest]
#[case::mongosql("mongosql", SqlDialect::MongoSql)]
#[case::mysql("MySQL", SqlDialect::MySql)]
fn test_dialect_selection(#[case] value: &str, #[case] expected: SqlDialect) {
    let config = ConnectionConfig::from_uri(
        "mongodb://localhost",
        &props(&[("database", "test"), ("dialect", value)]),
    )
    .unwrap();
    assert_eq!(config.dialect, expected);
}

#[test]
fn test_unknown_dialect_is_rejected() {
    let err = ConnectionConfig::from_uri(
        "mongodb://localhost/?dialect=postgres",
        &props(&[("database", "test")]),
    )
    .unwrap_err();
    assert!(err.to_string().contains("Unknown dialect"));
}

#[test]
fn test_unknown_mechanism_is_rejected() {
    let err = ConnectionConfig::from_uri(
        "mongodb://localhost/?authMechanism=MONGODB-AWS",
        &props(&[("database", "test")]),
    )
    .unwrap_err();
    assert!(err.to_string().contains("MONGODB-AWS"));
}

#[test]
fn test_timeouts_from_options() {
    let config = ConnectionConfig::from_uri(
        "mongodb://localhost/?connectTimeoutMS=500&serverSelectionTimeoutMS=2000",
        &props(&[("database", "test")]),
    )
    .unwrap();

    assert_eq!(config.connect_timeout, Duration::from_millis(500));
    assert_eq!(config.handshake_timeout(), Duration::from_millis(2000));
}

#[test]
fn test_zero_timeout_is_rejected() {
    let config = ConnectionConfig::new(
        "test",
        Discovery::Direct {
            hosts: vec![HostAddress::new("localhost", None)],
        },
    )
    .with_timeout(Duration::ZERO);
    assert!(config.validate().is_err());
}

#[test]
fn test_password_requires_both_fields() {
    let err = ConnectionConfig::from_uri(
        "mongodb://localhost/?authMechanism=SCRAM-SHA-256",
        &props(&[("database", "test"), ("user", "alice")]),
    )
    .unwrap_err();
    assert!(err.to_string().contains("Username and password"));
}

#[test]
fn test_properties_are_case_insensitive() {
    let props = ConnectionProperties::new().with("AuthSource", "admin");
    assert_eq!(props.get("authsource"), Some("admin"));
    assert_eq!(props.get("AUTHSOURCE"), Some("admin"));
}
