//! Tests for cause chains and error classification

use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_chain_preserves_order_outermost_first() {
    let chain = CauseChain::from_messages(["query failed", "command aggregate failed", "root"]);

    let messages: Vec<&str> = chain.iter().map(|r| r.message.as_str()).collect();
    assert_eq!(messages, vec!["query failed", "command aggregate failed", "root"]);
    assert_eq!(chain.depth(), 3);
    assert_eq!(chain.root_cause().map(|r| r.message.as_str()), Some("root"));
}

#[test]
fn test_chain_contains_searches_nested_records() {
    let chain = CauseChain::from_messages([
        "Error executing query",
        "Command failed with error 40324: Unrecognized pipeline stage name: '$documents'",
    ]);

    assert!(chain.contains("$documents"));
    assert!(!chain.head().is_some_and(|r| r.message.contains("$documents")));
    assert_eq!(
        chain.find("40324").map(|r| r.message.as_str()),
        Some("Command failed with error 40324: Unrecognized pipeline stage name: '$documents'")
    );
}

#[test]
fn test_chain_wrap_puts_record_in_front() {
    let chain = CauseChain::from_messages(["inner"]).wrap(ErrorRecord::new("outer").with_code(18));

    assert_eq!(chain.head().map(|r| r.message.as_str()), Some("outer"));
    assert!(chain.has_code(18));
    assert!(!chain.has_code(11600));
}

#[test]
fn test_empty_chain() {
    let chain = CauseChain::new();
    assert!(chain.is_empty());
    assert!(!chain.contains(""));
    assert!(chain.root_cause().is_none());
}

#[test]
fn test_chain_from_std_error_follows_sources() {
    let err = MongoSqlError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "ca.pem missing",
    ));
    let chain = CauseChain::from_error(&err);

    assert_eq!(chain.depth(), 2);
    assert!(chain.contains("ca.pem missing"));
}

#[test]
fn test_chain_display_lists_causes() {
    let chain = CauseChain::from_records([
        ErrorRecord::new("Authentication failed."),
        ErrorRecord::new("bad auth").with_code(18),
    ]);

    assert_eq!(
        chain.to_string(),
        "Authentication failed.\n  caused by: bad auth (code 18)"
    );
}

#[test]
fn test_sql_states() {
    assert_eq!(ErrorKind::AuthenticationRejected.sql_state(), "28000");
    assert_eq!(ErrorKind::Timeout.sql_state(), "08000");
    assert_eq!(ErrorKind::ConfigurationInvalid.sql_state(), "HY000");
    assert_eq!(ErrorKind::FeatureUnsupported.sql_state(), "0A000");
}

#[test]
fn test_error_kind_mapping() {
    assert_eq!(
        MongoSqlError::Configuration("x".into()).kind(),
        ErrorKind::ConfigurationInvalid
    );
    assert_eq!(
        MongoSqlError::Authentication("x".into()).kind(),
        ErrorKind::AuthenticationRejected
    );
    assert_eq!(MongoSqlError::Timeout("x".into()).kind(), ErrorKind::Timeout);
    assert_eq!(
        MongoSqlError::Unsupported("x".into()).kind(),
        ErrorKind::FeatureUnsupported
    );
}

#[test]
fn test_into_connect_error_keeps_classified_chain() {
    let chain = CauseChain::from_messages(["outer", "inner $documents"]);
    let err = MongoSqlError::from(ConnectError::with_chain(
        ErrorKind::FeatureUnsupported,
        "outer",
        chain.clone(),
    ));

    let connect = err.into_connect_error();
    assert_eq!(connect.kind, ErrorKind::FeatureUnsupported);
    assert_eq!(connect.chain, chain);
}

#[test]
fn test_into_connect_error_for_plain_variant() {
    let connect = MongoSqlError::Configuration("Database not specified".into()).into_connect_error();

    assert_eq!(connect.kind, ErrorKind::ConfigurationInvalid);
    assert_eq!(connect.message, "Configuration error: Database not specified");
    assert!(connect.chain.contains("Database not specified"));
}
