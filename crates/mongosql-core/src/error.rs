//! Error types for MongoSQL connections
//!
//! Failures keep their full cause chain. Some callers need to look past the
//! top-level message (for instance to recognise a server-side rejection of a
//! `$documents` stage), so the chain is an explicit linked list that can be
//! searched rather than a flattened string.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of a failed connection attempt or first use of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Conflicting or missing options, unreadable credential files
    ConfigurationInvalid,
    /// Unreachable host, untrusted server, or the handshake bound elapsed
    Timeout,
    /// Bad credentials or malformed certificate material
    AuthenticationRejected,
    /// The server rejected the requested query class or cluster type
    FeatureUnsupported,
}

impl ErrorKind {
    /// SQLSTATE class reported alongside the error
    pub fn sql_state(&self) -> &'static str {
        match self {
            ErrorKind::ConfigurationInvalid => "HY000",
            ErrorKind::Timeout => "08000",
            ErrorKind::AuthenticationRejected => "28000",
            ErrorKind::FeatureUnsupported => "0A000",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConfigurationInvalid => "ConfigurationInvalid",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::AuthenticationRejected => "AuthenticationRejected",
            ErrorKind::FeatureUnsupported => "FeatureUnsupported",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single link in a [`CauseChain`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Human readable message for this level
    pub message: String,
    /// Server error code, when the level came from a server reply
    pub code: Option<i32>,
    next: Option<Box<ErrorRecord>>,
}

impl ErrorRecord {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            next: None,
        }
    }

    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    /// The record this one was caused by
    pub fn cause(&self) -> Option<&ErrorRecord> {
        self.next.as_deref()
    }
}

/// Ordered list of nested failure records, outermost first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CauseChain {
    head: Option<Box<ErrorRecord>>,
    len: usize,
}

impl CauseChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a chain from records ordered outermost first
    pub fn from_records(records: impl IntoIterator<Item = ErrorRecord>) -> Self {
        let records: Vec<ErrorRecord> = records.into_iter().collect();
        records
            .into_iter()
            .rev()
            .fold(Self::new(), |chain, record| chain.wrap(record))
    }

    /// Build a chain from plain messages ordered outermost first
    pub fn from_messages<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_records(messages.into_iter().map(ErrorRecord::new))
    }

    /// Build a chain by following `source()` links of a standard error
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut records = Vec::new();
        let mut current = Some(err);
        while let Some(e) = current {
            records.push(ErrorRecord::new(e.to_string()));
            current = e.source();
        }
        Self::from_records(records)
    }

    /// Put `record` in front of the chain, making the current head its cause
    pub fn wrap(mut self, mut record: ErrorRecord) -> Self {
        record.next = self.head.take();
        self.head = Some(Box::new(record));
        self.len += 1;
        self
    }

    /// Outermost record
    pub fn head(&self) -> Option<&ErrorRecord> {
        self.head.as_deref()
    }

    /// Innermost record
    pub fn root_cause(&self) -> Option<&ErrorRecord> {
        self.iter().last()
    }

    pub fn depth(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> CauseIter<'_> {
        CauseIter {
            next: self.head.as_deref(),
        }
    }

    /// First record whose message contains `marker`
    pub fn find(&self, marker: &str) -> Option<&ErrorRecord> {
        self.iter().find(|record| record.message.contains(marker))
    }

    /// Whether any record in the chain mentions `marker`
    pub fn contains(&self, marker: &str) -> bool {
        self.find(marker).is_some()
    }

    /// Whether any record carries the given server error code
    pub fn has_code(&self, code: i32) -> bool {
        self.iter().any(|record| record.code == Some(code))
    }
}

impl fmt::Display for CauseChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (depth, record) in self.iter().enumerate() {
            if depth > 0 {
                f.write_str("\n  caused by: ")?;
            }
            f.write_str(&record.message)?;
            if let Some(code) = record.code {
                write!(f, " (code {code})")?;
            }
        }
        Ok(())
    }
}

/// Iterator over a [`CauseChain`], outermost first
pub struct CauseIter<'a> {
    next: Option<&'a ErrorRecord>,
}

impl<'a> Iterator for CauseIter<'a> {
    type Item = &'a ErrorRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.cause();
        Some(current)
    }
}

impl<'a> IntoIterator for &'a CauseChain {
    type Item = &'a ErrorRecord;
    type IntoIter = CauseIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A classified failure with its preserved cause chain
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ConnectError {
    pub kind: ErrorKind,
    pub message: String,
    pub chain: CauseChain,
}

impl ConnectError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind,
            chain: CauseChain::from_messages([message.clone()]),
            message,
        }
    }

    pub fn with_chain(kind: ErrorKind, message: impl Into<String>, chain: CauseChain) -> Self {
        Self {
            kind,
            message: message.into(),
            chain,
        }
    }

    pub fn sql_state(&self) -> &'static str {
        self.kind.sql_state()
    }
}

/// Core error type for MongoSQL operations
#[derive(Error, Debug)]
pub enum MongoSqlError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("Invalid server response: {0}")]
    Response(String),

    #[error(transparent)]
    Classified(#[from] ConnectError),

    #[error("Connection is closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MongoSqlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MongoSqlError::Configuration(_)
            | MongoSqlError::Io(_)
            | MongoSqlError::Serialization(_) => ErrorKind::ConfigurationInvalid,
            MongoSqlError::Authentication(_) => ErrorKind::AuthenticationRejected,
            MongoSqlError::Timeout(_) | MongoSqlError::Closed => ErrorKind::Timeout,
            MongoSqlError::Unsupported(_) | MongoSqlError::Response(_) => {
                ErrorKind::FeatureUnsupported
            }
            MongoSqlError::Classified(err) => err.kind,
        }
    }

    /// Full cause chain, outermost first
    pub fn chain(&self) -> CauseChain {
        match self {
            MongoSqlError::Classified(err) => err.chain.clone(),
            other => CauseChain::from_error(other),
        }
    }

    /// Convert into the classified form carried by failed results
    pub fn into_connect_error(self) -> ConnectError {
        match self {
            MongoSqlError::Classified(err) => err,
            other => ConnectError::with_chain(other.kind(), other.to_string(), other.chain()),
        }
    }
}

/// Result type alias for MongoSQL operations
pub type Result<T> = std::result::Result<T, MongoSqlError>;

#[cfg(test)]
mod tests;
