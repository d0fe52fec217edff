//! Classification of driver failures
//!
//! A `mongodb` error is walked through its whole `source()` chain. Each
//! level becomes a record of the resulting [`CauseChain`], keeping server
//! error codes, and the most specific failure found on any level decides
//! the [`ErrorKind`].

use mongodb::error::{Error, ErrorKind as DriverErrorKind};
use mongosql_core::{CauseChain, ConnectError, ErrorKind, ErrorRecord};
use std::time::Duration;

/// Message reported when the server cannot be reached within the bound
pub const TIMEOUT_MESSAGE: &str = "Couldn't connect due to a timeout. Please check your hostname and port. If necessary, set a longer connection timeout in the MongoDB URI.";

/// Message reported when the server rejects the credentials
pub const AUTHENTICATION_MESSAGE: &str =
    "Authentication failed. Verify that the credentials are correct.";

/// Server code for a failed authentication
pub const AUTHENTICATION_FAILED_CODE: i32 = 18;

/// What a single level of a driver error says about the failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Credentials were rejected during the handshake
    Authentication,
    /// No suitable server answered in time
    Unreachable,
    /// The client options were rejected before any I/O
    InvalidArgument,
    /// A server replied to a command with an error code
    CommandRejected { code: i32 },
    /// Nothing specific
    Other,
}

impl Failure {
    fn of(kind: &DriverErrorKind) -> Self {
        match kind {
            DriverErrorKind::Authentication { .. } => Failure::Authentication,
            DriverErrorKind::ServerSelection { .. }
            | DriverErrorKind::DnsResolve { .. }
            | DriverErrorKind::Io(_)
            | DriverErrorKind::ConnectionPoolCleared { .. } => Failure::Unreachable,
            DriverErrorKind::InvalidArgument { .. } | DriverErrorKind::InvalidTlsConfig { .. } => {
                Failure::InvalidArgument
            }
            DriverErrorKind::Command(command) => Failure::CommandRejected { code: command.code },
            _ => Failure::Other,
        }
    }
}

/// Decide the kind of a failure from every level of its chain
///
/// Authentication wins over everything, then unreachability, then invalid
/// options, then server-side command rejections. A chain with none of
/// these is treated as a connection failure.
pub fn classify_failures(failures: &[Failure]) -> ErrorKind {
    let any = |pred: fn(&Failure) -> bool| failures.iter().any(pred);

    if any(|f| {
        matches!(
            f,
            Failure::Authentication
                | Failure::CommandRejected {
                    code: AUTHENTICATION_FAILED_CODE
                }
        )
    }) {
        ErrorKind::AuthenticationRejected
    } else if any(|f| matches!(f, Failure::Unreachable)) {
        ErrorKind::Timeout
    } else if any(|f| matches!(f, Failure::InvalidArgument)) {
        ErrorKind::ConfigurationInvalid
    } else if any(|f| matches!(f, Failure::CommandRejected { .. })) {
        ErrorKind::FeatureUnsupported
    } else {
        ErrorKind::Timeout
    }
}

/// Classify a driver error
pub fn classify(err: &Error) -> ErrorKind {
    classify_failures(&driver_levels(err).map(|e| Failure::of(&e.kind)).collect::<Vec<_>>())
}

/// Build the cause chain of a driver error, outermost first
pub fn cause_chain(err: &Error) -> CauseChain {
    let mut records = Vec::new();
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(level) = current {
        let mut record = ErrorRecord::new(level.to_string());
        if let Some(code) = level.downcast_ref::<Error>().and_then(server_code) {
            record = record.with_code(code);
        }
        records.push(record);
        current = level.source();
    }
    CauseChain::from_records(records)
}

/// Turn a driver error into a classified failure
///
/// `context` names the step that failed and heads the chain. Authentication
/// and timeout failures report their standard messages.
pub fn connect_error(context: &str, err: &Error) -> ConnectError {
    let kind = classify(err);
    let message = match kind {
        ErrorKind::AuthenticationRejected => AUTHENTICATION_MESSAGE.to_string(),
        ErrorKind::Timeout => TIMEOUT_MESSAGE.to_string(),
        _ => format!("{}: {}", context, err),
    };
    let chain = cause_chain(err).wrap(ErrorRecord::new(context));
    ConnectError::with_chain(kind, message, chain)
}

/// Failure for a handshake that outlived its bound
pub fn timeout_error(bound: Duration) -> ConnectError {
    ConnectError::with_chain(
        ErrorKind::Timeout,
        TIMEOUT_MESSAGE,
        CauseChain::from_messages([
            TIMEOUT_MESSAGE.to_string(),
            format!("handshake did not complete within {} ms", bound.as_millis()),
        ]),
    )
}

fn server_code(err: &Error) -> Option<i32> {
    match err.kind.as_ref() {
        DriverErrorKind::Command(command) => Some(command.code),
        _ => None,
    }
}

fn driver_levels(err: &Error) -> impl Iterator<Item = &Error> {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    std::iter::from_fn(move || {
        let level = current?;
        current = level.source();
        Some(level)
    })
    .filter_map(|level| level.downcast_ref::<Error>())
}
