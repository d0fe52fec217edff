//! Connection URI grammar
//!
//! Accepts `mongodb://[user[:pass]@]host[:port][,host[:port]...]/[db][?opts]`
//! and `mongodb+srv://host/[db][?opts]`, optionally prefixed with `jdbc:`.
//! Option names are case-insensitive and stored lowercased.

use crate::{MongoSqlError, Result};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Default MongoDB port used when a direct host omits one
pub const DEFAULT_PORT: u16 = 27017;

const STANDARD_PREFIX: &str = "mongodb://";
const SRV_PREFIX: &str = "mongodb+srv://";
const JDBC_PREFIX: &str = "jdbc:";

/// How the seed list is discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UriScheme {
    /// Hosts are listed directly
    Standard,
    /// A single hostname resolved through DNS SRV records
    Srv,
}

/// One `host[:port]` entry of a URI
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostAddress {
    pub host: String,
    pub port: Option<u16>,
}

impl HostAddress {
    pub fn new(host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(MongoSqlError::Configuration(
                "Empty host in connection string".to_string(),
            ));
        }

        // IPv6 literal: [::1]:27017
        let (host, port) = if let Some(rest) = raw.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(|| {
                MongoSqlError::Configuration(format!("Unterminated IPv6 host: {}", raw))
            })?;
            (host, tail.strip_prefix(':'))
        } else {
            match raw.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (raw, None),
            }
        };

        let port = port
            .map(|p| {
                p.parse::<u16>()
                    .ok()
                    .filter(|p| *p > 0)
                    .ok_or_else(|| MongoSqlError::Configuration(format!("Invalid port: {}", p)))
            })
            .transpose()?;

        Ok(Self::new(host.to_lowercase(), port))
    }
}

impl fmt::Display for HostAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.host, port),
            None => f.write_str(&self.host),
        }
    }
}

/// A parsed connection URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionUri {
    pub scheme: UriScheme,
    pub username: Option<String>,
    pub password: Option<String>,
    pub hosts: Vec<HostAddress>,
    pub database: Option<String>,
    options: BTreeMap<String, String>,
}

impl ConnectionUri {
    pub fn parse(uri: &str) -> Result<Self> {
        let trimmed = uri.trim();
        let trimmed = match trimmed.get(..JDBC_PREFIX.len()) {
            Some(prefix) if prefix.eq_ignore_ascii_case(JDBC_PREFIX) => &trimmed[JDBC_PREFIX.len()..],
            _ => trimmed,
        };

        let (scheme, rest) = if let Some(rest) = trimmed.strip_prefix(SRV_PREFIX) {
            (UriScheme::Srv, rest)
        } else if let Some(rest) = trimmed.strip_prefix(STANDARD_PREFIX) {
            (UriScheme::Standard, rest)
        } else {
            return Err(MongoSqlError::Configuration(format!(
                "Connection string must start with '{}' or '{}'",
                STANDARD_PREFIX, SRV_PREFIX
            )));
        };

        let (before_query, query) = match rest.split_once('?') {
            Some((before, query)) => (before, Some(query)),
            None => (rest, None),
        };
        let (authority, path) = match before_query.split_once('/') {
            Some((authority, path)) => (authority, Some(path)),
            None => (before_query, None),
        };

        let (userinfo, host_list) = match authority.rsplit_once('@') {
            Some((userinfo, hosts)) => (Some(userinfo), hosts),
            None => (None, authority),
        };

        let (username, password) = match userinfo {
            Some(info) => {
                let (user, pass) = match info.split_once(':') {
                    Some((user, pass)) => (user, Some(pass)),
                    None => (info, None),
                };
                (
                    Some(decode(user)?).filter(|u| !u.is_empty()),
                    pass.map(decode).transpose()?,
                )
            }
            None => (None, None),
        };

        let hosts = if host_list.is_empty() {
            Vec::new()
        } else {
            host_list
                .split(',')
                .map(HostAddress::parse)
                .collect::<Result<Vec<_>>>()?
        };

        if scheme == UriScheme::Srv {
            match hosts.as_slice() {
                [single] if single.port.is_none() => {}
                [_] => {
                    return Err(MongoSqlError::Configuration(
                        "An SRV connection string must not specify a port".to_string(),
                    ));
                }
                _ => {
                    return Err(MongoSqlError::Configuration(
                        "An SRV connection string must contain exactly one host".to_string(),
                    ));
                }
            }
        }

        let database = path
            .filter(|p| !p.is_empty())
            .map(decode)
            .transpose()?;

        let options = query.map(parse_options).transpose()?.unwrap_or_default();

        Ok(Self {
            scheme,
            username,
            password,
            hosts,
            database,
            options,
        })
    }

    pub fn is_srv(&self) -> bool {
        self.scheme == UriScheme::Srv
    }

    /// Look up a query option by case-insensitive name
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn options(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromStr for ConnectionUri {
    type Err = MongoSqlError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Split `k=v&k=v` options, percent-decoding each part
///
/// A `+` is kept as is: connection strings are not form-encoded.
fn parse_options(query: &str) -> Result<BTreeMap<String, String>> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            Ok((decode(key)?.to_lowercase(), decode(value)?))
        })
        .collect()
}

fn decode(raw: &str) -> Result<String> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| MongoSqlError::Configuration(format!("Invalid percent-encoding: {}", e)))
}
