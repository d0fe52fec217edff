//! Connection configuration
//!
//! A [`ConnectionConfig`] is built once from a URI and a property bag and
//! validated at construction. Each authentication mechanism is its own
//! variant carrying only the fields it needs, so a config that passed
//! [`ConnectionConfig::validate`] never has to look options up again.

use crate::{CaSource, ConnectionUri, HostAddress, MongoSqlError, Result, TlsConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Login context used when a GSSAPI config does not name one
pub const DEFAULT_LOGIN_CONTEXT: &str = "mongodb.gssapi";

/// Default bound for the whole handshake
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

const EXTERNAL_AUTH_SOURCE: &str = "$external";

/// Case-insensitive bag of connection properties
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProperties {
    values: BTreeMap<String, String>,
}

impl ConnectionProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a property, replacing any previous value with the same name
    pub fn with(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.values
            .insert(key.as_ref().to_lowercase(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&key.to_lowercase()).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for ConnectionProperties {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut props = Self::new();
        for (k, v) in iter {
            props.set(k, v);
        }
        props
    }
}

/// Where X.509 credential material comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    /// PEM file holding the client certificate and private key
    PemPath(PathBuf),
    /// PEM text, raw or wrapped in a `{"pem": ..., "passphrase": ...}` envelope
    Inline(String),
}

/// Authentication mechanism with the fields relevant to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mechanism", rename_all = "snake_case")]
pub enum AuthMechanism {
    Password {
        username: String,
        password: String,
        /// Unset lets the server default (`admin`) or an SRV TXT record decide
        auth_source: Option<String>,
    },
    X509 {
        source: CredentialSource,
        passphrase: Option<String>,
    },
    Gssapi {
        jaas_config_path: PathBuf,
        login_context_name: String,
        server_auth: bool,
        username: Option<String>,
    },
    None,
}

impl AuthMechanism {
    pub fn name(&self) -> &'static str {
        match self {
            AuthMechanism::Password { .. } => "PASSWORD",
            AuthMechanism::X509 { .. } => "X509",
            AuthMechanism::Gssapi { .. } => "GSSAPI",
            AuthMechanism::None => "NONE",
        }
    }
}

/// How the servers to connect to are found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discovery {
    Direct { hosts: Vec<HostAddress> },
    /// Seed list resolved from DNS SRV records of a bare hostname
    Srv { host: String },
}

/// SQL translation mode requested from the server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    #[default]
    MongoSql,
    MySql,
}

impl SqlDialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlDialect::MongoSql => "mongosql",
            SqlDialect::MySql => "mysql",
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SqlDialect {
    type Err = MongoSqlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mongosql" => Ok(SqlDialect::MongoSql),
            "mysql" => Ok(SqlDialect::MySql),
            other => Err(MongoSqlError::Configuration(format!(
                "Unknown dialect: {}",
                other
            ))),
        }
    }
}

/// Fully validated connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub database: String,
    pub mechanism: AuthMechanism,
    pub discovery: Discovery,
    pub tls: TlsConfig,
    pub dialect: SqlDialect,
    pub connect_timeout: Duration,
    pub server_selection_timeout: Duration,
    pub app_name: Option<String>,
}

impl ConnectionConfig {
    /// Create a config with no authentication, TLS disabled and default timeouts
    pub fn new(database: impl Into<String>, discovery: Discovery) -> Self {
        Self {
            database: database.into(),
            mechanism: AuthMechanism::None,
            discovery,
            tls: TlsConfig::disabled(),
            dialect: SqlDialect::default(),
            connect_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            server_selection_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            app_name: None,
        }
    }

    pub fn with_mechanism(mut self, mechanism: AuthMechanism) -> Self {
        self.mechanism = mechanism;
        self
    }

    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_dialect(mut self, dialect: SqlDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Set both the connect and server selection timeouts
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self.server_selection_timeout = timeout;
        self
    }

    /// Upper bound for the whole establishment handshake
    pub fn handshake_timeout(&self) -> Duration {
        self.connect_timeout.max(self.server_selection_timeout)
    }

    /// Build a config from a URI plus properties
    ///
    /// Properties take precedence over URI options, except for the CA file,
    /// where giving two different values is rejected.
    pub fn from_uri(uri: &str, props: &ConnectionProperties) -> Result<Self> {
        let uri = ConnectionUri::parse(uri)?;
        let lookup = |name: &str| -> Option<String> {
            props
                .get(name)
                .or_else(|| uri.option(name))
                .map(str::to_string)
                .filter(|v| !v.is_empty())
        };

        let database = props
            .get("database")
            .map(str::to_string)
            .or_else(|| uri.database.clone())
            .or_else(|| uri.option("database").map(str::to_string))
            .filter(|d| !d.is_empty())
            .ok_or_else(|| MongoSqlError::Configuration("Database not specified".to_string()))?;

        let username = lookup("user").or_else(|| uri.username.clone());
        let password = lookup("password").or_else(|| uri.password.clone());

        let mechanism = match lookup("authmechanism").map(|m| m.to_uppercase()).as_deref() {
            None if username.is_some() => password_mechanism(username, password, lookup("authsource"))?,
            None | Some("NONE") => AuthMechanism::None,
            Some("SCRAM-SHA-1" | "SCRAM-SHA-256" | "PLAIN" | "DEFAULT") => {
                password_mechanism(username, password, lookup("authsource"))?
            }
            Some("MONGODB-X509") => {
                if let Some(source) = lookup("authsource")
                    && source != EXTERNAL_AUTH_SOURCE
                {
                    return Err(MongoSqlError::Configuration(format!(
                        "authSource must be {} for MONGODB-X509, found {}",
                        EXTERNAL_AUTH_SOURCE, source
                    )));
                }
                let explicit_passphrase = lookup("x509passphrase");
                match (lookup("x509pempath"), password) {
                    (Some(path), password) => AuthMechanism::X509 {
                        source: CredentialSource::PemPath(PathBuf::from(path)),
                        passphrase: explicit_passphrase.or(password.filter(|p| !p.is_empty())),
                    },
                    (None, Some(contents)) if !contents.is_empty() => AuthMechanism::X509 {
                        source: CredentialSource::Inline(contents),
                        passphrase: explicit_passphrase,
                    },
                    (None, _) => {
                        return Err(MongoSqlError::Configuration(
                            "No PEM path provided and passphrase is empty".to_string(),
                        ));
                    }
                }
            }
            Some("GSSAPI") => AuthMechanism::Gssapi {
                jaas_config_path: lookup("jaasconfigpath").map(PathBuf::from).ok_or_else(|| {
                    MongoSqlError::Configuration(
                        "jaasconfigpath is required for GSSAPI authentication".to_string(),
                    )
                })?,
                login_context_name: lookup("gssapilogincontextname")
                    .unwrap_or_else(|| DEFAULT_LOGIN_CONTEXT.to_string()),
                server_auth: lookup("gssapiserverauth")
                    .map(|v| parse_bool("gssapiserverauth", &v))
                    .transpose()?
                    .unwrap_or(false),
                username,
            },
            Some(other) => {
                return Err(MongoSqlError::Configuration(format!(
                    "Unsupported authentication mechanism: {}",
                    other
                )));
            }
        };

        let discovery = if uri.is_srv() {
            let host = uri
                .hosts
                .first()
                .map(|h| h.host.clone())
                .unwrap_or_default();
            Discovery::Srv { host }
        } else if uri.hosts.is_empty() {
            Discovery::Direct {
                hosts: vec![HostAddress::new("localhost", None)],
            }
        } else {
            Discovery::Direct {
                hosts: uri.hosts.clone(),
            }
        };

        let tls_flag = lookup("tls")
            .or_else(|| lookup("ssl"))
            .map(|v| parse_bool("tls", &v))
            .transpose()?;
        let is_x509 = matches!(mechanism, AuthMechanism::X509 { .. });
        if is_x509 && tls_flag == Some(false) {
            return Err(MongoSqlError::Configuration(
                "MONGODB-X509 authentication requires TLS".to_string(),
            ));
        }

        let ca_file = match (props.get("tlscafile"), uri.option("tlscafile")) {
            (Some(prop), Some(opt)) if prop != opt => {
                return Err(MongoSqlError::Configuration(format!(
                    "tlscafile given as both property ({}) and URI option ({})",
                    prop, opt
                )));
            }
            (prop, opt) => prop.or(opt).filter(|p| !p.is_empty()).map(PathBuf::from),
        };
        let ca = match (ca_file, lookup("tlscabundle")) {
            (Some(_), Some(_)) => {
                return Err(MongoSqlError::Configuration(
                    "tlscafile and tlscabundle are mutually exclusive".to_string(),
                ));
            }
            (Some(path), None) => Some(CaSource::File(path)),
            (None, Some(bundle)) => Some(CaSource::InlineBundle(bundle)),
            (None, None) => None,
        };

        let tls = TlsConfig {
            enabled: tls_flag.unwrap_or(uri.is_srv() || is_x509 || ca.is_some()),
            ca,
            allow_invalid_certificates: lookup("tlsallowinvalidcertificates")
                .map(|v| parse_bool("tlsallowinvalidcertificates", &v))
                .transpose()?
                .unwrap_or(false),
        };

        let dialect = lookup("dialect")
            .map(|d| d.parse::<SqlDialect>())
            .transpose()?
            .unwrap_or_default();

        let config = Self {
            database,
            mechanism,
            discovery,
            tls,
            dialect,
            connect_timeout: parse_millis(lookup("connecttimeoutms"))?
                .unwrap_or(DEFAULT_HANDSHAKE_TIMEOUT),
            server_selection_timeout: parse_millis(lookup("serverselectiontimeoutms"))?
                .unwrap_or(DEFAULT_HANDSHAKE_TIMEOUT),
            app_name: lookup("appname"),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants
    pub fn validate(&self) -> Result<()> {
        if self.database.is_empty() {
            return Err(MongoSqlError::Configuration(
                "Database not specified".to_string(),
            ));
        }

        match &self.discovery {
            Discovery::Srv { host } if host.is_empty() || host.contains(':') => {
                return Err(MongoSqlError::Configuration(format!(
                    "SRV discovery requires a bare hostname without a port, found '{}'",
                    host
                )));
            }
            Discovery::Direct { hosts } if hosts.is_empty() => {
                return Err(MongoSqlError::Configuration(
                    "At least one host is required".to_string(),
                ));
            }
            _ => {}
        }

        match &self.mechanism {
            AuthMechanism::Password { username, .. } if username.is_empty() => {
                return Err(MongoSqlError::Configuration(
                    "Username is required for password authentication".to_string(),
                ));
            }
            AuthMechanism::X509 { source, .. } => {
                if !self.tls.enabled {
                    return Err(MongoSqlError::Configuration(
                        "MONGODB-X509 authentication requires TLS".to_string(),
                    ));
                }
                let empty = match source {
                    CredentialSource::PemPath(path) => path.as_os_str().is_empty(),
                    CredentialSource::Inline(contents) => contents.trim().is_empty(),
                };
                if empty {
                    return Err(MongoSqlError::Configuration(
                        "No PEM path provided and passphrase is empty".to_string(),
                    ));
                }
            }
            AuthMechanism::Gssapi {
                jaas_config_path,
                login_context_name,
                ..
            } if jaas_config_path.as_os_str().is_empty() || login_context_name.is_empty() => {
                return Err(MongoSqlError::Configuration(
                    "GSSAPI requires a JAAS config path and login context name".to_string(),
                ));
            }
            _ => {}
        }

        if self.connect_timeout.is_zero() || self.server_selection_timeout.is_zero() {
            return Err(MongoSqlError::Configuration(
                "Timeouts must be greater than zero".to_string(),
            ));
        }

        self.tls.validate()
    }
}

fn password_mechanism(
    username: Option<String>,
    password: Option<String>,
    auth_source: Option<String>,
) -> Result<AuthMechanism> {
    match (username, password) {
        (Some(username), Some(password)) => Ok(AuthMechanism::Password {
            username,
            password,
            auth_source: auth_source.filter(|s| !s.is_empty()),
        }),
        _ => Err(MongoSqlError::Configuration(
            "Username and password are required for password authentication".to_string(),
        )),
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(MongoSqlError::Configuration(format!(
            "Invalid boolean for {}: {}",
            name, other
        ))),
    }
}

fn parse_millis(value: Option<String>) -> Result<Option<Duration>> {
    value
        .map(|v| {
            v.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| MongoSqlError::Configuration(format!("Invalid timeout: {}", v)))
        })
        .transpose()
}

#[cfg(test)]
mod tests;
