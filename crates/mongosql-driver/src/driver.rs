//! MongoSQL connection establisher

use crate::classify;
use crate::cluster::ClusterType;
use crate::connection::MongoSqlConnection;
use crate::credentials::ClientIdentity;
use crate::jaas::JaasConfig;
use crate::tls::TlsMaterial;
use async_trait::async_trait;
use bson::doc;
use mongodb::Client;
use mongodb::options::{
    AuthMechanism as DriverMechanism, ClientOptions, Credential, ServerAddress,
};
use mongosql_core::{
    AuthMechanism, Connection, ConnectionConfig, ConnectionProperties, ConnectionResult,
    Discovery, Establisher, MongoSqlError, Result,
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use std::sync::Arc;
use tracing::{debug, info, warn};

const EXTERNAL_AUTH_SOURCE: &str = "$external";
const GSSAPI_SERVICE_NAME: &str = "mongodb";

/// MongoSQL connection establisher
///
/// Opens connections to clusters that can run SQL: Atlas Data Federation
/// and Enterprise servers. Every attempt is bounded by the configured
/// handshake timeout.
pub struct MongoSqlDriver;

impl MongoSqlDriver {
    /// Create a new MongoSQL driver instance
    pub fn new() -> Self {
        debug!("MongoSQL driver initialized");
        Self
    }

    /// Open a connection without the handshake bound
    pub async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
        Ok(Arc::new(self.open(config).await?))
    }

    /// Open a concrete connection without the handshake bound
    ///
    /// Temporary TLS material is released when this returns, and a client
    /// that was created is shut down on every failure path.
    pub async fn open(&self, config: &ConnectionConfig) -> Result<MongoSqlConnection> {
        config.validate()?;

        let identity = match &config.mechanism {
            AuthMechanism::X509 { source, passphrase } => {
                let identity = ClientIdentity::load(source, passphrase.as_deref())?;
                debug!(subject = %identity.subject(), "resolved X.509 identity");
                Some(identity)
            }
            _ => None,
        };
        let material = TlsMaterial::build(&config.tls, identity.as_ref())?;

        let options = client_options(config, &material).await?;
        let client = Client::with_options(options)
            .map_err(|e| classify::connect_error("Failed to create MongoDB client", &e))?;

        let reply = match client
            .database("admin")
            .run_command(doc! { "buildInfo": 1 })
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                let err = classify::connect_error("Failed to connect to MongoDB", &e);
                client.shutdown().await;
                return Err(err.into());
            }
        };
        drop(material);

        let cluster = ClusterType::from_build_info(&reply);
        if !cluster.supports_sql() {
            client.shutdown().await;
            return Err(MongoSqlError::Unsupported(format!(
                "SQL queries require Atlas Data Federation or MongoDB Enterprise, found a {} cluster",
                cluster
            )));
        }

        info!(%cluster, database = %config.database, "connection established");
        Ok(MongoSqlConnection::new(
            client,
            config.database.clone(),
            config.dialect,
            cluster,
        ))
    }
}

impl Default for MongoSqlDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Establisher for MongoSqlDriver {
    fn id(&self) -> &'static str {
        "mongosql"
    }

    #[tracing::instrument(skip(self, config), fields(mechanism = config.mechanism.name(), database = %config.database))]
    async fn establish(&self, config: &ConnectionConfig) -> ConnectionResult {
        let bound = config.handshake_timeout();
        match tokio::time::timeout(bound, self.connect(config)).await {
            Ok(Ok(conn)) => ConnectionResult::Established(conn),
            Ok(Err(err)) => {
                let err = err.into_connect_error();
                warn!(kind = %err.kind, error = %err.message, "connection attempt failed");
                ConnectionResult::Failed(err)
            }
            Err(_) => {
                warn!(timeout = ?bound, "handshake timed out");
                ConnectionResult::Failed(classify::timeout_error(bound))
            }
        }
    }
}

/// Parse a URI and properties, then establish a connection
///
/// Configuration problems come back as `Failed(ConfigurationInvalid)`
/// without any network activity.
pub async fn establish(uri: &str, props: &ConnectionProperties) -> ConnectionResult {
    match ConnectionConfig::from_uri(uri, props) {
        Ok(config) => MongoSqlDriver::new().establish(&config).await,
        Err(err) => {
            let err = err.into_connect_error();
            warn!(error = %err.message, "invalid connection configuration");
            ConnectionResult::Failed(err)
        }
    }
}

/// Build driver options for a validated config
///
/// SRV discovery resolves the seed list here, so this runs inside the
/// handshake bound.
pub async fn client_options(
    config: &ConnectionConfig,
    material: &TlsMaterial,
) -> Result<ClientOptions> {
    let mut options = match &config.discovery {
        Discovery::Direct { hosts } => {
            let mut options = ClientOptions::default();
            options.hosts = hosts
                .iter()
                .map(|h| ServerAddress::Tcp {
                    host: h.host.clone(),
                    port: Some(h.port_or_default()),
                })
                .collect();
            options
        }
        Discovery::Srv { host } => {
            debug!(host, "resolving SRV seed list");
            ClientOptions::parse(srv_seed_uri(host, &config.mechanism).as_str())
                .await
                .map_err(|e| classify::connect_error("Failed to resolve SRV record", &e))?
        }
    };

    let resolved_source = options.credential.as_ref().and_then(|c| c.source.clone());
    options.credential = credential(&config.mechanism)?.map(|mut credential| {
        if credential.source.is_none() {
            credential.source = resolved_source;
        }
        credential
    });
    options.tls = Some(material.tls());
    options.connect_timeout = Some(config.connect_timeout);
    options.server_selection_timeout = Some(config.server_selection_timeout);
    options.app_name = config.app_name.clone();
    Ok(options)
}

/// URI handed to the driver for SRV resolution
///
/// Password credentials ride along so an `authSource` from the TXT record
/// is applied to them; the driver ignores that record without a credential.
pub fn srv_seed_uri(host: &str, mechanism: &AuthMechanism) -> String {
    match mechanism {
        AuthMechanism::Password {
            username, password, ..
        } => format!(
            "mongodb+srv://{}:{}@{}/",
            utf8_percent_encode(username, NON_ALPHANUMERIC),
            utf8_percent_encode(password, NON_ALPHANUMERIC),
            host
        ),
        _ => format!("mongodb+srv://{}/", host),
    }
}

/// Driver credential for a mechanism
///
/// GSSAPI reads its JAAS config here; the context's principal becomes the
/// username unless one was configured.
pub fn credential(mechanism: &AuthMechanism) -> Result<Option<Credential>> {
    let mut credential = Credential::default();
    match mechanism {
        AuthMechanism::None => return Ok(None),
        AuthMechanism::Password {
            username,
            password,
            auth_source,
        } => {
            credential.username = Some(username.clone());
            credential.password = Some(password.clone());
            credential.source = auth_source.clone();
        }
        AuthMechanism::X509 { .. } => {
            credential.mechanism = Some(DriverMechanism::MongoDbX509);
            credential.source = Some(EXTERNAL_AUTH_SOURCE.to_string());
        }
        AuthMechanism::Gssapi {
            jaas_config_path,
            login_context_name,
            server_auth,
            username,
        } => {
            let jaas = JaasConfig::load(jaas_config_path)?;
            let context = jaas.context(login_context_name)?;
            let principal = username
                .clone()
                .or_else(|| context.principal().map(str::to_string));
            debug!(context = %context.name, principal = ?principal, "using JAAS login context");

            let mut properties = doc! { "SERVICE_NAME": GSSAPI_SERVICE_NAME };
            if *server_auth {
                properties.insert("CANONICALIZE_HOST_NAME", true);
            }

            credential.mechanism = Some(DriverMechanism::Gssapi);
            credential.source = Some(EXTERNAL_AUTH_SOURCE.to_string());
            credential.username = principal;
            credential.mechanism_properties = Some(properties);
        }
    }
    Ok(Some(credential))
}
