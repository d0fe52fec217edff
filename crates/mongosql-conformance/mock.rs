//! In-memory connection and establisher for exercising the runner offline.

use async_trait::async_trait;
use mongosql_core::{
    ConnectError, Connection, ConnectionConfig, ConnectionResult, ErrorKind, Establisher,
    MongoSqlError, Result, ResultSet, SqlDialect,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Canned reply for one statement
#[derive(Debug, Clone)]
pub enum Reply {
    Rows(ResultSet),
    Error(ErrorKind, Vec<String>),
}

/// Connection answering statements from a fixed table
pub struct MockConnection {
    database: String,
    replies: Arc<HashMap<String, Reply>>,
    closed: AtomicBool,
    delay: Duration,
    tracker: Arc<Tracker>,
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    fn database(&self) -> &str {
        &self.database
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::MongoSql
    }

    async fn query(&self, sql: &str) -> Result<ResultSet> {
        if self.is_closed() {
            return Err(MongoSqlError::Closed);
        }
        let running = self.tracker.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.tracker.peak.fetch_max(running, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.tracker.running.fetch_sub(1, Ordering::SeqCst);
        self.tracker.queries.fetch_add(1, Ordering::SeqCst);

        match self.replies.get(sql) {
            Some(Reply::Rows(result)) => Ok(result.clone()),
            Some(Reply::Error(kind, messages)) => {
                let chain = mongosql_core::CauseChain::from_messages(messages.clone());
                let message = messages.first().cloned().unwrap_or_default();
                Err(MongoSqlError::Classified(ConnectError::with_chain(
                    *kind, message, chain,
                )))
            }
            None => Err(MongoSqlError::Unsupported(format!("no reply for {}", sql))),
        }
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.tracker.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Counters shared by every connection of one establisher
#[derive(Debug, Default)]
pub struct Tracker {
    pub established: AtomicUsize,
    pub closed: AtomicUsize,
    pub queries: AtomicUsize,
    running: AtomicUsize,
    pub peak: AtomicUsize,
    pub databases: Mutex<Vec<String>>,
}

/// Establisher handing out [`MockConnection`]s
pub struct MockEstablisher {
    replies: Arc<HashMap<String, Reply>>,
    refuse: Option<String>,
    delay: Duration,
    pub tracker: Arc<Tracker>,
}

impl MockEstablisher {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(HashMap::new()),
            refuse: None,
            delay: Duration::ZERO,
            tracker: Arc::new(Tracker::default()),
        }
    }

    pub fn reply(mut self, sql: &str, reply: Reply) -> Self {
        Arc::make_mut(&mut self.replies).insert(sql.to_string(), reply);
        self
    }

    /// Refuse connections to this database
    pub fn refuse(mut self, database: &str) -> Self {
        self.refuse = Some(database.to_string());
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Establisher for MockEstablisher {
    fn id(&self) -> &'static str {
        "mock"
    }

    async fn establish(&self, config: &ConnectionConfig) -> ConnectionResult {
        if let Ok(mut databases) = self.tracker.databases.lock() {
            databases.push(config.database.clone());
        }
        if self.refuse.as_deref() == Some(config.database.as_str()) {
            return ConnectionResult::Failed(ConnectError::new(
                ErrorKind::AuthenticationRejected,
                "Authentication failed. Verify that the credentials are correct.",
            ));
        }

        self.tracker.established.fetch_add(1, Ordering::SeqCst);
        ConnectionResult::Established(Arc::new(MockConnection {
            database: config.database.clone(),
            replies: self.replies.clone(),
            closed: AtomicBool::new(false),
            delay: self.delay,
            tracker: self.tracker.clone(),
        }))
    }
}
