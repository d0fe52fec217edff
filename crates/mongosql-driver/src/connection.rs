//! Established MongoSQL connection

use crate::classify;
use crate::cluster::ClusterType;
use crate::schema::ResultSchema;
use async_trait::async_trait;
use bson::{Document, doc};
use futures::TryStreamExt;
use mongodb::Client;
use mongosql_core::{
    Connection, MongoSqlError, Result, ResultSet, Row, SqlDialect,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Connection wrapper implementing the Connection trait
///
/// Owns the `mongodb` client it was established with. Closing shuts the
/// client down.
pub struct MongoSqlConnection {
    client: Client,
    database: String,
    dialect: SqlDialect,
    cluster: ClusterType,
    closed: AtomicBool,
}

impl MongoSqlConnection {
    pub fn new(client: Client, database: String, dialect: SqlDialect, cluster: ClusterType) -> Self {
        Self {
            client,
            database,
            dialect,
            cluster,
            closed: AtomicBool::new(false),
        }
    }

    /// Deployment type detected during the handshake
    pub fn cluster(&self) -> ClusterType {
        self.cluster
    }

    /// Get the MongoDB client
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn db(&self) -> mongodb::Database {
        self.client.database(&self.database)
    }

    fn ensure_not_closed(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(MongoSqlError::Closed);
        }
        Ok(())
    }

    /// Build the `$sql` aggregation stage for a statement
    pub fn sql_stage(sql: &str, dialect: SqlDialect) -> Document {
        let mut stage = doc! { "statement": sql };
        if dialect == SqlDialect::MySql {
            stage.insert("dialect", dialect.as_str());
            stage.insert("formatVersion", 2);
        }
        doc! { "$sql": stage }
    }

    /// Build the `sqlGetResultSchema` command for a statement
    pub fn schema_command(sql: &str) -> Document {
        doc! {
            "sqlGetResultSchema": 1,
            "query": sql,
            "schemaVersion": 1,
        }
    }

    /// Build a database-level pipeline that yields `documents` as its input
    pub fn documents_pipeline(documents: Vec<Document>) -> Vec<Document> {
        vec![doc! { "$documents": documents }]
    }

    /// Run a `$documents` aggregate on the connection's database
    ///
    /// Servers without the stage reject it with the stage name in the
    /// error, which ends up in the cause chain.
    pub async fn documents(&self, documents: Vec<Document>) -> Result<Vec<Document>> {
        self.ensure_not_closed()?;
        debug!(count = documents.len(), "running $documents aggregate");

        let cursor = self
            .db()
            .aggregate(Self::documents_pipeline(documents))
            .await
            .map_err(|e| classify::connect_error("Failed to execute query", &e))?;
        cursor
            .try_collect()
            .await
            .map_err(|e| classify::connect_error("Failed to read query results", &e).into())
    }

    async fn result_schema(&self, sql: &str) -> Result<ResultSchema> {
        let reply = self
            .db()
            .run_command(Self::schema_command(sql))
            .await
            .map_err(|e| classify::connect_error("Failed to get result schema", &e))?;
        ResultSchema::from_command_response(&reply, &self.database)
    }

    async fn rows(&self, sql: &str, schema: &ResultSchema) -> Result<Vec<Row>> {
        let mut cursor = self
            .db()
            .aggregate(vec![Self::sql_stage(sql, self.dialect)])
            .await
            .map_err(|e| classify::connect_error("Failed to execute query", &e))?;

        let mut rows = Vec::new();
        while let Some(doc) = cursor
            .try_next()
            .await
            .map_err(|e| classify::connect_error("Failed to read query results", &e))?
        {
            rows.push(schema.row_from_document(&doc));
        }
        Ok(rows)
    }
}

#[async_trait]
impl Connection for MongoSqlConnection {
    fn driver_name(&self) -> &str {
        "mongosql"
    }

    fn database(&self) -> &str {
        &self.database
    }

    fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    #[tracing::instrument(skip(self, sql), fields(database = %self.database, dialect = %self.dialect))]
    async fn query(&self, sql: &str) -> Result<ResultSet> {
        self.ensure_not_closed()?;
        debug!(sql, "running query");

        let start = Instant::now();
        let schema = self.result_schema(sql).await?;
        let rows = self.rows(sql, &schema).await?;

        let mut result = ResultSet::new(schema.into_columns(), rows);
        result.execution_time_ms = saturating_millis(start.elapsed());
        debug!(
            rows = result.row_count(),
            columns = result.column_count(),
            elapsed_ms = result.execution_time_ms,
            "query complete"
        );
        Ok(result)
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!(database = %self.database, "closing connection");
        self.client.clone().shutdown().await;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Whole milliseconds in `elapsed`, saturating at `u64::MAX`
pub(crate) fn saturating_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
