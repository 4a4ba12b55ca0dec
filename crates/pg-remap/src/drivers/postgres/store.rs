//! PostgreSQL implementation of [`TextStore`].
//!
//! Uses deadpool-postgres for connection pooling. A column scan streams rows
//! over one pooled connection with `query_raw`, holding that connection until
//! the stream is dropped; updates check out their own connection.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use futures::future;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tokio_postgres::Config as PgConfig;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::core::identifier::validate_type_name;
use crate::core::schema::{
    readonly_trigger_name, ColumnDescriptor, KeyColumn, KeyPart, RowKey, SchemaSnapshot,
    StoredRow,
};
use crate::core::traits::{RowFilter, TextStore};
use crate::drivers::common::TlsBuilder;
use crate::error::{RemapError, Result};

use super::sql::{
    build_scan_query, build_update_query, key_width, PRIMARY_KEYS_SQL, READONLY_TRIGGERS_SQL,
    ROW_ID_COLUMN, TEXT_COLUMNS_SQL,
};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a connectivity check.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthCheckResult {
    pub connected: bool,
    pub latency_ms: u64,
    pub server_version: Option<String>,
    pub error: Option<String>,
}

/// PostgreSQL text store.
pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    /// Build the pool from configuration and verify one connection.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.application_name("pg-remap");
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        pg_config.connect_timeout(POOL_CONNECTION_TIMEOUT);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let mgr = match TlsBuilder::parse(&config.ssl_mode)?.build()? {
            Some(tls) => Manager::from_config(pg_config, tls, mgr_config),
            None => Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config),
        };

        let pool = Pool::builder(mgr)
            .max_size(config.max_connections)
            .build()
            .map_err(|e| RemapError::pool(e, "creating PostgreSQL pool"))?;

        let store = Self { pool };
        let client = store.client("testing PostgreSQL connection").await?;
        client.simple_query("SELECT 1").await?;

        info!("Connected to PostgreSQL: {}", config.display_target());
        Ok(store)
    }

    async fn client(&self, context: &str) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| RemapError::pool(e, context))
    }

    /// Check the connection and report latency and server version.
    pub async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();
        let check = async {
            let client = self.client("health check").await?;
            let row = client.query_one("SHOW server_version", &[]).await?;
            Ok::<String, RemapError>(row.get(0))
        };

        match check.await {
            Ok(version) => HealthCheckResult {
                connected: true,
                latency_ms: start.elapsed().as_millis() as u64,
                server_version: Some(version),
                error: None,
            },
            Err(e) => HealthCheckResult {
                connected: false,
                latency_ms: start.elapsed().as_millis() as u64,
                server_version: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// Close the connection pool.
    pub fn close(&self) {
        self.pool.close();
    }

    async fn load_key_columns(
        &self,
        client: &Object,
        schema: &str,
    ) -> Result<HashMap<String, Vec<KeyColumn>>> {
        let rows = client.query(PRIMARY_KEYS_SQL, &[&schema]).await?;
        collect_key_columns(rows.iter().map(|row| (row.get(0), row.get(1), row.get(2))))
    }

    async fn load_readonly_triggers(
        &self,
        client: &Object,
        schema: &str,
    ) -> Result<HashSet<String>> {
        let rows = client.query(READONLY_TRIGGERS_SQL, &[&schema]).await?;
        Ok(rows.into_iter().map(|r| r.get::<_, String>(0)).collect())
    }
}

/// Group primary key columns by table, in key order.
///
/// Key types are spliced into every update as `CAST(.. AS <type>)`, so an
/// unexpected one fails here, before anything is written.
fn collect_key_columns(
    rows: impl IntoIterator<Item = (String, String, String)>,
) -> Result<HashMap<String, Vec<KeyColumn>>> {
    let mut keys: HashMap<String, Vec<KeyColumn>> = HashMap::new();
    for (table, column, sql_type) in rows {
        validate_type_name(&sql_type)?;
        keys.entry(table)
            .or_default()
            .push(KeyColumn::new(column, sql_type));
    }
    Ok(keys)
}

/// Split a scanned row into its key and value.
fn stored_row(column: &ColumnDescriptor, row: &tokio_postgres::Row) -> Result<StoredRow> {
    let width = key_width(column);
    let mut parts = Vec::with_capacity(width);

    if column.uses_row_id() {
        parts.push(KeyPart {
            column: ROW_ID_COLUMN.to_string(),
            value: row.try_get(0)?,
        });
    } else {
        for (i, key) in column.key_columns.iter().enumerate() {
            parts.push(KeyPart {
                column: key.name.clone(),
                value: row.try_get(i)?,
            });
        }
    }

    Ok(StoredRow {
        key: RowKey::new(parts),
        value: row.try_get(width)?,
    })
}

/// Map the server's "value too long" error onto the row that caused it.
fn map_write_error(
    err: tokio_postgres::Error,
    column: &ColumnDescriptor,
    key: &RowKey,
    value: &str,
) -> RemapError {
    if err.code() == Some(&SqlState::STRING_DATA_RIGHT_TRUNCATION) {
        return RemapError::ColumnLengthViolation {
            table: column.table.clone(),
            column: column.name.clone(),
            key: key.to_string(),
            max_length: column.max_length.unwrap_or(0),
            actual_length: value.chars().count(),
        };
    }
    RemapError::Database(err)
}

#[async_trait]
impl TextStore for PostgresStore {
    async fn snapshot(&self, schema: &str) -> Result<SchemaSnapshot> {
        let client = self.client("introspecting text columns").await?;

        let introspect = async {
            let keys = self.load_key_columns(&client, schema).await?;
            let triggers = self.load_readonly_triggers(&client, schema).await?;
            let rows = client.query(TEXT_COLUMNS_SQL, &[&schema]).await?;
            Ok::<_, RemapError>((keys, triggers, rows))
        };
        let (keys, triggers, rows) = introspect.await.map_err(|e| match e {
            e @ RemapError::SchemaIntrospection(_) => e,
            e => RemapError::SchemaIntrospection(e.to_string()),
        })?;

        let mut columns = Vec::with_capacity(rows.len());
        let mut per_table: BTreeMap<String, usize> = BTreeMap::new();
        for row in rows {
            let table: String = row.get(0);
            let name: String = row.get(1);
            let max_length = row
                .get::<_, Option<i32>>(3)
                .and_then(|n| usize::try_from(n).ok());
            let read_only = triggers.contains(&readonly_trigger_name(&table, &name));

            *per_table.entry(table.clone()).or_default() += 1;
            columns.push(ColumnDescriptor {
                schema: schema.to_string(),
                key_columns: keys.get(&table).cloned().unwrap_or_default(),
                table,
                name,
                data_type: row.get(2),
                max_length,
                read_only,
            });
        }

        for (table, count) in &per_table {
            if !keys.contains_key(table) {
                debug!(
                    "Table {} has no primary key; its {} text columns are addressed by ctid",
                    table, count
                );
            }
        }

        info!(
            "Introspected {} text columns in {} tables of schema '{}' ({} read-only markers)",
            columns.len(),
            per_table.len(),
            schema,
            triggers.len()
        );
        Ok(SchemaSnapshot::new(schema, columns))
    }

    async fn scan_column<'a>(
        &'a self,
        column: &'a ColumnDescriptor,
        filter: &'a dyn RowFilter,
    ) -> Result<BoxStream<'a, Result<StoredRow>>> {
        let client = self.client("scanning column").await?;
        let prefilter = filter.prefilter();
        let query = build_scan_query(column, prefilter.is_some())?;
        debug!("Scan query: {}", query);

        let params: Vec<&(dyn ToSql + Sync)> = match prefilter {
            Some(ref needle) => vec![needle as &(dyn ToSql + Sync)],
            None => Vec::new(),
        };

        let raw = client
            .query_raw(query.as_str(), params.iter().map(|p| *p as &dyn ToSql))
            .await?;

        // The connection travels with the stream and returns to the pool
        // when the caller drops it.
        let rows = stream::try_unfold((client, Box::pin(raw)), |(client, mut raw)| async move {
            match raw.try_next().await {
                Ok(Some(row)) => Ok(Some((row, (client, raw)))),
                Ok(None) => Ok(None),
                Err(e) => Err(RemapError::from(e)),
            }
        })
        .and_then(move |row| future::ready(stored_row(column, &row)))
        .try_filter(move |stored| future::ready(filter.is_match(&stored.value)));

        Ok(rows.boxed())
    }

    async fn write_value(
        &self,
        column: &ColumnDescriptor,
        key: &RowKey,
        value: &str,
    ) -> Result<u64> {
        let query = build_update_query(column)?;
        let client = self.client("writing row").await?;

        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(key.parts.len() + 1);
        params.push(&value);
        for part in &key.parts {
            params.push(&part.value);
        }

        client
            .execute(query.as_str(), &params)
            .await
            .map_err(|e| map_write_error(e, column, key, value))
    }

    fn store_type(&self) -> &'static str {
        "postgres"
    }
}
