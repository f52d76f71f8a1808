use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::{Client, NoTls};
use tracing::{error, info, warn};

use super::{
    ActionRecord, ActionTally, MetricRecord, MetricSummary, QueryDescriptor, RegisteredIndex,
    StorageEngine,
};
use crate::analyzer::ExplainOutput;
use crate::config::{IndexConfig, PostgresConfig};
use crate::decision::IndexType;
use crate::error::{Result, TuneError};
use crate::executor::IndexSpec;

/// pgvector-backed storage engine.
///
/// Registry and log tables live in `schema`; the managed indexes live in the
/// schema of the indexed table.
pub struct PostgresEngine {
    client: Client,
    schema: String,
    index_schema: String,
}

fn query_err(e: tokio_postgres::Error) -> TuneError {
    TuneError::Query(e.to_string())
}

fn action_err(e: tokio_postgres::Error) -> TuneError {
    TuneError::Action(e.to_string())
}

/// pgvector text literal, bound as `$1::text::vector`.
fn vector_literal(embedding: &[f32]) -> String {
    let parts: Vec<String> = embedding.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}

fn drop_statement(index_schema: &str, name: &str) -> String {
    format!("DROP INDEX IF EXISTS {}.{}", index_schema, name)
}

impl PostgresEngine {
    /// Connect and spawn the connection driver task.
    pub async fn connect(config: &PostgresConfig, index: &IndexConfig) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(&config.connection_string(), NoTls)
            .await
            .map_err(|e| TuneError::Config(format!("PostgreSQL connection failed: {}", e)))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("PostgreSQL connection error: {}", e);
            }
        });

        info!(host = %config.host, dbname = %config.dbname, "Database connected");
        Ok(Self {
            client,
            schema: config.schema.clone(),
            index_schema: index.schema().to_string(),
        })
    }

    /// Create the registry and log tables if they are missing.
    pub async fn ensure_schema(&self) -> Result<()> {
        let schema = &self.schema;
        let ddl = format!(
            "CREATE SCHEMA IF NOT EXISTS {schema};
             CREATE TABLE IF NOT EXISTS {schema}.query_metrics (
                 id BIGSERIAL PRIMARY KEY,
                 query_type TEXT,
                 execution_time_ms DOUBLE PRECISION,
                 index_used BOOLEAN,
                 rows_scanned BIGINT,
                 query_plan JSONB,
                 timestamp TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
             );
             CREATE TABLE IF NOT EXISTS {schema}.agent_actions (
                 id BIGSERIAL PRIMARY KEY,
                 action_type TEXT,
                 reasoning TEXT,
                 sql_executed TEXT,
                 success BOOLEAN,
                 impact_metrics JSONB,
                 timestamp TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
             );
             CREATE TABLE IF NOT EXISTS {schema}.index_registry (
                 index_name TEXT PRIMARY KEY,
                 table_name TEXT,
                 index_type TEXT,
                 metadata JSONB,
                 created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
             );"
        );
        self.client.batch_execute(&ddl).await.map_err(query_err)
    }

    async fn register(&self, spec: &IndexSpec) -> Result<()> {
        let sql = format!(
            "INSERT INTO {}.index_registry (index_name, table_name, index_type, metadata)
             VALUES ($1, $2, $3, $4::text::jsonb)
             ON CONFLICT (index_name) DO UPDATE SET created_at = CURRENT_TIMESTAMP",
            self.schema
        );
        let table = spec.table.rsplit('.').next().unwrap_or(&spec.table);
        let metadata = serde_json::json!({ "auto_created": true }).to_string();
        self.client
            .execute(
                &sql,
                &[&spec.name, &table, &spec.index_type().as_str(), &metadata],
            )
            .await
            .map(|_| ())
            .map_err(query_err)
    }
}

#[async_trait]
impl StorageEngine for PostgresEngine {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn explain_analyze(
        &self,
        query: &QueryDescriptor,
        embedding: &[f32],
    ) -> Result<ExplainOutput> {
        if embedding.is_empty() {
            return Err(TuneError::Query("No embedding provided".to_string()));
        }
        let sql = format!(
            "EXPLAIN (ANALYZE, FORMAT JSON) SELECT content, metadata FROM {} \
             ORDER BY {} <-> $1::text::vector LIMIT {}",
            query.table, query.column, query.limit
        );
        let row = self
            .client
            .query_one(&sql, &[&vector_literal(embedding)])
            .await
            .map_err(query_err)?;
        let document: serde_json::Value = row.try_get(0).map_err(query_err)?;
        ExplainOutput::from_value(document)
    }

    async fn index_exists(&self, name: &str) -> Result<bool> {
        let row = self
            .client
            .query_one(
                "SELECT COUNT(*) FROM pg_indexes WHERE schemaname = $1 AND indexname = $2",
                &[&self.index_schema, &name],
            )
            .await
            .map_err(query_err)?;
        let count: i64 = row.try_get(0).map_err(query_err)?;
        Ok(count > 0)
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        self.client
            .batch_execute(&spec.to_sql())
            .await
            .map_err(action_err)?;

        // The index exists at this point; a stale registry is only cosmetic.
        if let Err(e) = self.register(spec).await {
            warn!(index = %spec.name, error = %e, "Failed to register index");
        }
        Ok(())
    }

    async fn cancel_running(&self) -> Result<()> {
        warn!("Cancelling the running statement");
        self.client
            .cancel_token()
            .cancel_query(NoTls)
            .await
            .map_err(query_err)
    }

    async fn drop_index(&self, name: &str) -> Result<bool> {
        let existed = self.index_exists(name).await?;
        self.client
            .batch_execute(&drop_statement(&self.index_schema, name))
            .await
            .map_err(action_err)?;
        Ok(existed)
    }

    async fn append_metric_log(&self, record: &MetricRecord) -> Result<()> {
        let sql = format!(
            "INSERT INTO {}.query_metrics
             (query_type, execution_time_ms, index_used, rows_scanned, query_plan)
             VALUES ($1, $2::float8, $3::bool, $4::int8, $5::text::jsonb)",
            self.schema
        );
        let plan = serde_json::json!({ "scan_type": record.scan_kind }).to_string();
        let rows_scanned = i64::try_from(record.rows_scanned).unwrap_or(i64::MAX);
        self.client
            .execute(
                &sql,
                &[
                    &record.query_type,
                    &record.execution_time_ms,
                    &record.index_used,
                    &rows_scanned,
                    &plan,
                ],
            )
            .await
            .map(|_| ())
            .map_err(query_err)
    }

    async fn append_action_log(&self, record: &ActionRecord) -> Result<()> {
        let sql = format!(
            "INSERT INTO {}.agent_actions
             (action_type, reasoning, sql_executed, success, impact_metrics)
             VALUES ($1, $2, $3, $4, $5::text::jsonb)",
            self.schema
        );
        let impact = serde_json::to_string(&record.impact)?;
        self.client
            .execute(
                &sql,
                &[
                    &record.action.as_str(),
                    &record.reasoning,
                    &record.statement,
                    &record.success,
                    &impact,
                ],
            )
            .await
            .map(|_| ())
            .map_err(query_err)
    }

    async fn registered_indexes(&self) -> Result<Vec<RegisteredIndex>> {
        let sql = format!(
            "SELECT index_name, table_name, index_type, created_at::timestamptz
             FROM {}.index_registry ORDER BY index_name",
            self.schema
        );
        let rows = self.client.query(&sql, &[]).await.map_err(query_err)?;
        let mut indexes = Vec::with_capacity(rows.len());
        for row in rows {
            let index_type: String = row.try_get(2).map_err(query_err)?;
            let index_type = match index_type.as_str() {
                "hnsw" => IndexType::Hnsw,
                "ivfflat" => IndexType::Ivfflat,
                other => {
                    warn!(index_type = other, "Skipping registry entry with unknown type");
                    continue;
                }
            };
            let created_at: DateTime<Utc> = row.try_get(3).map_err(query_err)?;
            indexes.push(RegisteredIndex {
                index_name: row.try_get(0).map_err(query_err)?,
                table_name: row.try_get(1).map_err(query_err)?,
                index_type,
                created_at,
            });
        }
        Ok(indexes)
    }

    async fn clear_registry(&self) -> Result<u64> {
        let sql = format!("DELETE FROM {}.index_registry", self.schema);
        self.client.execute(&sql, &[]).await.map_err(query_err)
    }

    async fn action_summary(&self) -> Result<Vec<ActionTally>> {
        let sql = format!(
            "SELECT action_type, COUNT(*), COUNT(*) FILTER (WHERE success)
             FROM {}.agent_actions GROUP BY action_type ORDER BY action_type",
            self.schema
        );
        let rows = self.client.query(&sql, &[]).await.map_err(query_err)?;
        rows.iter()
            .map(|row| {
                let total: i64 = row.try_get(1).map_err(query_err)?;
                let successful: i64 = row.try_get(2).map_err(query_err)?;
                Ok(ActionTally {
                    action_type: row.try_get(0).map_err(query_err)?,
                    total: total.max(0) as u64,
                    successful: successful.max(0) as u64,
                })
            })
            .collect()
    }

    async fn metric_summary(&self) -> Result<MetricSummary> {
        let sql = format!(
            "SELECT COUNT(*), AVG(execution_time_ms)::float8,
                    MIN(execution_time_ms)::float8, MAX(execution_time_ms)::float8
             FROM {}.query_metrics",
            self.schema
        );
        let row = self.client.query_one(&sql, &[]).await.map_err(query_err)?;
        let count: i64 = row.try_get(0).map_err(query_err)?;
        Ok(MetricSummary {
            query_count: count.max(0) as u64,
            avg_execution_ms: row.try_get(1).map_err(query_err)?,
            min_execution_ms: row.try_get(2).map_err(query_err)?,
            max_execution_ms: row.try_get(3).map_err(query_err)?,
        })
    }
}
