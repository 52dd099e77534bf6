//! # Tickerscope Warehouse
//!
//! DuckDB persistence for completed runs.
//!
//! ## Overview
//!
//! [`Warehouse`] implements the core [`RecordSink`] contract: every run is
//! written in one transaction, one `runs` row plus one `instrument_snapshots`
//! row per instrument. Snapshots are keyed by symbol and quote date, so a later
//! run on the same day replaces the earlier snapshot. A failed fetch never
//! replaces a stored snapshot.
//!
//! Stored runs can be inspected with guardrailed, read-only SQL:
//!
//! ```rust,no_run
//! use tickerscope_warehouse::{QueryGuardrails, Warehouse};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!     let result = warehouse.execute_query(
//!         "SELECT symbol, signal_summary FROM vw_signal_board ORDER BY symbol",
//!         QueryGuardrails::default(),
//!     )?;
//!     println!("{} rows", result.row_count);
//!     Ok(())
//! }
//! ```
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `runs` | One row per run with summary counts and FX rate |
//! | `instrument_snapshots` | Latest snapshot per symbol and quote date |
//! | `schema_migrations` | Applied migration versions |
//!
//! ## Views
//!
//! | View | Description |
//! |------|-------------|
//! | `vw_latest_snapshots` | Newest snapshot per symbol |
//! | `vw_signal_board` | Signals and sentiment of the newest successful snapshots |
//! | `vw_run_history` | Runs with failure share, newest first |

pub mod duckdb;
pub mod migrations;
pub mod models;
pub mod views;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use ::duckdb::types::Value as DuckValue;
use ::duckdb::Connection;
use ::duckdb::ToSql;
use serde::Serialize;
use serde_json::{Number, Value};
use thiserror::Error;
use tickerscope_core::{RecordSink, RunReport, SinkError};
use tracing::{debug, info};

pub use duckdb::{AccessMode, ConnectionPool, PooledConnection};
pub use models::{RunRow, SnapshotRow};

use models::snapshot_insert_sql;

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to serialize snapshot column: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("query rejected: {0}")]
    QueryRejected(String),

    #[error("query timed out after {timeout_ms}ms")]
    QueryTimeout { timeout_ms: u64 },
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for tickerscope data.
    pub tickerscope_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle reader connections kept by the pool.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        let tickerscope_home = resolve_tickerscope_home();
        let db_path = tickerscope_home.join("warehouse.duckdb");
        Self {
            tickerscope_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

impl WarehouseConfig {
    /// Default configuration with the database file moved to `db_path`.
    pub fn with_db_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }
}

/// Limits applied to ad-hoc queries.
#[derive(Debug, Clone, Copy)]
pub struct QueryGuardrails {
    pub max_rows: usize,
    pub query_timeout_ms: u64,
}

impl Default for QueryGuardrails {
    fn default() -> Self {
        Self {
            max_rows: 10_000,
            query_timeout_ms: 5_000,
        }
    }
}

impl QueryGuardrails {
    fn timeout(self) -> Duration {
        Duration::from_millis(self.query_timeout_ms.max(1))
    }

    fn validate(self) -> Result<(), WarehouseError> {
        if self.max_rows == 0 {
            return Err(WarehouseError::QueryRejected(String::from(
                "--max-rows must be greater than zero",
            )));
        }
        if self.query_timeout_ms == 0 {
            return Err(WarehouseError::QueryRejected(String::from(
                "--query-timeout-ms must be greater than zero",
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SqlColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub r#type: String,
}

/// Rows of an ad-hoc query as JSON values.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub columns: Vec<SqlColumn>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    /// True when rows beyond `max_rows` were dropped.
    pub truncated: bool,
}

/// Outcome of persisting one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub run_id: String,
    /// Snapshot rows inserted or replaced.
    pub snapshots_written: usize,
    /// Failed records skipped because a snapshot already exists for that day.
    pub snapshots_kept: usize,
}

#[derive(Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    pool: ConnectionPool,
}

impl Warehouse {
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open the database file, creating its directory, schema and views as needed.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let pool = ConnectionPool::new(config.db_path.clone(), config.max_pool_size);
        let warehouse = Self { config, pool };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.pool.acquire(AccessMode::ReadWrite)?;
        migrations::apply_migrations(&connection)?;
        views::create_views(&connection)?;
        Ok(())
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    pub fn db_path(&self) -> &Path {
        self.pool.db_path()
    }

    /// Run a single read-only statement within `guardrails`.
    pub fn execute_query(
        &self,
        sql: &str,
        guardrails: QueryGuardrails,
    ) -> Result<QueryResult, WarehouseError> {
        guardrails.validate()?;
        let sql = normalize_sql(sql)?;
        enforce_read_only_query(sql)?;

        let connection = self.pool.acquire(AccessMode::ReadOnly)?;
        execute_select_query(&connection, sql, guardrails, Instant::now())
    }

    /// Persist `report` in one transaction.
    ///
    /// All values are bound as parameters. Successful records replace any
    /// snapshot for the same symbol and quote date; failed records, dated by
    /// the run start, are only inserted when no snapshot exists for that day.
    pub fn ingest_run(&self, report: &RunReport) -> Result<IngestReport, WarehouseError> {
        let run = RunRow::from_report(report)?;
        let snapshots = report
            .records
            .iter()
            .map(|record| SnapshotRow::from_record(record, report))
            .collect::<Result<Vec<_>, _>>()?;

        let connection = self.pool.acquire(AccessMode::ReadWrite)?;
        connection.execute_batch("BEGIN TRANSACTION")?;

        let result = (|| -> Result<IngestReport, WarehouseError> {
            let params: [&dyn ToSql; 11] = [
                &run.run_id,
                &run.source,
                &run.started_at,
                &run.finished_at,
                &run.fx_brl_per_usd,
                &run.benchmarks_available,
                &run.total,
                &run.succeeded,
                &run.degraded,
                &run.failed,
                &run.warnings,
            ];
            connection.execute(
                "INSERT OR REPLACE INTO runs \
                 (run_id, source, started_at, finished_at, fx_brl_per_usd, benchmarks_available, \
                  total, succeeded, degraded, failed, warnings, recorded_at) \
                 VALUES (?, ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP), ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)",
                params.as_slice(),
            )?;

            let mut ingest = IngestReport {
                run_id: run.run_id.clone(),
                snapshots_written: 0,
                snapshots_kept: 0,
            };
            for snapshot in &snapshots {
                let sql = snapshot_insert_sql(snapshot.status);
                let changed = connection.execute(sql.as_str(), snapshot.params().as_slice())?;
                if changed == 0 {
                    debug!(symbol = %snapshot.symbol, quote_date = %snapshot.quote_date, "kept stored snapshot over failed fetch");
                    ingest.snapshots_kept += 1;
                } else {
                    ingest.snapshots_written += 1;
                }
            }
            Ok(ingest)
        })();

        let ingest = finalize_transaction(&connection, result)?;
        info!(
            run_id = %ingest.run_id,
            written = ingest.snapshots_written,
            kept = ingest.snapshots_kept,
            "persisted run"
        );
        Ok(ingest)
    }
}

impl RecordSink for Warehouse {
    fn write_run(&mut self, report: &RunReport) -> Result<(), SinkError> {
        self.ingest_run(report)
            .map(|_| ())
            .map_err(|error| SinkError::new(error.to_string()))
    }
}

fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

fn execute_select_query(
    connection: &Connection,
    sql: &str,
    guardrails: QueryGuardrails,
    started: Instant,
) -> Result<QueryResult, WarehouseError> {
    let mut statement = connection.prepare(sql)?;
    // Column metadata is only available once the statement has run.
    let _ = statement.query([] as [&dyn ToSql; 0])?;

    let column_count = statement.column_count();
    let mut columns = Vec::with_capacity(column_count);
    for index in 0..column_count {
        let name = statement.column_name(index)?.to_string();
        columns.push(SqlColumn {
            name,
            r#type: statement.column_type(index).to_string(),
        });
    }

    let mut cursor = statement.query([] as [&dyn ToSql; 0])?;
    let mut rows = Vec::new();
    let mut truncated = false;
    while let Some(row) = cursor.next()? {
        ensure_timeout(started, guardrails.timeout())?;
        if rows.len() >= guardrails.max_rows {
            truncated = true;
            break;
        }
        rows.push(read_row(row, column_count)?);
    }
    ensure_timeout(started, guardrails.timeout())?;

    Ok(QueryResult {
        columns,
        row_count: rows.len(),
        rows,
        truncated,
    })
}

fn read_row(row: &::duckdb::Row<'_>, column_count: usize) -> Result<Vec<Value>, ::duckdb::Error> {
    (0..column_count)
        .map(|index| row.get::<_, DuckValue>(index).map(to_json_value))
        .collect()
}

fn to_json_value(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(value) => Value::Bool(value),
        DuckValue::TinyInt(value) => Value::Number(Number::from(value)),
        DuckValue::SmallInt(value) => Value::Number(Number::from(value)),
        DuckValue::Int(value) => Value::Number(Number::from(value)),
        DuckValue::BigInt(value) => Value::Number(Number::from(value)),
        DuckValue::HugeInt(value) => Value::String(value.to_string()),
        DuckValue::UTinyInt(value) => Value::Number(Number::from(value)),
        DuckValue::USmallInt(value) => Value::Number(Number::from(value)),
        DuckValue::UInt(value) => Value::Number(Number::from(value)),
        DuckValue::UBigInt(value) => Value::Number(Number::from(value)),
        DuckValue::Float(value) => number_from_f64(f64::from(value)),
        DuckValue::Double(value) => number_from_f64(value),
        DuckValue::Text(value) | DuckValue::Enum(value) => Value::String(value),
        DuckValue::Blob(value) => Value::String(hex::encode(value)),
        other => Value::String(format!("{other:?}")),
    }
}

/// NaN and infinities become `null`.
fn number_from_f64(value: f64) -> Value {
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn normalize_sql(sql: &str) -> Result<&str, WarehouseError> {
    let normalized = sql.trim();
    if normalized.is_empty() {
        return Err(WarehouseError::QueryRejected(String::from(
            "query must not be empty",
        )));
    }

    Ok(normalized.trim_end_matches(';').trim())
}

fn enforce_read_only_query(sql: &str) -> Result<(), WarehouseError> {
    if !is_select_like(sql) {
        return Err(WarehouseError::QueryRejected(String::from(
            "only SELECT/WITH/EXPLAIN/SHOW/DESCRIBE statements are accepted",
        )));
    }
    if has_multiple_statements(sql) {
        return Err(WarehouseError::QueryRejected(String::from(
            "multiple SQL statements are not allowed",
        )));
    }
    Ok(())
}

fn is_select_like(sql: &str) -> bool {
    let first_keyword = sql
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();

    matches!(
        first_keyword.as_str(),
        "SELECT" | "WITH" | "EXPLAIN" | "SHOW" | "DESCRIBE"
    )
}

fn has_multiple_statements(sql: &str) -> bool {
    sql.split(';').filter(|part| !part.trim().is_empty()).count() > 1
}

fn ensure_timeout(started: Instant, timeout: Duration) -> Result<(), WarehouseError> {
    if started.elapsed() > timeout {
        return Err(WarehouseError::QueryTimeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        });
    }
    Ok(())
}

fn resolve_tickerscope_home() -> PathBuf {
    if let Some(path) = env::var_os("TICKERSCOPE_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".tickerscope");
    }

    PathBuf::from(".tickerscope")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use tempfile::{tempdir, TempDir};
    use tickerscope_core::{
        Currency, FailureReason, FetchOrchestrator, InstrumentCatalog, InstrumentClass,
        InstrumentDescriptor, InstrumentRecord, PipelineConfig, RunSummary, YahooMarketData,
        YahooNews,
    };

    fn open_warehouse() -> (TempDir, Warehouse) {
        let temp = tempdir().expect("tempdir");
        let tickerscope_home = temp.path().join("tickerscope-home");
        let db_path = tickerscope_home.join("warehouse.duckdb");
        let warehouse = Warehouse::open(WarehouseConfig {
            tickerscope_home,
            db_path,
            max_pool_size: 2,
        })
        .expect("warehouse open");
        (temp, warehouse)
    }

    fn catalog(symbols: &[(&str, InstrumentClass, Currency)]) -> InstrumentCatalog {
        InstrumentCatalog::new(
            symbols
                .iter()
                .map(|(symbol, class, currency)| {
                    InstrumentDescriptor::new(symbol, *symbol, "Teste", *class, *currency)
                        .expect("descriptor")
                })
                .collect(),
        )
        .expect("catalog")
    }

    async fn synthetic_report(catalog: &InstrumentCatalog) -> RunReport {
        FetchOrchestrator::new(
            Arc::new(YahooMarketData::synthetic()),
            Arc::new(YahooNews::synthetic()),
            PipelineConfig::default(),
        )
        .run(catalog)
        .await
        .expect("synthetic run")
    }

    fn count(warehouse: &Warehouse, sql: &str) -> Value {
        warehouse
            .execute_query(sql, QueryGuardrails::default())
            .expect("query")
            .rows[0][0]
            .clone()
    }

    #[test]
    fn initializes_tables_and_views() {
        let (_temp, warehouse) = open_warehouse();

        let tables = warehouse
            .execute_query(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_name IN ('runs', 'instrument_snapshots', 'vw_latest_snapshots') \
                 ORDER BY table_name",
                QueryGuardrails::default(),
            )
            .expect("query");

        assert_eq!(tables.row_count, 3);
        warehouse.initialize().expect("migrations are re-entrant");
    }

    #[test]
    fn read_only_queries_reject_writes_and_batches() {
        let (_temp, warehouse) = open_warehouse();

        let write = warehouse
            .execute_query("DELETE FROM runs", QueryGuardrails::default())
            .expect_err("write must be rejected");
        let batch = warehouse
            .execute_query("SELECT 1; DROP TABLE runs", QueryGuardrails::default())
            .expect_err("batch must be rejected");
        let empty = warehouse
            .execute_query("  ;  ", QueryGuardrails::default())
            .expect_err("empty must be rejected");

        assert!(matches!(write, WarehouseError::QueryRejected(_)));
        assert!(matches!(batch, WarehouseError::QueryRejected(_)));
        assert!(matches!(empty, WarehouseError::QueryRejected(_)));
    }

    #[test]
    fn max_rows_truncates_results() {
        let (_temp, warehouse) = open_warehouse();

        let result = warehouse
            .execute_query(
                "SELECT * FROM range(10)",
                QueryGuardrails {
                    max_rows: 3,
                    query_timeout_ms: 5_000,
                },
            )
            .expect("query");

        assert_eq!(result.row_count, 3);
        assert!(result.truncated);
        assert_eq!(result.columns.len(), 1);
    }

    #[tokio::test]
    async fn ingest_is_idempotent_per_symbol_and_day() {
        let (_temp, warehouse) = open_warehouse();
        let catalog = catalog(&[
            ("PETR4.SA", InstrumentClass::EquityBr, Currency::Brl),
            ("AAPL", InstrumentClass::EquityUs, Currency::Usd),
        ]);

        let first = synthetic_report(&catalog).await;
        let second = synthetic_report(&catalog).await;
        let ingest = warehouse.ingest_run(&first).expect("first ingest");
        warehouse.ingest_run(&second).expect("second ingest");

        assert_eq!(ingest.snapshots_written, 2);
        assert_eq!(
            count(&warehouse, "SELECT COUNT(*) FROM instrument_snapshots"),
            Value::from(2)
        );
        assert_eq!(count(&warehouse, "SELECT COUNT(*) FROM runs"), Value::from(2));
        assert_eq!(
            count(
                &warehouse,
                "SELECT COUNT(DISTINCT run_id) FROM vw_latest_snapshots"
            ),
            Value::from(1)
        );
    }

    #[tokio::test]
    async fn failed_fetch_keeps_stored_snapshot() {
        let (_temp, warehouse) = open_warehouse();
        let catalog = catalog(&[("AAPL", InstrumentClass::EquityUs, Currency::Usd)]);
        let success = synthetic_report(&catalog).await;
        warehouse.ingest_run(&success).expect("ingest success");

        let stored = &success.records[0];
        let as_of = stored.market().expect("market").quote.as_of;
        let mut failure = synthetic_report(&catalog).await;
        failure.started_at = as_of;
        failure.records = vec![InstrumentRecord::failed(
            stored.descriptor().clone(),
            FailureReason::DeadlineExceeded,
        )];
        failure.summary = RunSummary::from_records(&failure.records);

        let ingest = warehouse.ingest_run(&failure).expect("ingest failure");

        assert_eq!(ingest.snapshots_kept, 1);
        assert_eq!(ingest.snapshots_written, 0);
        assert_eq!(
            count(&warehouse, "SELECT status FROM instrument_snapshots"),
            Value::String(stored.status().as_str().to_owned())
        );
    }

    #[tokio::test]
    async fn hostile_text_is_bound_as_parameters() {
        let (_temp, warehouse) = open_warehouse();
        let catalog = catalog(&[("AAPL", InstrumentClass::EquityUs, Currency::Usd)]);
        let mut report = synthetic_report(&catalog).await;
        let hostile = "x'); DROP TABLE runs; --";
        report.warnings.push(hostile.to_owned());
        report.records = vec![InstrumentRecord::failed(
            report.records[0].descriptor().clone(),
            FailureReason::WorkerAborted {
                message: hostile.to_owned(),
            },
        )];

        warehouse.ingest_run(&report).expect("ingest");

        let detail = count(&warehouse, "SELECT failure_detail FROM instrument_snapshots");
        assert_eq!(detail, Value::String(format!("worker aborted: {hostile}")));
        assert_eq!(count(&warehouse, "SELECT COUNT(*) FROM runs"), Value::from(1));
    }

    #[tokio::test]
    async fn warehouse_acts_as_record_sink() {
        let (_temp, mut warehouse) = open_warehouse();
        let catalog = catalog(&[("GC=F", InstrumentClass::Commodity, Currency::Usd)]);
        let report = synthetic_report(&catalog).await;

        warehouse.write_run(&report).expect("sink write");

        let board = warehouse
            .execute_query(
                "SELECT symbol, signal_summary FROM vw_signal_board",
                QueryGuardrails::default(),
            )
            .expect("query");
        assert_eq!(board.row_count, 1);
        assert_eq!(board.rows[0][0], Value::String(String::from("GC=F")));
    }

    #[test]
    fn snapshot_insert_lists_every_column_once() {
        let sql = snapshot_insert_sql(tickerscope_core::RecordStatus::Failed);

        assert!(sql.starts_with("INSERT OR IGNORE INTO instrument_snapshots"));
        assert_eq!(sql.matches('?').count(), models::SNAPSHOT_COLUMNS.len());
    }
}
