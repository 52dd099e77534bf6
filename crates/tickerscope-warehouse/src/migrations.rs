//! Versioned schema migrations, applied once each and recorded in `schema_migrations`.

use ::duckdb::Connection;
use tracing::debug;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_runs",
        sql: r#"
CREATE TABLE IF NOT EXISTS runs (
    run_id TEXT PRIMARY KEY,
    source TEXT NOT NULL,
    started_at TIMESTAMP NOT NULL,
    finished_at TIMESTAMP NOT NULL,
    fx_brl_per_usd DOUBLE,
    benchmarks_available BIGINT NOT NULL,
    total BIGINT NOT NULL,
    succeeded BIGINT NOT NULL,
    degraded BIGINT NOT NULL,
    failed BIGINT NOT NULL,
    warnings TEXT NOT NULL,
    recorded_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
    Migration {
        version: "0002_instrument_snapshots",
        sql: r#"
CREATE TABLE IF NOT EXISTS instrument_snapshots (
    symbol TEXT NOT NULL,
    quote_date DATE NOT NULL,
    run_id TEXT NOT NULL,
    name TEXT NOT NULL,
    sector TEXT NOT NULL,
    instrument_class TEXT NOT NULL,
    currency TEXT NOT NULL,
    unit TEXT,
    status TEXT NOT NULL,
    as_of TIMESTAMP,
    price DOUBLE,
    price_usd DOUBLE,
    open DOUBLE,
    high DOUBLE,
    low DOUBLE,
    volume BIGINT,
    fx_rate DOUBLE,
    return_1d DOUBLE,
    return_1w DOUBLE,
    return_1m DOUBLE,
    return_ytd DOUBLE,
    return_5y DOUBLE,
    return_all DOUBLE,
    rsi_14 DOUBLE,
    ma_50 DOUBLE,
    ma_200 DOUBLE,
    volatility_30d DOUBLE,
    volume_ratio DOUBLE,
    week_52_high DOUBLE,
    week_52_low DOUBLE,
    signal_summary TEXT,
    sentiment_score DOUBLE,
    sentiment_label TEXT,
    article_count BIGINT,
    headline TEXT,
    fundamentals_json TEXT,
    signals_json TEXT,
    benchmarks_json TEXT,
    degradations TEXT NOT NULL,
    failure_reason TEXT,
    failure_detail TEXT,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY(symbol, quote_date)
);
"#,
    },
];

pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied_count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            [migration.version],
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            debug!(version = migration.version, "applying migration");
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                [migration.version],
            )?;
        }
    }

    Ok(())
}
