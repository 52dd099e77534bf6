//! Database views for reporting queries.

use ::duckdb::Connection;

/// Create reporting views.
///
/// - `vw_latest_snapshots`: newest stored snapshot per symbol
/// - `vw_signal_board`: latest signals and sentiment per symbol, successful rows only
/// - `vw_run_history`: runs with their failure share, newest first
pub fn create_views(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r"
CREATE OR REPLACE VIEW vw_latest_snapshots AS
SELECT *
FROM instrument_snapshots
QUALIFY ROW_NUMBER() OVER (
    PARTITION BY symbol
    ORDER BY quote_date DESC, updated_at DESC
) = 1;

CREATE OR REPLACE VIEW vw_signal_board AS
SELECT
    symbol,
    name,
    instrument_class,
    quote_date,
    price_usd,
    rsi_14,
    signal_summary,
    sentiment_label,
    return_1d,
    return_ytd
FROM vw_latest_snapshots
WHERE status <> 'failed';

CREATE OR REPLACE VIEW vw_run_history AS
SELECT
    run_id,
    source,
    started_at,
    finished_at,
    total,
    succeeded,
    degraded,
    failed,
    CASE WHEN total = 0 THEN NULL ELSE failed::DOUBLE / total END AS failure_share
FROM runs
ORDER BY started_at DESC;
",
    )?;

    Ok(())
}
