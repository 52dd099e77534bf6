//! Flat row shapes written by run ingestion.

use ::duckdb::ToSql;
use tickerscope_core::{Horizon, InstrumentRecord, RecordStatus, RunReport};

/// Column order of `instrument_snapshots` inserts, excluding `updated_at`.
pub(crate) const SNAPSHOT_COLUMNS: &[&str] = &[
    "symbol",
    "quote_date",
    "run_id",
    "name",
    "sector",
    "instrument_class",
    "currency",
    "unit",
    "status",
    "as_of",
    "price",
    "price_usd",
    "open",
    "high",
    "low",
    "volume",
    "fx_rate",
    "return_1d",
    "return_1w",
    "return_1m",
    "return_ytd",
    "return_5y",
    "return_all",
    "rsi_14",
    "ma_50",
    "ma_200",
    "volatility_30d",
    "volume_ratio",
    "week_52_high",
    "week_52_low",
    "signal_summary",
    "sentiment_score",
    "sentiment_label",
    "article_count",
    "headline",
    "fundamentals_json",
    "signals_json",
    "benchmarks_json",
    "degradations",
    "failure_reason",
    "failure_detail",
];

/// `INSERT` statement for one snapshot row. Failed rows never replace a stored
/// snapshot for the same symbol and date.
pub(crate) fn snapshot_insert_sql(status: RecordStatus) -> String {
    let verb = match status {
        RecordStatus::Failed => "INSERT OR IGNORE",
        RecordStatus::Complete | RecordStatus::Degraded => "INSERT OR REPLACE",
    };
    let placeholders = SNAPSHOT_COLUMNS
        .iter()
        .map(|column| match *column {
            "quote_date" => "CAST(? AS DATE)",
            "as_of" => "TRY_CAST(? AS TIMESTAMP)",
            _ => "?",
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "{verb} INTO instrument_snapshots ({}, updated_at) VALUES ({placeholders}, CURRENT_TIMESTAMP)",
        SNAPSHOT_COLUMNS.join(", ")
    )
}

/// One `instrument_snapshots` row.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRow {
    pub symbol: String,
    pub quote_date: String,
    pub run_id: String,
    pub name: String,
    pub sector: String,
    pub instrument_class: String,
    pub currency: String,
    pub unit: Option<String>,
    pub status: RecordStatus,
    pub as_of: Option<String>,
    pub price: Option<f64>,
    pub price_usd: Option<f64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<u64>,
    pub fx_rate: Option<f64>,
    pub returns: [Option<f64>; 6],
    pub rsi_14: Option<f64>,
    pub ma_50: Option<f64>,
    pub ma_200: Option<f64>,
    pub volatility_30d: Option<f64>,
    pub volume_ratio: Option<f64>,
    pub week_52_high: Option<f64>,
    pub week_52_low: Option<f64>,
    pub signal_summary: Option<String>,
    pub sentiment_score: Option<f64>,
    pub sentiment_label: Option<String>,
    pub article_count: Option<i64>,
    pub headline: Option<String>,
    pub fundamentals_json: Option<String>,
    pub signals_json: Option<String>,
    pub benchmarks_json: Option<String>,
    pub degradations: String,
    pub failure_reason: Option<String>,
    pub failure_detail: Option<String>,
}

impl SnapshotRow {
    /// Flatten `record`. Failed records are dated by the run start.
    pub fn from_record(record: &InstrumentRecord, report: &RunReport) -> Result<Self, serde_json::Error> {
        let descriptor = record.descriptor();
        let market = record.market();
        let sentiment = record.sentiment();
        let quote = market.map(|market| &market.quote);
        let indicators = market.map(|market| &market.indicators);
        let quote_date = quote
            .map(|quote| quote.as_of.date())
            .unwrap_or_else(|| report.started_at.date());

        let returns = Horizon::ALL.map(|horizon| {
            market.and_then(|market| market.history.returns.get(horizon))
        });

        Ok(Self {
            symbol: descriptor.symbol.to_string(),
            quote_date: quote_date.to_string(),
            run_id: report.run_id.to_string(),
            name: descriptor.name.clone(),
            sector: descriptor.sector.clone(),
            instrument_class: descriptor.class.as_str().to_owned(),
            currency: descriptor.currency.code().to_owned(),
            unit: descriptor.unit.clone(),
            status: record.status(),
            as_of: quote.map(|quote| quote.as_of.format_rfc3339()),
            price: quote.map(|quote| quote.price),
            price_usd: quote.map(|quote| quote.price_usd),
            open: quote.and_then(|quote| quote.open),
            high: quote.and_then(|quote| quote.high),
            low: quote.and_then(|quote| quote.low),
            volume: quote.and_then(|quote| quote.volume),
            fx_rate: quote.and_then(|quote| quote.fx_rate),
            returns,
            rsi_14: indicators.and_then(|indicators| indicators.rsi_14),
            ma_50: indicators.and_then(|indicators| indicators.ma_50),
            ma_200: indicators.and_then(|indicators| indicators.ma_200),
            volatility_30d: indicators.and_then(|indicators| indicators.volatility_30d),
            volume_ratio: indicators.and_then(|indicators| indicators.volume_ratio),
            week_52_high: indicators.and_then(|indicators| indicators.week_52_high),
            week_52_low: indicators.and_then(|indicators| indicators.week_52_low),
            signal_summary: market.map(|market| market.signals.summary.as_str().to_owned()),
            sentiment_score: sentiment.map(|sentiment| sentiment.combined),
            sentiment_label: sentiment.map(|sentiment| sentiment.label.as_str().to_owned()),
            article_count: sentiment
                .map(|sentiment| i64::try_from(sentiment.article_count()).unwrap_or(i64::MAX)),
            headline: sentiment.and_then(|sentiment| sentiment.headline().map(str::to_owned)),
            fundamentals_json: market
                .map(|market| serde_json::to_string(&market.fundamentals))
                .transpose()?,
            signals_json: market
                .map(|market| serde_json::to_string(&market.signals))
                .transpose()?,
            benchmarks_json: market
                .map(|market| serde_json::to_string(&market.benchmarks))
                .transpose()?,
            degradations: serde_json::to_string(record.degradations())?,
            failure_reason: record.failure().map(|failure| failure.code().to_owned()),
            failure_detail: record.failure().map(|failure| failure.detail()),
        })
    }

    /// Parameters in [`SNAPSHOT_COLUMNS`] order.
    pub(crate) fn params(&self) -> Vec<&dyn ToSql> {
        let status: &dyn ToSql = match self.status {
            RecordStatus::Complete => &"complete",
            RecordStatus::Degraded => &"degraded",
            RecordStatus::Failed => &"failed",
        };

        let mut params: Vec<&dyn ToSql> = vec![
            &self.symbol,
            &self.quote_date,
            &self.run_id,
            &self.name,
            &self.sector,
            &self.instrument_class,
            &self.currency,
            &self.unit,
            status,
            &self.as_of,
            &self.price,
            &self.price_usd,
            &self.open,
            &self.high,
            &self.low,
            &self.volume,
            &self.fx_rate,
        ];
        params.extend(self.returns.iter().map(|value| value as &dyn ToSql));
        params.extend([
            &self.rsi_14 as &dyn ToSql,
            &self.ma_50,
            &self.ma_200,
            &self.volatility_30d,
            &self.volume_ratio,
            &self.week_52_high,
            &self.week_52_low,
            &self.signal_summary,
            &self.sentiment_score,
            &self.sentiment_label,
            &self.article_count,
            &self.headline,
            &self.fundamentals_json,
            &self.signals_json,
            &self.benchmarks_json,
            &self.degradations,
            &self.failure_reason,
            &self.failure_detail,
        ]);
        params
    }
}

/// One `runs` row.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRow {
    pub run_id: String,
    pub source: String,
    pub started_at: String,
    pub finished_at: String,
    pub fx_brl_per_usd: Option<f64>,
    pub benchmarks_available: i64,
    pub total: i64,
    pub succeeded: i64,
    pub degraded: i64,
    pub failed: i64,
    pub warnings: String,
}

impl RunRow {
    pub fn from_report(report: &RunReport) -> Result<Self, serde_json::Error> {
        let count = |value: usize| i64::try_from(value).unwrap_or(i64::MAX);
        Ok(Self {
            run_id: report.run_id.to_string(),
            source: report.source.clone(),
            started_at: report.started_at.format_rfc3339(),
            finished_at: report.finished_at.format_rfc3339(),
            fx_brl_per_usd: report.fx_rate.map(|fx| fx.brl_per_usd),
            benchmarks_available: count(report.benchmarks.available()),
            total: count(report.summary.total),
            succeeded: count(report.summary.succeeded),
            degraded: count(report.summary.degraded),
            failed: count(report.summary.failed),
            warnings: serde_json::to_string(&report.warnings)?,
        })
    }
}
