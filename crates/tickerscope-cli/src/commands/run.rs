use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tickerscope_core::{
    FetchOrchestrator, Horizon, InstrumentCatalog, MarketDataSource, NewsSource, PipelineConfig,
    ProviderSettings, RunReport, Symbol, YahooMarketData, YahooNews, YahooTransport,
};
use tracing::info;

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::output::{cell, Table};

use super::{open_warehouse, parse_classes, CommandResult};

#[derive(Debug, Serialize)]
struct RunResponseData<'a> {
    persisted: bool,
    #[serde(flatten)]
    report: &'a RunReport,
}

pub async fn run(args: &RunArgs, db_path: Option<&Path>) -> Result<CommandResult, CliError> {
    let config = resolve_config(args)?;
    let catalog = select_catalog(args)?;
    let (market, news) = sources(args, &config);

    info!(
        instruments = catalog.len(),
        mock = args.mock,
        persist = !args.no_persist,
        "starting run"
    );

    let orchestrator = FetchOrchestrator::new(market, news, config);
    let report = if args.no_persist {
        orchestrator.run(&catalog).await?
    } else {
        let mut warehouse = open_warehouse(db_path)?;
        orchestrator.run_with_sink(&catalog, &mut warehouse).await?
    };

    let data = serde_json::to_value(RunResponseData {
        persisted: !args.no_persist,
        report: &report,
    })?;

    let mut result = CommandResult::ok(data, records_table(&report))
        .with_warnings(report.warnings.clone());
    result.run_id = Some(report.run_id);
    result.failed = report.summary.failed;
    result.total = report.summary.total;
    Ok(result)
}

/// Defaults, then the `--config` file, then flag overrides.
fn resolve_config(args: &RunArgs) -> Result<PipelineConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(workers) = args.quote_workers {
        config.pools.quotes = workers;
    }
    if let Some(workers) = args.news_workers {
        config.pools.news = workers;
    }
    if let Some(retries) = args.max_retries {
        config.retry.max_retries = retries;
    }
    if let Some(timeout_ms) = args.task_timeout_ms {
        config.task_timeout_ms = timeout_ms;
    }
    if let Some(deadline_ms) = args.deadline_ms {
        config.run_deadline_ms = deadline_ms;
    }

    config.validate()?;
    Ok(config)
}

fn select_catalog(args: &RunArgs) -> Result<InstrumentCatalog, CliError> {
    let mut catalog = InstrumentCatalog::default_catalog()?;
    if !args.class.is_empty() {
        catalog = catalog.filter_classes(&parse_classes(&args.class)?);
    }
    if !args.symbols.is_empty() {
        let symbols = args
            .symbols
            .iter()
            .map(|raw| Symbol::parse(raw))
            .collect::<Result<Vec<_>, _>>()?;
        catalog = catalog.select(&symbols)?;
    }
    Ok(catalog)
}

fn sources(
    args: &RunArgs,
    config: &PipelineConfig,
) -> (Arc<dyn MarketDataSource>, Arc<dyn NewsSource>) {
    if args.mock {
        return (
            Arc::new(YahooMarketData::synthetic()),
            Arc::new(YahooNews::synthetic()),
        );
    }

    let mut settings = ProviderSettings::default();
    if let Some(quota) = args.requests_per_minute {
        settings.requests_per_minute = quota;
    }
    // Both adapters share one pacer and circuit breaker.
    let transport = Arc::new(YahooTransport::new(&settings));
    (
        Arc::new(YahooMarketData::live(Arc::clone(&transport))),
        Arc::new(YahooNews::live(transport, config.sentiment.max_headlines)),
    )
}

fn records_table(report: &RunReport) -> Table {
    let mut table = Table::new([
        "symbol",
        "class",
        "status",
        "price",
        "price_usd",
        "1d%",
        "ytd%",
        "rsi14",
        "signal",
        "sentiment",
        "failure",
    ]);

    for record in &report.records {
        let market = record.market();
        let returns = |horizon| market.and_then(|market| market.history.returns.get(horizon));
        table.push(vec![
            record.symbol().to_string(),
            record.descriptor().class.to_string(),
            record.status().as_str().to_owned(),
            cell(market.map(|market| market.quote.price)),
            cell(market.map(|market| market.quote.price_usd)),
            cell(returns(Horizon::OneDay)),
            cell(returns(Horizon::Ytd)),
            cell(market.and_then(|market| market.indicators.rsi_14)),
            market.map_or_else(
                || String::from("-"),
                |market| market.signals.summary.as_str().to_owned(),
            ),
            record.sentiment().map_or_else(
                || String::from("-"),
                |sentiment| format!("{} ({:+.2})", sentiment.label.as_str(), sentiment.combined),
            ),
            record
                .failure()
                .map_or_else(|| String::from("-"), |failure| failure.code().to_owned()),
        ]);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use clap::Parser;

    fn run_args(argv: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(argv).expect("parse");
        match cli.command {
            Command::Run(args) => args,
            other => panic!("expected run command, got {other:?}"),
        }
    }

    #[test]
    fn flag_overrides_apply_over_defaults() {
        let args = run_args(&[
            "tickerscope",
            "run",
            "--quote-workers",
            "2",
            "--max-retries",
            "0",
            "--deadline-ms",
            "1000",
        ]);

        let config = resolve_config(&args).expect("config");

        assert_eq!(config.pools.quotes, 2);
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.run_deadline_ms, 1_000);
        assert_eq!(config.pools.news, PipelineConfig::default().pools.news);
    }

    #[test]
    fn zero_workers_fail_validation() {
        let args = run_args(&["tickerscope", "run", "--news-workers", "0"]);
        let error = resolve_config(&args).expect_err("must fail");
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn catalog_selection_combines_class_and_symbols() {
        let args = run_args(&[
            "tickerscope",
            "run",
            "--class",
            "crypto",
            "--symbols",
            "BTC-USD",
        ]);

        let catalog = select_catalog(&args).expect("catalog");

        assert_eq!(catalog.len(), 1);
        assert!(!catalog.requires_fx());
    }

    #[test]
    fn unknown_symbol_is_a_validation_error() {
        let args = run_args(&["tickerscope", "run", "--symbols", "NOPE3.SA"]);
        let error = select_catalog(&args).expect_err("must fail");
        assert_eq!(error.exit_code(), 2);
    }

    #[tokio::test]
    async fn mock_run_without_persistence_reports_every_instrument() {
        let args = run_args(&[
            "tickerscope",
            "run",
            "--mock",
            "--no-persist",
            "--symbols",
            "PETR4.SA,AAPL,GC=F",
        ]);

        let result = run(&args, None).await.expect("run");

        assert_eq!(result.total, 3);
        assert_eq!(result.failed, 0);
        assert!(result.run_id.is_some());
        assert_eq!(result.data["persisted"], false);
        assert_eq!(result.data["records"].as_array().map(Vec::len), Some(3));
        assert!(result.table.render().contains("PETR4.SA"));
    }

    #[tokio::test]
    async fn mock_run_persists_to_the_given_warehouse() {
        let temp = tempfile::tempdir().expect("tempdir");
        let db_path = temp.path().join("runs.duckdb");
        let args = run_args(&["tickerscope", "run", "--mock", "--symbols", "VALE3.SA"]);

        let result = run(&args, Some(&db_path)).await.expect("run");

        assert_eq!(result.data["persisted"], true);
        assert!(db_path.exists());
    }
}
