//! CLI argument definitions for tickerscope.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `run` | Fetch, analyze and persist the instrument catalog |
//! | `catalog` | List the built-in instrument catalog |
//! | `sql` | Read-only SQL over stored runs |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `json` | Output format (json, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--strict` | `false` | Exit with code 5 when any instrument failed |
//! | `--log-level` | `info` | Log filter when `RUST_LOG` is unset |
//! | `--log-json` | `false` | Emit logs as JSON lines on stderr |
//! | `--db-path` | `$TICKERSCOPE_HOME/warehouse.duckdb` | Warehouse file |
//!
//! # Examples
//!
//! ```bash
//! # Offline run over the Brazilian equities, nothing persisted
//! tickerscope run --mock --class equity_br --no-persist --format table
//!
//! # Live run for two symbols with a tighter deadline
//! tickerscope run --symbols PETR4.SA,AAPL --deadline-ms 60000
//!
//! # Inspect the latest signals
//! tickerscope sql "SELECT * FROM vw_signal_board ORDER BY symbol"
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Market snapshot pipeline for Brazilian and US instruments.
#[derive(Debug, Parser)]
#[command(
    name = "tickerscope",
    author,
    version,
    about = "Market snapshot pipeline for Brazilian and US instruments",
    long_about = "Tickerscope fetches quotes, history, fundamentals and news for a fixed \
instrument catalog, derives indicators, signals, benchmark deltas and sentiment, and stores \
one snapshot per instrument and day in a local DuckDB warehouse.\n\
\n\
Use 'tickerscope <command> --help' for command-specific help."
)]
pub struct Cli {
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Exit with code 5 when any instrument record failed.
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Log filter directive used when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,

    /// Warehouse database file.
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the catalog, derive analytics and persist one record per instrument.
    ///
    /// # Examples
    ///
    ///   tickerscope run
    ///   tickerscope run --mock --no-persist --pretty
    ///   tickerscope run --class crypto,commodity --quote-workers 4
    Run(RunArgs),

    /// List the built-in instrument catalog.
    Catalog(CatalogArgs),

    /// Run a read-only SQL query against the warehouse.
    ///
    /// Only a single SELECT, WITH, EXPLAIN, SHOW or DESCRIBE statement is accepted.
    ///
    /// # Examples
    ///
    ///   tickerscope sql "SELECT * FROM vw_run_history LIMIT 5"
    Sql(SqlArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Use deterministic synthetic market data and news instead of Yahoo.
    #[arg(long, default_value_t = false)]
    pub mock: bool,

    /// Restrict the run to these catalog symbols.
    #[arg(long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Restrict the run to these instrument classes.
    #[arg(long, value_delimiter = ',')]
    pub class: Vec<String>,

    /// Skip writing the run to the warehouse.
    #[arg(long, default_value_t = false)]
    pub no_persist: bool,

    /// JSON pipeline configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub quote_workers: Option<usize>,

    #[arg(long)]
    pub news_workers: Option<usize>,

    /// Retries after the first attempt for transient failures.
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Budget for one network attempt.
    #[arg(long)]
    pub task_timeout_ms: Option<u64>,

    /// Deadline covering the quote and news phases.
    #[arg(long)]
    pub deadline_ms: Option<u64>,

    /// Upstream request quota used for pacing.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub requests_per_minute: Option<u32>,
}

#[derive(Debug, Args)]
pub struct CatalogArgs {
    /// Only list these instrument classes.
    #[arg(long, value_delimiter = ',')]
    pub class: Vec<String>,
}

#[derive(Debug, Args)]
pub struct SqlArgs {
    pub query: String,

    #[arg(long, default_value_t = 10_000)]
    pub max_rows: usize,

    #[arg(long, default_value_t = 5_000)]
    pub query_timeout_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_overrides_and_lists() {
        let cli = Cli::try_parse_from([
            "tickerscope",
            "run",
            "--mock",
            "--symbols",
            "PETR4.SA,AAPL",
            "--class",
            "equity_br",
            "--quote-workers",
            "4",
            "--format",
            "table",
        ])
        .expect("parse");

        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert!(args.mock);
        assert_eq!(args.symbols, vec!["PETR4.SA", "AAPL"]);
        assert_eq!(args.class, vec!["equity_br"]);
        assert_eq!(args.quote_workers, Some(4));
        assert_eq!(cli.format, OutputFormat::Table);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn rejects_zero_request_quota() {
        let parsed = Cli::try_parse_from(["tickerscope", "run", "--requests-per-minute", "0"]);
        assert!(parsed.is_err());
    }
}
