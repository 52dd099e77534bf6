mod catalog;
mod run;
mod sql;

use std::path::Path;

use serde_json::Value;
use tickerscope_core::InstrumentClass;
use tickerscope_warehouse::{Warehouse, WarehouseConfig};
use uuid::Uuid;

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::output::Table;

/// What a command hands to the renderer.
pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
    pub run_id: Option<Uuid>,
    /// Failed instrument records, checked by `--strict`.
    pub failed: usize,
    pub total: usize,
    pub table: Table,
}

impl CommandResult {
    pub fn ok(data: Value, table: Table) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            run_id: None,
            failed: 0,
            total: 0,
            table,
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }
}

pub async fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    match &cli.command {
        Command::Run(args) => run::run(args, cli.db_path.as_deref()).await,
        Command::Catalog(args) => catalog::run(args),
        Command::Sql(args) => sql::run(args, cli.db_path.as_deref()),
    }
}

fn open_warehouse(db_path: Option<&Path>) -> Result<Warehouse, CliError> {
    let config = match db_path {
        Some(path) => WarehouseConfig::with_db_path(path),
        None => WarehouseConfig::default(),
    };
    Ok(Warehouse::open(config)?)
}

fn parse_classes(raw: &[String]) -> Result<Vec<InstrumentClass>, CliError> {
    raw.iter()
        .map(|value| value.parse::<InstrumentClass>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(CliError::from)
}
