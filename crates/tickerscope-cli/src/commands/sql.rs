use std::path::Path;

use serde_json::Value;
use tickerscope_warehouse::QueryGuardrails;

use crate::cli::SqlArgs;
use crate::error::CliError;
use crate::output::Table;

use super::{open_warehouse, CommandResult};

pub fn run(args: &SqlArgs, db_path: Option<&Path>) -> Result<CommandResult, CliError> {
    let query = args.query.trim();
    if query.is_empty() {
        return Err(CliError::Command(String::from("query must not be empty")));
    }

    let warehouse = open_warehouse(db_path)?;
    let guardrails = QueryGuardrails {
        max_rows: args.max_rows,
        query_timeout_ms: args.query_timeout_ms,
    };
    let result = warehouse.execute_query(query, guardrails)?;

    let mut table = Table::new(result.columns.iter().map(|column| column.name.clone()));
    for row in &result.rows {
        table.push(row.iter().map(format_sql_value).collect());
    }

    let truncated = result.truncated;
    let row_count = result.row_count;
    let mut command_result = CommandResult::ok(serde_json::to_value(result)?, table);
    if truncated {
        command_result = command_result.with_warning(format!(
            "result truncated at {row_count} rows (use --max-rows to increase limit)"
        ));
    }

    Ok(command_result)
}

fn format_sql_value(value: &Value) -> String {
    match value {
        Value::Null => String::from("null"),
        Value::String(text) => text.clone(),
        _ => value.to_string(),
    }
}
