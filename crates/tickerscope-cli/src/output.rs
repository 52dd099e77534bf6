use serde::Serialize;
use serde_json::Value;
use tickerscope_core::UtcDateTime;
use uuid::Uuid;

use crate::cli::OutputFormat;
use crate::commands::CommandResult;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    pub meta: Meta<'a>,
    pub data: &'a Value,
}

#[derive(Debug, Serialize)]
pub struct Meta<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
    pub generated_at: String,
    pub warnings: &'a [String],
}

impl<'a> Envelope<'a> {
    pub fn new(result: &'a CommandResult) -> Self {
        Self {
            meta: Meta {
                run_id: result.run_id,
                generated_at: UtcDateTime::now().format_rfc3339(),
                warnings: &result.warnings,
            },
            data: &result.data,
        }
    }
}

pub fn render(result: &CommandResult, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let envelope = Envelope::new(result);
            let payload = if pretty {
                serde_json::to_string_pretty(&envelope)?
            } else {
                serde_json::to_string(&envelope)?
            };
            println!("{payload}");
        }
        OutputFormat::Table => print!("{}", render_table(result)),
    }

    Ok(())
}

fn render_table(result: &CommandResult) -> String {
    let mut output = String::new();
    if let Some(run_id) = result.run_id {
        output.push_str(&format!("run_id      : {run_id}\n"));
    }
    output.push_str(&format!(
        "generated_at: {}\n",
        UtcDateTime::now().format_rfc3339()
    ));

    if !result.warnings.is_empty() {
        output.push_str("warnings:\n");
        for warning in &result.warnings {
            output.push_str(&format!("  - {warning}\n"));
        }
    }

    output.push_str(&result.table.render());
    output
}

/// Column-aligned text rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (index, cell) in row.iter().enumerate() {
                let width = cell.chars().count();
                match widths.get_mut(index) {
                    Some(current) => *current = (*current).max(width),
                    None => widths.push(width),
                }
            }
        }

        let line = |cells: &[String]| {
            cells
                .iter()
                .enumerate()
                .map(|(index, cell)| format!("{cell:<width$}", width = widths[index]))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_owned()
        };

        let mut output = String::new();
        output.push_str(&line(&self.headers));
        output.push('\n');
        output.push_str(
            &widths
                .iter()
                .map(|width| "-".repeat(*width))
                .collect::<Vec<_>>()
                .join("  "),
        );
        output.push('\n');
        for row in &self.rows {
            output.push_str(&line(row));
            output.push('\n');
        }
        output
    }
}

/// Two decimals, or `-` when absent.
pub fn cell(value: Option<f64>) -> String {
    value.map_or_else(|| String::from("-"), |value| format!("{value:.2}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_pads_columns_to_widest_cell() {
        let mut table = Table::new(["symbol", "rsi"]);
        table.push(vec![String::from("PETR4.SA"), cell(Some(41.234))]);
        table.push(vec![String::from("GC=F"), cell(None)]);

        let rendered = table.render();
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines[0], "symbol    rsi");
        assert_eq!(lines[1], "--------  -----");
        assert_eq!(lines[2], "PETR4.SA  41.23");
        assert_eq!(lines[3], "GC=F      -");
    }

    #[test]
    fn envelope_carries_meta_and_data() {
        let result = CommandResult {
            data: serde_json::json!({ "instruments": [] }),
            warnings: vec![String::from("benchmark ^GSPC unavailable")],
            run_id: Some(Uuid::nil()),
            failed: 0,
            total: 0,
            table: Table::default(),
        };

        let value = serde_json::to_value(Envelope::new(&result)).expect("serialize");

        assert_eq!(value["meta"]["run_id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(value["meta"]["warnings"][0], "benchmark ^GSPC unavailable");
        assert!(value["meta"]["generated_at"].as_str().is_some_and(|at| at.ends_with('Z')));
        assert_eq!(value["data"]["instruments"], serde_json::json!([]));
    }
}
