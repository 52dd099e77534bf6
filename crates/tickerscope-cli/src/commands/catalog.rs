use serde::Serialize;
use tickerscope_core::{InstrumentCatalog, InstrumentDescriptor};

use crate::cli::CatalogArgs;
use crate::error::CliError;
use crate::output::Table;

use super::{parse_classes, CommandResult};

#[derive(Debug, Serialize)]
struct CatalogResponseData<'a> {
    count: usize,
    requires_fx: bool,
    instruments: Vec<&'a InstrumentDescriptor>,
}

pub fn run(args: &CatalogArgs) -> Result<CommandResult, CliError> {
    let mut catalog = InstrumentCatalog::default_catalog()?;
    if !args.class.is_empty() {
        catalog = catalog.filter_classes(&parse_classes(&args.class)?);
    }

    let mut table = Table::new(["symbol", "name", "sector", "class", "currency", "unit"]);
    for instrument in catalog.iter() {
        table.push(vec![
            instrument.symbol.to_string(),
            instrument.name.clone(),
            instrument.sector.clone(),
            instrument.class.to_string(),
            instrument.currency.to_string(),
            instrument.unit.clone().unwrap_or_else(|| String::from("-")),
        ]);
    }

    let data = serde_json::to_value(CatalogResponseData {
        count: catalog.len(),
        requires_fx: catalog.requires_fx(),
        instruments: catalog.iter().collect(),
    })?;

    Ok(CommandResult::ok(data, table))
}
