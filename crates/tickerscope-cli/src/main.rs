mod cli;
mod commands;
mod error;
mod logging;
mod output;

use clap::Parser;
use std::process::ExitCode;

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_json)?;

    let result = commands::run(&cli).await?;
    output::render(&result, cli.format, cli.pretty)?;

    if cli.strict && result.failed > 0 {
        return Err(CliError::StrictModeViolation {
            failed: result.failed,
            total: result.total,
        });
    }

    Ok(ExitCode::SUCCESS)
}
