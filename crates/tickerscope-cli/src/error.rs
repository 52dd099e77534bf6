use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] tickerscope_core::ValidationError),

    #[error(transparent)]
    Config(#[from] tickerscope_core::CoreError),

    #[error("command error: {0}")]
    Command(String),

    #[error("run failed: {0}")]
    Pipeline(#[from] tickerscope_core::PipelineError),

    #[error("strict mode failed: {failed} of {total} instruments failed")]
    StrictModeViolation { failed: usize, total: usize },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error("warehouse error: {0}")]
    Warehouse(#[from] tickerscope_warehouse::WarehouseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Config(_) => 2,
            Self::Command(_) => 2,
            Self::Pipeline(_) => 3,
            Self::Serialization(_) => 4,
            Self::StrictModeViolation { .. } => 5,
            Self::Warehouse(_) => 7,
            Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickerscope_core::{PipelineError, ValidationError};
    use tickerscope_warehouse::WarehouseError;

    #[test]
    fn exit_codes_follow_error_category() {
        assert_eq!(CliError::from(ValidationError::EmptySymbol).exit_code(), 2);
        let fatal = PipelineError::FxUnavailable {
            reason: String::from("timeout"),
        };
        assert_eq!(CliError::from(fatal).exit_code(), 3);
        assert_eq!(
            CliError::from(WarehouseError::QueryRejected(String::from("no"))).exit_code(),
            7
        );
        assert_eq!(
            CliError::from(std::io::Error::other("disk")).exit_code(),
            10
        );
    }
}
