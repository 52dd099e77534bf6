use thiserror::Error;

/// Validation and contract errors exposed by `tickerscope-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter or '^': '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("unsupported currency '{value}', expected BRL or USD")]
    UnsupportedCurrency { value: String },
    #[error("invalid instrument class '{value}', expected one of equity_br, equity_us, commodity, crypto, fx")]
    InvalidInstrumentClass { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
    #[error("field '{field}' must be strictly positive")]
    NonPositiveValue { field: &'static str },

    #[error("bar high must be >= low")]
    InvalidBarRange,
    #[error("bars must be ordered by strictly increasing timestamp")]
    UnorderedBars,

    #[error("catalog contains duplicate symbol '{symbol}'")]
    DuplicateSymbol { symbol: String },
    #[error("catalog does not contain symbol '{symbol}'")]
    UnknownCatalogSymbol { symbol: String },

    #[error("configuration value '{field}' is out of range: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
}

/// Top-level error type for core operations outside the pipeline.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
}
