//! Core domain types: symbols, timestamps, instruments, market data and run records.

mod instrument;
mod market;
mod record;
mod symbol;
mod timestamp;

pub use instrument::{Currency, InstrumentClass, InstrumentDescriptor};
pub use market::{
    percent_change, Bar, FundamentalMetrics, FxRate, HistoricalReference, Horizon,
    HorizonValues, PriceHistory, QuoteSnapshot, RawQuote,
};
pub use record::{
    BenchmarkDeltas, BenchmarkIndex, Degradation, FailureReason, InstrumentRecord,
    LanguageSentiment, MarketView, RecordStatus, SentimentLabel, SentimentRecord, SignalSet,
    SignalSummary, TechnicalIndicators,
};
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
