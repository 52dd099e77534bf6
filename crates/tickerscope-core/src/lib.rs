//! # Tickerscope Core
//!
//! Fetch orchestration and derived market analytics for a fixed catalog of Brazilian
//! and US instruments.
//!
//! ## Overview
//!
//! One run resolves the USD/BRL rate and two benchmark indices, fetches every
//! catalog instrument on a bounded worker pool, scores news sentiment on a second
//! pool, and merges everything into one [`InstrumentRecord`] per instrument:
//!
//! - **Domain models** for quotes, histories, fundamentals, indicators and signals
//! - **Instrument catalog** passed explicitly into each run
//! - **Source traits** for market data and news providers
//! - **Retry with backoff**, a circuit breaker and request pacing for upstream calls
//! - **Pure analytics**: RSI, moving averages, volatility, volume ratio, signals,
//!   sentiment and benchmark deltas
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Yahoo market data and news adapters, synthetic offline data |
//! | [`analytics`] | Indicators, signals, sentiment and benchmark comparison |
//! | [`catalog`] | Default instrument catalog and filtering |
//! | [`circuit_breaker`] | Circuit breaker for resilient calls |
//! | [`config`] | Typed pipeline and provider configuration |
//! | [`data_source`] | Source traits and fetch error taxonomy |
//! | [`domain`] | Domain models |
//! | [`error`] | Core error types |
//! | [`http_client`] | HTTP client abstraction |
//! | [`pipeline`] | Worker pools, quote fetcher, orchestrator and run report |
//! | [`retry`] | Backoff and transient retry loop |
//! | [`throttling`] | Request pacing |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tickerscope_core::{
//!     FetchOrchestrator, InstrumentCatalog, PipelineConfig, YahooMarketData, YahooNews,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = FetchOrchestrator::new(
//!         Arc::new(YahooMarketData::synthetic()),
//!         Arc::new(YahooNews::synthetic()),
//!         PipelineConfig::default(),
//!     );
//!     let report = orchestrator.run(&InstrumentCatalog::default_catalog()?).await?;
//!     println!("{} instruments, {} failed", report.summary.total, report.summary.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  Phase 1 (3 workers) │  FX + ^BVSP + ^GSPC
//! └──────────┬───────────┘
//!            │ barrier
//!            ▼
//! ┌──────────────────────┐     ┌──────────────────┐
//! │  Phase 2 (8 workers) │────▶│ Retry / Breaker  │
//! │  quote → indicators  │     │ Pacer / HTTP     │
//! │  → deltas → signals  │     └──────────────────┘
//! └──────────┬───────────┘
//!            │ barrier
//!            ▼
//! ┌──────────────────────┐
//! │  Phase 3 (5 workers) │  news PT + EN → sentiment
//! └──────────┬───────────┘
//!            │ merge by symbol
//!            ▼
//! ┌──────────────────────┐
//! │  Phase 4 (sequential)│  RecordSink
//! └──────────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Only [`PipelineError`] escapes a run. Per-instrument problems become a
//! [`FailureReason`] on that instrument's record:
//!
//! ```rust
//! use tickerscope_core::{FailureReason, InstrumentRecord};
//!
//! fn describe(record: &InstrumentRecord) -> String {
//!     match record.failure() {
//!         Some(FailureReason::TransientExhausted { attempts, .. }) => {
//!             format!("gave up after {attempts} attempts")
//!         }
//!         Some(other) => other.detail(),
//!         None => String::from("ok"),
//!     }
//! }
//! ```

pub mod adapters;
pub mod analytics;
pub mod catalog;
pub mod circuit_breaker;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod pipeline;
pub mod retry;
pub mod throttling;

// Re-export commonly used types at crate root for convenience

// Adapter implementations
pub use adapters::{YahooMarketData, YahooNews, YahooTransport};

// Analytics
pub use analytics::BenchmarkReturns;

// Catalog
pub use catalog::InstrumentCatalog;

// Circuit breaker
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

// Configuration
pub use config::{
    PipelineConfig, PoolSizes, ProviderSettings, RetrySettings, SentimentSettings,
    SignalThresholds,
};

// Data source traits and types
pub use data_source::{
    FetchError, FetchErrorKind, Headline, Language, MarketDataSource, MarketSnapshot, NewsSource,
    SourceFuture,
};

// Domain models
pub use domain::{
    Bar, BenchmarkDeltas, BenchmarkIndex, Currency, Degradation, FailureReason,
    FundamentalMetrics, FxRate, HistoricalReference, Horizon, HorizonValues, InstrumentClass,
    InstrumentDescriptor, InstrumentRecord, LanguageSentiment, MarketView, PriceHistory,
    QuoteSnapshot, RawQuote, RecordStatus, SentimentLabel, SentimentRecord, SignalSet,
    SignalSummary, Symbol, TechnicalIndicators, UtcDateTime,
};

// Error types
pub use error::{CoreError, ValidationError};

// HTTP client types
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};

// Pipeline
pub use pipeline::{
    FetchOrchestrator, PipelineError, QuoteFetcher, RecordSink, RunReport, RunSummary, SinkError,
    FX_SYMBOL,
};

// Retry logic
pub use retry::{retry_transient, Backoff, RetryError, RetryPolicy};

// Throttling
pub use throttling::RequestPacer;
