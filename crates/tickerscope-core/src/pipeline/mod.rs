//! Phased fetch pipeline: bounded worker pools, quote fetching and run reporting.

pub mod orchestrator;
pub mod quote_fetcher;
pub mod report;
pub mod worker_pool;

pub use orchestrator::{FetchOrchestrator, FX_SYMBOL};
pub use quote_fetcher::{analyze, FetchedQuote, QuoteFetcher};
pub use report::{PipelineError, RecordSink, RunReport, RunSummary, SinkError};
pub use worker_pool::{run_phase, PhaseOutcome, ResultCollector};
