//! Pure derivations: indicators, signals, sentiment and benchmark comparison.
//!
//! Nothing here performs I/O or blocks.

pub mod benchmark;
pub mod indicators;
pub mod sentiment;
pub mod signals;

pub use benchmark::{compare as compare_benchmarks, BenchmarkReturns};
pub use indicators::compute_indicators;
pub use sentiment::{aggregate_language, combine as combine_sentiment};
pub use signals::detect_signals;
