use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::analytics::BenchmarkReturns;
use crate::domain::{FxRate, InstrumentRecord, RecordStatus, UtcDateTime};

/// Per-run counts handed to persistence and logged at the end of every run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub degraded: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_records(records: &[InstrumentRecord]) -> Self {
        records.iter().fold(
            Self {
                total: records.len(),
                ..Self::default()
            },
            |mut summary, record| {
                match record.status() {
                    RecordStatus::Complete => summary.succeeded += 1,
                    RecordStatus::Degraded => summary.degraded += 1,
                    RecordStatus::Failed => summary.failed += 1,
                }
                summary
            },
        )
    }
}

/// Complete output of one orchestration run, records ordered by symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub source: String,
    pub started_at: UtcDateTime,
    pub finished_at: UtcDateTime,
    pub fx_rate: Option<FxRate>,
    pub benchmarks: BenchmarkReturns,
    pub summary: RunSummary,
    pub warnings: Vec<String>,
    pub records: Vec<InstrumentRecord>,
}

impl RunReport {
    pub fn record(&self, symbol: &str) -> Option<&InstrumentRecord> {
        self.records
            .binary_search_by(|record| record.symbol().as_str().cmp(symbol))
            .ok()
            .map(|index| &self.records[index])
    }
}

/// Persistence collaborator for phase 4. Called once per run, never concurrently.
pub trait RecordSink {
    fn write_run(&mut self, report: &RunReport) -> Result<(), SinkError>;
}

#[derive(Debug, Error)]
#[error("failed to persist run: {message}")]
pub struct SinkError {
    message: String,
}

impl SinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Run-level failures. Per-instrument problems never surface here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("FX rate USD/BRL is required to normalize prices but unavailable: {reason}")]
    FxUnavailable { reason: String },

    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl PipelineError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::FxUnavailable { .. } => "pipeline.fx_unavailable",
            Self::Sink(_) => "pipeline.sink",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Currency, FailureReason, InstrumentClass, InstrumentDescriptor};

    #[test]
    fn summary_counts_every_status() {
        let descriptor = |symbol: &str| {
            InstrumentDescriptor::new(symbol, symbol, "Tech", InstrumentClass::EquityUs, Currency::Usd)
                .expect("descriptor")
        };
        let records = vec![
            InstrumentRecord::failed(descriptor("AAPL"), FailureReason::DeadlineExceeded),
            InstrumentRecord::failed(
                descriptor("MSFT"),
                FailureReason::WorkerAborted {
                    message: String::from("boom"),
                },
            ),
        ];

        let summary = RunSummary::from_records(&records);

        assert_eq!(
            summary,
            RunSummary {
                total: 2,
                succeeded: 0,
                degraded: 0,
                failed: 2,
            }
        );
    }

    #[test]
    fn fx_diagnostic_names_the_pair() {
        let error = PipelineError::FxUnavailable {
            reason: String::from("gave up after 3 attempts"),
        };
        assert!(error.to_string().contains("USD/BRL"));
        assert_eq!(error.code(), "pipeline.fx_unavailable");
    }
}
