use serde::{Deserialize, Serialize};

use crate::domain::{
    FundamentalMetrics, HistoricalReference, HorizonValues, InstrumentDescriptor, QuoteSnapshot,
    Symbol,
};

/// Technical indicators; a field is absent when its history window is not met.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalIndicators {
    pub rsi_14: Option<f64>,
    pub ma_50: Option<f64>,
    pub ma_200: Option<f64>,
    pub above_ma_50: Option<bool>,
    pub above_ma_200: Option<bool>,
    pub volatility_30d: Option<f64>,
    pub avg_volume_20d: Option<f64>,
    pub volume_ratio: Option<f64>,
    pub week_52_high: Option<f64>,
    pub week_52_low: Option<f64>,
    pub pct_from_52w_high: Option<f64>,
    pub pct_from_52w_low: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSummary {
    Bullish,
    Bearish,
    Neutral,
}

impl SignalSummary {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bullish => "bullish",
            Self::Bearish => "bearish",
            Self::Neutral => "neutral",
        }
    }
}

/// Discrete signals; `None` means the input indicator was unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalSet {
    pub oversold: Option<bool>,
    pub overbought: Option<bool>,
    pub near_52w_high: Option<bool>,
    pub near_52w_low: Option<bool>,
    pub golden_cross: Option<bool>,
    pub death_cross: Option<bool>,
    pub volume_spike: Option<bool>,
    pub summary: SignalSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }
}

/// Aggregated sentiment for one news language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageSentiment {
    pub score: f64,
    pub article_count: usize,
    pub latest_headline: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentRecord {
    pub pt: Option<LanguageSentiment>,
    pub en: Option<LanguageSentiment>,
    pub combined: f64,
    pub label: SentimentLabel,
}

impl SentimentRecord {
    pub fn article_count(&self) -> usize {
        self.pt.as_ref().map_or(0, |pt| pt.article_count)
            + self.en.as_ref().map_or(0, |en| en.article_count)
    }

    /// Most relevant headline, preferring Portuguese coverage.
    pub fn headline(&self) -> Option<&str> {
        self.pt
            .as_ref()
            .and_then(|pt| pt.latest_headline.as_deref())
            .or_else(|| self.en.as_ref().and_then(|en| en.latest_headline.as_deref()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkIndex {
    Ibovespa,
    Sp500,
}

impl BenchmarkIndex {
    pub const ALL: [Self; 2] = [Self::Ibovespa, Self::Sp500];

    pub const fn provider_symbol(self) -> &'static str {
        match self {
            Self::Ibovespa => "^BVSP",
            Self::Sp500 => "^GSPC",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ibovespa => "ibovespa",
            Self::Sp500 => "sp500",
        }
    }
}

/// Per-horizon return deltas (percentage points) against each index.
///
/// An index whose phase-1 resolution failed is absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkDeltas {
    pub vs_ibovespa: Option<HorizonValues>,
    pub vs_sp500: Option<HorizonValues>,
}

impl BenchmarkDeltas {
    pub fn get(&self, index: BenchmarkIndex) -> Option<&HorizonValues> {
        match index {
            BenchmarkIndex::Ibovespa => self.vs_ibovespa.as_ref(),
            BenchmarkIndex::Sp500 => self.vs_sp500.as_ref(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.vs_ibovespa.is_some() && self.vs_sp500.is_some()
    }
}

/// Why an instrument could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    TransientExhausted { attempts: u32, last_error: String },
    Permanent { code: String, message: String },
    DeadlineExceeded,
    WorkerAborted { message: String },
}

impl FailureReason {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::TransientExhausted { .. } => "transient_exhausted",
            Self::Permanent { .. } => "permanent",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::WorkerAborted { .. } => "worker_aborted",
        }
    }

    pub fn detail(&self) -> String {
        match self {
            Self::TransientExhausted {
                attempts,
                last_error,
            } => format!("gave up after {attempts} attempts: {last_error}"),
            Self::Permanent { code, message } => format!("{message} ({code})"),
            Self::DeadlineExceeded => String::from("run deadline exceeded before completion"),
            Self::WorkerAborted { message } => format!("worker aborted: {message}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Complete,
    Degraded,
    Failed,
}

impl RecordStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Degradation {
    SentimentUnavailable,
    BenchmarksOmitted,
}

/// Everything phase 2 derives for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketView {
    pub quote: QuoteSnapshot,
    pub history: HistoricalReference,
    pub fundamentals: FundamentalMetrics,
    pub indicators: TechnicalIndicators,
    pub signals: SignalSet,
    pub benchmarks: BenchmarkDeltas,
}

/// Aggregate result for one catalog instrument in one run.
///
/// Built once by [`InstrumentRecord::succeeded`] or [`InstrumentRecord::failed`] and
/// never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentRecord {
    descriptor: InstrumentDescriptor,
    status: RecordStatus,
    #[serde(flatten)]
    market: Option<MarketView>,
    sentiment: Option<SentimentRecord>,
    degradations: Vec<Degradation>,
    failure: Option<FailureReason>,
}

impl InstrumentRecord {
    pub fn succeeded(
        descriptor: InstrumentDescriptor,
        market: MarketView,
        sentiment: Option<SentimentRecord>,
    ) -> Self {
        let mut degradations = Vec::new();
        if sentiment.is_none() {
            degradations.push(Degradation::SentimentUnavailable);
        }
        if !market.benchmarks.is_complete() {
            degradations.push(Degradation::BenchmarksOmitted);
        }

        let status = if degradations.is_empty() {
            RecordStatus::Complete
        } else {
            RecordStatus::Degraded
        };

        Self {
            descriptor,
            status,
            market: Some(market),
            sentiment,
            degradations,
            failure: None,
        }
    }

    pub fn failed(descriptor: InstrumentDescriptor, reason: FailureReason) -> Self {
        Self {
            descriptor,
            status: RecordStatus::Failed,
            market: None,
            sentiment: None,
            degradations: Vec::new(),
            failure: Some(reason),
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.descriptor.symbol
    }

    pub fn descriptor(&self) -> &InstrumentDescriptor {
        &self.descriptor
    }

    pub fn status(&self) -> RecordStatus {
        self.status
    }

    pub fn fetch_succeeded(&self) -> bool {
        self.status != RecordStatus::Failed
    }

    pub fn market(&self) -> Option<&MarketView> {
        self.market.as_ref()
    }

    pub fn sentiment(&self) -> Option<&SentimentRecord> {
        self.sentiment.as_ref()
    }

    pub fn degradations(&self) -> &[Degradation] {
        &self.degradations
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        self.failure.as_ref()
    }
}
