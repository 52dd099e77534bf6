//! Typed run configuration with explicit defaults.
//!
//! Every option can be omitted from a JSON config file; missing keys fall back to
//! [`PipelineConfig::default`]. Call [`PipelineConfig::validate`] after applying overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::retry::{Backoff, RetryPolicy};
use crate::{CoreError, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSizes {
    /// Phase 1: FX and benchmark resolution.
    pub prerequisites: usize,
    /// Phase 2: per-instrument quote, indicators and signals.
    pub quotes: usize,
    /// Phase 3: per-instrument news and sentiment.
    pub news: usize,
}

impl Default for PoolSizes {
    fn default() -> Self {
        Self {
            prerequisites: 3,
            quotes: 8,
            news: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub factor: f64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 250,
            factor: 2.0,
            max_delay_ms: 4_000,
            jitter: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentSettings {
    pub pt_weight: f64,
    pub en_weight: f64,
    pub label_threshold: f64,
    pub max_headlines: usize,
}

impl Default for SentimentSettings {
    fn default() -> Self {
        Self {
            pt_weight: 0.6,
            en_weight: 0.4,
            label_threshold: 0.1,
            max_headlines: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalThresholds {
    pub oversold_rsi: f64,
    pub overbought_rsi: f64,
    /// Fractional distance from the 52-week extreme counted as "near".
    pub near_extreme_band: f64,
    pub volume_spike_ratio: f64,
    /// Minimum bullish/bearish lead for a directional summary.
    pub summary_margin: u32,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            oversold_rsi: 30.0,
            overbought_rsi: 70.0,
            near_extreme_band: 0.05,
            volume_spike_ratio: 2.0,
            summary_margin: 2,
        }
    }
}

/// Every option recognized by the fetch orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub pools: PoolSizes,
    pub retry: RetrySettings,
    /// Budget for one network attempt.
    pub task_timeout_ms: u64,
    /// Phase-1 barrier timeout.
    pub prerequisite_timeout_ms: u64,
    /// Whole-run deadline covering phases 2 and 3.
    pub run_deadline_ms: u64,
    pub sentiment: SentimentSettings,
    pub signals: SignalThresholds,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pools: PoolSizes::default(),
            retry: RetrySettings::default(),
            task_timeout_ms: 15_000,
            prerequisite_timeout_ms: 30_000,
            run_deadline_ms: 300_000,
            sentiment: SentimentSettings::default(),
            signals: SignalThresholds::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(input: &str) -> Result<Self, CoreError> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, size) in [
            ("pools.prerequisites", self.pools.prerequisites),
            ("pools.quotes", self.pools.quotes),
            ("pools.news", self.pools.news),
        ] {
            if size == 0 {
                return Err(invalid(field, "pool size must be at least 1"));
            }
        }

        for (field, value) in [
            ("task_timeout_ms", self.task_timeout_ms),
            ("prerequisite_timeout_ms", self.prerequisite_timeout_ms),
            ("run_deadline_ms", self.run_deadline_ms),
        ] {
            if value == 0 {
                return Err(invalid(field, "timeout must be greater than zero"));
            }
        }

        if !self.retry.factor.is_finite() || self.retry.factor < 1.0 {
            return Err(invalid("retry.factor", "must be a finite value >= 1.0"));
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(invalid("retry.max_delay_ms", "must be >= retry.base_delay_ms"));
        }

        for (field, weight) in [
            ("sentiment.pt_weight", self.sentiment.pt_weight),
            ("sentiment.en_weight", self.sentiment.en_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(invalid(field, "weight must be finite and non-negative"));
            }
        }
        if self.sentiment.pt_weight + self.sentiment.en_weight <= 0.0 {
            return Err(invalid("sentiment", "weights cannot both be zero"));
        }
        if self.sentiment.max_headlines == 0 {
            return Err(invalid("sentiment.max_headlines", "must be at least 1"));
        }
        if !(0.0..1.0).contains(&self.sentiment.label_threshold) {
            return Err(invalid("sentiment.label_threshold", "must be within [0, 1)"));
        }

        let signals = &self.signals;
        if !(0.0..=100.0).contains(&signals.oversold_rsi)
            || !(0.0..=100.0).contains(&signals.overbought_rsi)
            || signals.oversold_rsi >= signals.overbought_rsi
        {
            return Err(invalid(
                "signals.oversold_rsi",
                "RSI thresholds must lie in [0, 100] with oversold < overbought",
            ));
        }
        if !(signals.near_extreme_band > 0.0 && signals.near_extreme_band < 1.0) {
            return Err(invalid("signals.near_extreme_band", "must be within (0, 1)"));
        }
        if !signals.volume_spike_ratio.is_finite() || signals.volume_spike_ratio <= 0.0 {
            return Err(invalid("signals.volume_spike_ratio", "must be positive"));
        }
        if signals.summary_margin == 0 {
            return Err(invalid("signals.summary_margin", "must be at least 1"));
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.max_retries,
            backoff: Backoff::Exponential {
                base: Duration::from_millis(self.retry.base_delay_ms),
                factor: self.retry.factor,
                max: Duration::from_millis(self.retry.max_delay_ms),
                jitter: self.retry.jitter,
            },
            attempt_timeout: self.task_timeout(),
        }
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }

    pub fn prerequisite_timeout(&self) -> Duration {
        Duration::from_millis(self.prerequisite_timeout_ms)
    }

    pub fn run_deadline(&self) -> Duration {
        Duration::from_millis(self.run_deadline_ms)
    }
}

/// Transport settings shared by the Yahoo adapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub requests_per_minute: u32,
    pub breaker_failure_threshold: u32,
    pub breaker_open_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub user_agent: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            requests_per_minute: 120,
            breaker_failure_threshold: 5,
            breaker_open_timeout_ms: 30_000,
            request_timeout_ms: 10_000,
            user_agent: format!("tickerscope/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ProviderSettings {
    pub fn breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.breaker_failure_threshold.max(1),
            open_timeout: Duration::from_millis(self.breaker_open_timeout_ms),
        }
    }
}

fn invalid(field: &'static str, reason: &str) -> ValidationError {
    ValidationError::InvalidConfig {
        field,
        reason: reason.to_owned(),
    }
}
