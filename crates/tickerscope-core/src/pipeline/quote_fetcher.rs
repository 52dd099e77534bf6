use std::sync::Arc;

use tracing::{debug, warn};

use crate::analytics::{compare_benchmarks, compute_indicators, detect_signals, BenchmarkReturns};
use crate::config::SignalThresholds;
use crate::data_source::{MarketDataSource, MarketSnapshot};
use crate::domain::{
    FailureReason, FundamentalMetrics, FxRate, HistoricalReference, InstrumentDescriptor,
    MarketView, PriceHistory, QuoteSnapshot, Symbol,
};
use crate::retry::{retry_transient, RetryError, RetryPolicy};

/// Normalized phase-2 fetch result, before indicators and signals are derived.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedQuote {
    pub quote: QuoteSnapshot,
    pub fundamentals: FundamentalMetrics,
    pub history: HistoricalReference,
    pub daily: PriceHistory,
}

/// Fetches one instrument with the transient-retry policy and normalizes it to USD.
#[derive(Clone)]
pub struct QuoteFetcher {
    source: Arc<dyn MarketDataSource>,
    policy: RetryPolicy,
}

impl QuoteFetcher {
    pub fn new(source: Arc<dyn MarketDataSource>, policy: RetryPolicy) -> Self {
        Self { source, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Raw snapshot for `symbol`, retried on transient failures.
    pub async fn fetch_snapshot(&self, symbol: &Symbol) -> Result<MarketSnapshot, FailureReason> {
        retry_transient(&self.policy, symbol.as_str(), || self.source.fetch(symbol))
            .await
            .map_err(|error| {
                let reason = failure_reason(error);
                warn!(
                    symbol = %symbol,
                    source = self.source.name(),
                    reason = reason.code(),
                    detail = %reason.detail(),
                    "fetch failed"
                );
                reason
            })
    }

    /// Fetch and normalize one instrument against the run's FX snapshot.
    pub async fn fetch(
        &self,
        descriptor: &InstrumentDescriptor,
        fx: Option<&FxRate>,
    ) -> Result<FetchedQuote, FailureReason> {
        let snapshot = self.fetch_snapshot(&descriptor.symbol).await?;

        let Some(quote) = QuoteSnapshot::normalize(snapshot.quote, descriptor.currency, fx) else {
            return Err(FailureReason::Permanent {
                code: String::from("fx.unavailable"),
                message: format!(
                    "no FX snapshot to convert {} prices to USD",
                    descriptor.currency
                ),
            });
        };

        let history = HistoricalReference::from_histories(
            &snapshot.daily,
            &snapshot.long_range,
            quote.price,
            quote.as_of,
        );
        debug!(
            symbol = %descriptor.symbol,
            daily_bars = snapshot.daily.len(),
            long_range_bars = snapshot.long_range.len(),
            "quote normalized"
        );

        Ok(FetchedQuote {
            quote,
            fundamentals: snapshot.fundamentals,
            history,
            daily: snapshot.daily,
        })
    }
}

/// Derive indicators, benchmark deltas and signals for a fetched quote.
pub fn analyze(
    fetched: FetchedQuote,
    benchmarks: &BenchmarkReturns,
    thresholds: &SignalThresholds,
) -> MarketView {
    let indicators = compute_indicators(&fetched.daily, fetched.quote.price);
    let deltas = compare_benchmarks(&fetched.history, benchmarks);
    let signals = detect_signals(&indicators, fetched.quote.price, thresholds);

    MarketView {
        quote: fetched.quote,
        history: fetched.history,
        fundamentals: fetched.fundamentals,
        indicators,
        signals,
        benchmarks: deltas,
    }
}

pub fn failure_reason(error: RetryError) -> FailureReason {
    match error {
        RetryError::Exhausted { attempts, last } => FailureReason::TransientExhausted {
            attempts,
            last_error: last.to_string(),
        },
        RetryError::Permanent(error) => FailureReason::Permanent {
            code: error.code().to_owned(),
            message: error.message().to_owned(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::YahooMarketData;
    use crate::data_source::FetchError;
    use crate::domain::{Currency, InstrumentClass, RecordStatus, UtcDateTime};

    fn descriptor(symbol: &str, currency: Currency) -> InstrumentDescriptor {
        InstrumentDescriptor::new(symbol, "Test", "Test", InstrumentClass::EquityBr, currency)
            .expect("descriptor")
    }

    #[tokio::test]
    async fn converts_brl_quote_with_run_fx() {
        let fetcher = QuoteFetcher::new(Arc::new(YahooMarketData::synthetic()), RetryPolicy::default());
        let fx = FxRate::new(5.0, UtcDateTime::now()).expect("fx");

        let fetched = fetcher
            .fetch(&descriptor("PETR4.SA", Currency::Brl), Some(&fx))
            .await
            .expect("fetch");

        assert!((fetched.quote.price_usd - fetched.quote.price / 5.0).abs() < 1e-9);
        assert_eq!(fetched.quote.fx_rate, Some(5.0));
    }

    #[tokio::test]
    async fn brl_quote_without_fx_is_permanent_failure() {
        let fetcher = QuoteFetcher::new(Arc::new(YahooMarketData::synthetic()), RetryPolicy::default());

        let reason = fetcher
            .fetch(&descriptor("VALE3.SA", Currency::Brl), None)
            .await
            .expect_err("must fail");

        assert_eq!(reason.code(), "permanent");
    }

    #[tokio::test]
    async fn analyzed_view_without_benchmarks_is_degraded() {
        let fetcher = QuoteFetcher::new(Arc::new(YahooMarketData::synthetic()), RetryPolicy::default());
        let usd = descriptor("AAPL", Currency::Usd);
        let fetched = fetcher.fetch(&usd, None).await.expect("fetch");
        assert_eq!(fetched.quote.price, fetched.quote.price_usd);

        let view = analyze(fetched, &BenchmarkReturns::default(), &SignalThresholds::default());

        assert!(view.indicators.rsi_14.is_some());
        assert!(view.benchmarks.vs_sp500.is_none());
        let record = crate::domain::InstrumentRecord::succeeded(usd, view, None);
        assert_eq!(record.status(), RecordStatus::Degraded);
    }

    #[test]
    fn maps_retry_errors_to_failure_reasons() {
        let exhausted = failure_reason(RetryError::Exhausted {
            attempts: 3,
            last: FetchError::rate_limited("429"),
        });
        assert_eq!(
            exhausted,
            FailureReason::TransientExhausted {
                attempts: 3,
                last_error: String::from("429 (fetch.rate_limited)"),
            }
        );

        let symbol = Symbol::parse("OIBR3.SA").expect("symbol");
        let permanent = failure_reason(RetryError::Permanent(FetchError::unknown_symbol(&symbol)));
        assert!(matches!(permanent, FailureReason::Permanent { ref code, .. } if code == "fetch.unknown_symbol"));
    }
}
