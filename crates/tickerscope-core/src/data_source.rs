//! Collaborator contracts for market data and news providers.
//!
//! | Trait | Call | Returns |
//! |-------|------|---------|
//! | [`MarketDataSource`] | `fetch(symbol)` | [`MarketSnapshot`] or [`FetchError`] |
//! | [`NewsSource`] | `fetch_news(symbol, language)` | headlines, absent, or [`FetchError`] |
//!
//! Every [`FetchError`] is classified as transient (retry-eligible) or permanent.
//!
//! ```rust,ignore
//! use tickerscope_core::{MarketDataSource, Symbol, YahooMarketData};
//!
//! async fn last_price(source: &YahooMarketData) -> Result<f64, tickerscope_core::FetchError> {
//!     let symbol = Symbol::parse("PETR4.SA").expect("valid symbol");
//!     let snapshot = source.fetch(&symbol).await?;
//!     Ok(snapshot.quote.price)
//! }
//! ```

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::domain::{FundamentalMetrics, PriceHistory, RawQuote, Symbol, UtcDateTime};

/// Boxed future returned by source trait methods.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, FetchError>> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    Timeout,
    RateLimited,
    Transport,
    UnknownSymbol,
    MalformedPayload,
}

/// Structured provider failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    kind: FetchErrorKind,
    message: String,
}

impl FetchError {
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Timeout, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::RateLimited, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Transport, message)
    }

    pub fn unknown_symbol(symbol: &Symbol) -> Self {
        Self::new(
            FetchErrorKind::UnknownSymbol,
            format!("symbol '{symbol}' is unknown or delisted"),
        )
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::MalformedPayload, message)
    }

    fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Timeouts, rate limiting and transport errors are worth retrying.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            FetchErrorKind::Timeout | FetchErrorKind::RateLimited | FetchErrorKind::Transport
        )
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            FetchErrorKind::Timeout => "fetch.timeout",
            FetchErrorKind::RateLimited => "fetch.rate_limited",
            FetchErrorKind::Transport => "fetch.transport",
            FetchErrorKind::UnknownSymbol => "fetch.unknown_symbol",
            FetchErrorKind::MalformedPayload => "fetch.malformed_payload",
        }
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for FetchError {}

/// Everything a market data provider returns for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub quote: RawQuote,
    pub fundamentals: FundamentalMetrics,
    /// Roughly one year of daily bars, oldest first.
    pub daily: PriceHistory,
    /// Full available history at monthly granularity.
    pub long_range: PriceHistory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Pt,
    En,
}

impl Language {
    pub const ALL: [Self; 2] = [Self::Pt, Self::En];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pt => "pt",
            Self::En => "en",
        }
    }
}

impl Display for Language {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One news item with its raw sentiment in [-1, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    pub published_at: Option<UtcDateTime>,
    pub raw_sentiment: f64,
}

/// Market data provider.
///
/// Implementations must be `Send + Sync`; the orchestrator shares one instance across workers.
pub trait MarketDataSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn fetch<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, MarketSnapshot>;
}

/// News provider. `Ok(None)` means the provider has no coverage for the symbol.
pub trait NewsSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn fetch_news<'a>(
        &'a self,
        symbol: &'a Symbol,
        language: Language,
    ) -> SourceFuture<'a, Option<Vec<Headline>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_transient_and_permanent_errors() {
        let symbol = Symbol::parse("ZZZZ3.SA").expect("symbol");

        assert!(FetchError::timeout("slow").is_transient());
        assert!(FetchError::rate_limited("429").is_transient());
        assert!(FetchError::transport("reset").is_transient());
        assert!(!FetchError::unknown_symbol(&symbol).is_transient());
        assert!(!FetchError::malformed("bad json").is_transient());
    }

    #[test]
    fn displays_message_with_code() {
        let error = FetchError::rate_limited("too many requests");
        assert_eq!(
            error.to_string(),
            "too many requests (fetch.rate_limited)"
        );
    }
}
