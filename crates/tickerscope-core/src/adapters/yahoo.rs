use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::adapters::synthetic;
use crate::circuit_breaker::CircuitBreaker;
use crate::config::ProviderSettings;
use crate::data_source::{FetchError, MarketDataSource, MarketSnapshot, SourceFuture};
use crate::domain::{Bar, FundamentalMetrics, PriceHistory, RawQuote, Symbol, UtcDateTime};
use crate::http_client::{HttpClient, HttpRequest, HttpResponse, ReqwestHttpClient};
use crate::throttling::RequestPacer;

const REFERER: &str = "https://finance.yahoo.com/";
const CRUMB_TTL: Duration = Duration::from_secs(3_600);

// ============================================================================
// Shared transport: pacing, circuit breaking and status classification
// ============================================================================

/// HTTP access to Yahoo shared by the market data and news adapters.
pub struct YahooTransport {
    http_client: Arc<dyn HttpClient>,
    circuit_breaker: CircuitBreaker,
    pacer: RequestPacer,
    request_timeout_ms: u64,
    crumb: tokio::sync::Mutex<Option<(String, Instant)>>,
}

impl YahooTransport {
    pub fn new(settings: &ProviderSettings) -> Self {
        Self::with_http_client(
            Arc::new(ReqwestHttpClient::new(&settings.user_agent)),
            settings,
        )
    }

    pub fn with_http_client(http_client: Arc<dyn HttpClient>, settings: &ProviderSettings) -> Self {
        Self {
            http_client,
            circuit_breaker: CircuitBreaker::new("yahoo", settings.breaker_config()),
            pacer: RequestPacer::per_minute(settings.requests_per_minute),
            request_timeout_ms: settings.request_timeout_ms,
            crumb: tokio::sync::Mutex::new(None),
        }
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    /// Paced GET. Rate limiting and 5xx responses become transient errors; any other
    /// status is returned for the caller to interpret.
    pub(crate) async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        if !self.circuit_breaker.allow_request() {
            return Err(FetchError::transport(
                "yahoo circuit breaker is open; skipping upstream call",
            ));
        }

        self.pacer.until_ready().await;
        let request = HttpRequest::get(url)
            .with_header("referer", REFERER)
            .with_header("accept", "application/json")
            .with_timeout_ms(self.request_timeout_ms);

        let response = match self.http_client.execute(request).await {
            Ok(response) => response,
            Err(error) => {
                self.circuit_breaker.record_failure();
                return Err(error.into());
            }
        };

        match response.status {
            429 => {
                self.circuit_breaker.record_failure();
                Err(FetchError::rate_limited("yahoo returned 429 Too Many Requests"))
            }
            500..=599 => {
                self.circuit_breaker.record_failure();
                Err(FetchError::transport(format!(
                    "yahoo returned status {}",
                    response.status
                )))
            }
            _ => {
                self.circuit_breaker.record_success();
                Ok(response)
            }
        }
    }

    /// Cached session crumb required by the quoteSummary endpoint.
    async fn crumb(&self) -> Result<String, FetchError> {
        let mut cached = self.crumb.lock().await;
        if let Some((crumb, fetched_at)) = cached.as_ref() {
            if fetched_at.elapsed() < CRUMB_TTL {
                return Ok(crumb.clone());
            }
        }

        // Session cookies land in the client's cookie jar.
        let _ = self.get("https://fc.yahoo.com").await;

        for endpoint in [
            "https://query1.finance.yahoo.com/v1/test/getcrumb",
            "https://query2.finance.yahoo.com/v1/test/getcrumb",
        ] {
            let Ok(response) = self.get(endpoint).await else {
                continue;
            };
            let body = response.body.trim();
            if !response.is_success() || body.is_empty() || body.contains("<html") {
                continue;
            }
            if body.to_ascii_lowercase().contains("too many requests") {
                return Err(FetchError::rate_limited("yahoo rate limited while fetching crumb"));
            }
            if body.len() < 100 && !body.contains(' ') {
                *cached = Some((body.to_owned(), Instant::now()));
                return Ok(body.to_owned());
            }
        }

        Err(FetchError::transport("failed to fetch yahoo crumb from all endpoints"))
    }

    async fn invalidate_crumb(&self) {
        *self.crumb.lock().await = None;
    }
}

// ============================================================================
// Market data adapter
// ============================================================================

enum Mode {
    Live(Arc<YahooTransport>),
    Synthetic,
}

/// Yahoo Finance market data: chart API for quote and history, quoteSummary for fundamentals.
///
/// The synthetic mode serves deterministic offline data instead.
pub struct YahooMarketData {
    mode: Mode,
}

impl YahooMarketData {
    pub fn live(transport: Arc<YahooTransport>) -> Self {
        Self {
            mode: Mode::Live(transport),
        }
    }

    pub fn synthetic() -> Self {
        Self {
            mode: Mode::Synthetic,
        }
    }
}

impl MarketDataSource for YahooMarketData {
    fn name(&self) -> &'static str {
        match self.mode {
            Mode::Live(_) => "yahoo",
            Mode::Synthetic => "synthetic",
        }
    }

    fn fetch<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, MarketSnapshot> {
        Box::pin(async move {
            match &self.mode {
                Mode::Live(transport) => fetch_live(transport, symbol).await,
                Mode::Synthetic => synthetic::market_snapshot(symbol, UtcDateTime::now()),
            }
        })
    }
}

async fn fetch_live(transport: &YahooTransport, symbol: &Symbol) -> Result<MarketSnapshot, FetchError> {
    let daily_body = get_chart(transport, symbol, "1y", "1d").await?;
    let daily = parse_chart(symbol, &daily_body)?;
    let long_body = get_chart(transport, symbol, "max", "1mo").await?;
    let long_range = parse_chart(symbol, &long_body)?;

    let quote = quote_from_chart(&daily)?;

    let fundamentals = if carries_fundamentals(symbol) {
        match fetch_fundamentals(transport, symbol).await {
            Ok(fundamentals) => fundamentals,
            Err(error) => {
                debug!(symbol = %symbol, error = %error, "fundamentals unavailable, continuing without");
                FundamentalMetrics::default()
            }
        }
    } else {
        FundamentalMetrics::default()
    };

    Ok(MarketSnapshot {
        quote,
        fundamentals,
        daily: daily.history,
        long_range: long_range.history,
    })
}

async fn get_chart(
    transport: &YahooTransport,
    symbol: &Symbol,
    range: &str,
    interval: &str,
) -> Result<String, FetchError> {
    let url = format!(
        "https://query1.finance.yahoo.com/v8/finance/chart/{}?range={range}&interval={interval}&includePrePost=false",
        urlencoding::encode(symbol.as_str()),
    );
    let response = transport.get(&url).await?;

    match response.status {
        404 => Err(FetchError::unknown_symbol(symbol)),
        status if !(200..300).contains(&status) => Err(FetchError::malformed(format!(
            "yahoo chart returned status {status}"
        ))),
        _ => Ok(response.body),
    }
}

/// Indices, futures, FX pairs and crypto carry no company fundamentals.
fn carries_fundamentals(symbol: &Symbol) -> bool {
    let raw = symbol.as_str();
    !(raw.starts_with('^') || raw.contains('=') || raw.ends_with("-USD"))
}

async fn fetch_fundamentals(
    transport: &YahooTransport,
    symbol: &Symbol,
) -> Result<FundamentalMetrics, FetchError> {
    let mut refreshed = false;
    loop {
        let crumb = transport.crumb().await?;
        let url = format!(
            "https://query2.finance.yahoo.com/v10/finance/quoteSummary/{}?modules=summaryDetail,defaultKeyStatistics,financialData&crumb={}",
            urlencoding::encode(symbol.as_str()),
            urlencoding::encode(&crumb),
        );
        let response = transport.get(&url).await?;

        if response.status == 401 && !refreshed {
            warn!(symbol = %symbol, "yahoo rejected crumb, refreshing session");
            transport.invalidate_crumb().await;
            refreshed = true;
            continue;
        }
        if !response.is_success() {
            return Err(FetchError::malformed(format!(
                "yahoo quoteSummary returned status {}",
                response.status
            )));
        }
        return parse_fundamentals(&response.body);
    }
}

// ============================================================================
// Chart API parsing
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    regular_market_price: Option<f64>,
    #[serde(default)]
    regular_market_time: Option<i64>,
    #[serde(default)]
    regular_market_day_high: Option<f64>,
    #[serde(default)]
    regular_market_day_low: Option<f64>,
    #[serde(default)]
    regular_market_volume: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

struct ParsedChart {
    meta: ChartMeta,
    history: PriceHistory,
}

fn parse_chart(symbol: &Symbol, body: &str) -> Result<ParsedChart, FetchError> {
    let envelope: ChartEnvelope = serde_json::from_str(body)
        .map_err(|error| FetchError::malformed(format!("failed to parse yahoo chart: {error}")))?;

    if let Some(error) = envelope.chart.error {
        if error.code.eq_ignore_ascii_case("Not Found") {
            return Err(FetchError::unknown_symbol(symbol));
        }
        return Err(FetchError::malformed(format!(
            "yahoo chart error {}: {}",
            error.code,
            error.description.unwrap_or_default()
        )));
    }

    let Some(result) = envelope.chart.result.and_then(|results| results.into_iter().next()) else {
        return Err(FetchError::unknown_symbol(symbol));
    };

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    // Keyed by epoch seconds: Yahoo occasionally repeats the live bar.
    let mut bars = BTreeMap::new();
    for (index, &epoch) in result.timestamp.iter().enumerate() {
        let field = |values: &[Option<f64>]| values.get(index).copied().flatten();
        let (Some(open), Some(high), Some(low), Some(close)) = (
            field(&quote.open),
            field(&quote.high),
            field(&quote.low),
            field(&quote.close),
        ) else {
            continue;
        };
        let Ok(ts) = UtcDateTime::from_unix_timestamp(epoch) else {
            continue;
        };
        let volume = quote.volume.get(index).copied().flatten();
        if let Ok(bar) = Bar::new(ts, open, high, low, close, volume) {
            bars.insert(epoch, bar);
        }
    }

    let history = PriceHistory::new(bars.into_values().collect())
        .map_err(|error| FetchError::malformed(error.to_string()))?;

    Ok(ParsedChart {
        meta: result.meta,
        history,
    })
}

fn quote_from_chart(chart: &ParsedChart) -> Result<RawQuote, FetchError> {
    let last = chart.history.last();
    let price = chart
        .meta
        .regular_market_price
        .or_else(|| last.map(|bar| bar.close))
        .ok_or_else(|| FetchError::malformed("yahoo chart carries no price"))?;

    let as_of = chart
        .meta
        .regular_market_time
        .and_then(|epoch| UtcDateTime::from_unix_timestamp(epoch).ok())
        .or_else(|| last.map(|bar| bar.ts))
        .unwrap_or_else(UtcDateTime::now);

    let open = last
        .filter(|bar| bar.ts.date() == as_of.date())
        .map(|bar| bar.open);

    RawQuote::new(price, as_of)
        .and_then(|quote| {
            quote.with_range(
                open,
                chart.meta.regular_market_day_high,
                chart.meta.regular_market_day_low,
            )
        })
        .map(|quote| quote.with_volume(chart.meta.regular_market_volume))
        .map_err(|error| FetchError::malformed(error.to_string()))
}

// ============================================================================
// quoteSummary parsing
// ============================================================================

#[derive(Debug, Deserialize)]
struct SummaryEnvelope {
    #[serde(rename = "quoteSummary")]
    quote_summary: SummaryBody,
}

#[derive(Debug, Deserialize)]
struct SummaryBody {
    #[serde(default)]
    result: Option<Vec<SummaryResult>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResult {
    #[serde(default)]
    summary_detail: SummaryDetail,
    #[serde(default)]
    default_key_statistics: KeyStatistics,
    #[serde(default)]
    financial_data: FinancialData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDetail {
    #[serde(default, rename = "trailingPE")]
    trailing_pe: RawValue,
    #[serde(default, rename = "forwardPE")]
    forward_pe: RawValue,
    #[serde(default)]
    dividend_yield: RawValue,
    #[serde(default)]
    market_cap: RawValue,
    #[serde(default)]
    beta: RawValue,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyStatistics {
    #[serde(default)]
    price_to_book: RawValue,
    #[serde(default)]
    trailing_eps: RawValue,
    #[serde(default, rename = "forwardPE")]
    forward_pe: RawValue,
    #[serde(default)]
    beta: RawValue,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinancialData {
    #[serde(default)]
    profit_margins: RawValue,
    #[serde(default)]
    return_on_equity: RawValue,
    #[serde(default)]
    debt_to_equity: RawValue,
    #[serde(default)]
    recommendation_key: Option<String>,
    #[serde(default)]
    target_mean_price: RawValue,
    #[serde(default)]
    number_of_analyst_opinions: RawValue,
}

/// Yahoo wraps numbers as `{ "raw": 1.23, "fmt": "1.23" }`, or `{}` when unknown.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
struct RawValue {
    #[serde(default)]
    raw: Option<f64>,
}

impl RawValue {
    fn value(self) -> Option<f64> {
        self.raw.filter(|value| value.is_finite())
    }
}

fn parse_fundamentals(body: &str) -> Result<FundamentalMetrics, FetchError> {
    let envelope: SummaryEnvelope = serde_json::from_str(body).map_err(|error| {
        FetchError::malformed(format!("failed to parse yahoo fundamentals: {error}"))
    })?;

    let result = envelope
        .quote_summary
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| FetchError::malformed("yahoo quoteSummary returned no result"))?;

    let detail = result.summary_detail;
    let stats = result.default_key_statistics;
    let financial = result.financial_data;

    Ok(FundamentalMetrics {
        pe_ratio: detail.trailing_pe.value(),
        forward_pe: detail.forward_pe.value().or_else(|| stats.forward_pe.value()),
        price_to_book: stats.price_to_book.value(),
        dividend_yield: detail.dividend_yield.value(),
        eps: stats.trailing_eps.value(),
        market_cap: detail.market_cap.value(),
        profit_margin: financial.profit_margins.value(),
        roe: financial.return_on_equity.value(),
        debt_to_equity: financial.debt_to_equity.value(),
        beta: detail.beta.value().or_else(|| stats.beta.value()),
        analyst_rating: financial
            .recommendation_key
            .filter(|key| !key.is_empty() && key != "none"),
        target_price: financial.target_mean_price.value(),
        analyst_count: financial
            .number_of_analyst_opinions
            .value()
            .filter(|count| *count >= 0.0)
            .map(|count| count as u32),
    })
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use super::*;
    use crate::data_source::FetchErrorKind;
    use crate::http_client::HttpError;

    /// Serves canned responses in order and records requested URLs.
    struct CannedHttpClient {
        responses: Mutex<Vec<Result<HttpResponse, HttpError>>>,
        urls: Mutex<Vec<String>>,
    }

    impl CannedHttpClient {
        fn new(mut responses: Vec<Result<HttpResponse, HttpError>>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                urls: Mutex::new(Vec::new()),
            }
        }

        fn urls(&self) -> Vec<String> {
            self.urls.lock().expect("urls lock").clone()
        }
    }

    impl HttpClient for CannedHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            self.urls.lock().expect("urls lock").push(request.url);
            let next = self
                .responses
                .lock()
                .expect("responses lock")
                .pop()
                .unwrap_or_else(|| Err(HttpError::new("no canned response left")));
            Box::pin(async move { next })
        }
    }

    const DAILY_CHART: &str = r#"{
        "chart": {
            "result": [{
                "meta": {
                    "regularMarketPrice": 12.5,
                    "regularMarketTime": 1741795200,
                    "regularMarketDayHigh": 12.9,
                    "regularMarketDayLow": 12.1,
                    "regularMarketVolume": 4200
                },
                "timestamp": [1741564800, 1741651200, 1741737600, 1741795200, 1741795200],
                "indicators": { "quote": [{
                    "open":   [11.0, 11.5, null, 12.2, 12.3],
                    "high":   [11.6, 12.0, 12.4, 12.9, 12.9],
                    "low":    [10.9, 11.4, 11.8, 12.1, 12.1],
                    "close":  [11.5, 11.9, 12.0, 12.4, 12.5],
                    "volume": [1000, 1100, 1200, 4000, 4200]
                }]}
            }],
            "error": null
        }
    }"#;

    const NOT_FOUND_CHART: &str = r#"{
        "chart": { "result": null, "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" } }
    }"#;

    fn settings() -> ProviderSettings {
        ProviderSettings {
            requests_per_minute: 6_000,
            breaker_failure_threshold: 2,
            ..ProviderSettings::default()
        }
    }

    #[test]
    fn parses_chart_and_deduplicates_repeated_bar() {
        let symbol = Symbol::parse("PETR4.SA").expect("symbol");
        let chart = parse_chart(&symbol, DAILY_CHART).expect("chart should parse");

        // The incomplete bar (null open) is skipped and the repeated live bar collapses.
        assert_eq!(chart.history.len(), 3);
        assert_eq!(chart.history.last().map(|bar| bar.close), Some(12.5));

        let quote = quote_from_chart(&chart).expect("quote");
        assert_eq!(quote.price, 12.5);
        assert_eq!(quote.volume, Some(4200));
        assert_eq!(quote.open, Some(12.3));
        assert_eq!(quote.as_of.format_rfc3339(), "2025-03-12T16:00:00Z");
    }

    #[test]
    fn chart_not_found_is_permanent_unknown_symbol() {
        let symbol = Symbol::parse("OIBR3.SA").expect("symbol");
        let error = parse_chart(&symbol, NOT_FOUND_CHART).err().expect("must fail");
        assert_eq!(error.kind(), FetchErrorKind::UnknownSymbol);
        assert!(!error.is_transient());
    }

    #[test]
    fn garbage_payload_is_malformed() {
        let symbol = Symbol::parse("VALE3.SA").expect("symbol");
        let error = parse_chart(&symbol, "<html>oops</html>").err().expect("must fail");
        assert_eq!(error.kind(), FetchErrorKind::MalformedPayload);
    }

    #[test]
    fn parses_fundamentals_with_fallbacks() {
        let body = r#"{"quoteSummary":{"result":[{
            "summaryDetail": {"trailingPE": {"raw": 8.4}, "dividendYield": {"raw": 0.11}, "marketCap": {"raw": 5.1e11}, "forwardPE": {}},
            "defaultKeyStatistics": {"priceToBook": {"raw": 1.2}, "trailingEps": {"raw": 4.3}, "forwardPE": {"raw": 6.1}, "beta": {"raw": 1.3}},
            "financialData": {"recommendationKey": "buy", "numberOfAnalystOpinions": {"raw": 14}, "targetMeanPrice": {"raw": 45.0}}
        }],"error":null}}"#;

        let fundamentals = parse_fundamentals(body).expect("fundamentals");

        assert_eq!(fundamentals.pe_ratio, Some(8.4));
        assert_eq!(fundamentals.forward_pe, Some(6.1));
        assert_eq!(fundamentals.beta, Some(1.3));
        assert_eq!(fundamentals.analyst_rating.as_deref(), Some("buy"));
        assert_eq!(fundamentals.analyst_count, Some(14));
        assert_eq!(fundamentals.roe, None);
    }

    #[tokio::test]
    async fn rate_limit_status_is_transient() {
        let client = Arc::new(CannedHttpClient::new(vec![Ok(HttpResponse {
            status: 429,
            body: String::new(),
        })]));
        let transport = Arc::new(YahooTransport::with_http_client(client, &settings()));
        let source = YahooMarketData::live(transport);
        let symbol = Symbol::parse("^GSPC").expect("symbol");

        let error = source.fetch(&symbol).await.expect_err("must fail");
        assert_eq!(error.kind(), FetchErrorKind::RateLimited);
        assert!(error.is_transient());
    }

    #[tokio::test]
    async fn index_fetch_skips_fundamentals() {
        let client = Arc::new(CannedHttpClient::new(vec![
            Ok(HttpResponse::ok_json(DAILY_CHART)),
            Ok(HttpResponse::ok_json(DAILY_CHART)),
        ]));
        let transport = Arc::new(YahooTransport::with_http_client(client.clone(), &settings()));
        let source = YahooMarketData::live(transport);
        let symbol = Symbol::parse("^BVSP").expect("symbol");

        let snapshot = source.fetch(&symbol).await.expect("snapshot");

        assert!(snapshot.fundamentals.is_empty());
        let urls = client.urls();
        assert_eq!(urls.len(), 2);
        assert!(urls[0].contains("%5EBVSP") && urls[0].contains("interval=1d"));
        assert!(urls[1].contains("range=max&interval=1mo"));
    }

    #[tokio::test]
    async fn breaker_opens_after_repeated_transport_failures() {
        let client = Arc::new(CannedHttpClient::new(vec![
            Err(HttpError::new("connection reset")),
            Err(HttpError::new("connection reset")),
        ]));
        let transport = Arc::new(YahooTransport::with_http_client(client, &settings()));
        let source = YahooMarketData::live(transport.clone());
        let symbol = Symbol::parse("AAPL").expect("symbol");

        for _ in 0..2 {
            let error = source.fetch(&symbol).await.expect_err("must fail");
            assert_eq!(error.kind(), FetchErrorKind::Transport);
        }

        let error = source.fetch(&symbol).await.expect_err("breaker should block");
        assert!(error.message().contains("circuit breaker is open"));
        assert_eq!(
            transport.circuit_breaker().state(),
            crate::circuit_breaker::CircuitState::Open
        );
    }
}
