//! Deterministic offline data, seeded by symbol.
//!
//! The same symbol always produces the same price path and headlines, which keeps
//! `--mock` runs and tests reproducible without network access.

use time::{Duration, Time, Weekday};

use crate::adapters::lexicon;
use crate::data_source::{FetchError, Headline, Language, MarketSnapshot};
use crate::domain::{Bar, FundamentalMetrics, PriceHistory, RawQuote, Symbol, UtcDateTime};
use crate::ValidationError;

const DAILY_SESSIONS: usize = 260;
const SESSION_CLOSE_HOUR: u8 = 20;

pub fn symbol_seed(symbol: &Symbol) -> u64 {
    symbol.as_str().bytes().fold(0_u64, |acc, byte| {
        acc.wrapping_mul(33).wrapping_add(u64::from(byte))
    })
}

/// Synthetic market snapshot for `symbol` as seen at `now`.
pub fn market_snapshot(symbol: &Symbol, now: UtcDateTime) -> Result<MarketSnapshot, FetchError> {
    build_snapshot(symbol, now).map_err(|error| FetchError::malformed(error.to_string()))
}

fn build_snapshot(symbol: &Symbol, now: UtcDateTime) -> Result<MarketSnapshot, ValidationError> {
    let seed = symbol_seed(symbol);
    let mut rng = fastrand::Rng::with_seed(seed);
    let base = base_price(symbol, seed);
    let drift = (seed % 7) as f64 / 10_000.0 - 0.0002;
    let daily_vol = 0.008 + (seed % 13) as f64 / 1_000.0;

    let sessions = session_dates(now);
    let mut close = base;
    let mut daily = Vec::with_capacity(sessions.len());
    for date in &sessions {
        let open = close;
        close = (close * (1.0 + drift + daily_vol * (rng.f64() * 2.0 - 1.0))).max(0.01);
        let high = open.max(close) * (1.0 + rng.f64() * daily_vol / 2.0);
        let low = open.min(close) * (1.0 - rng.f64() * daily_vol / 2.0);
        let volume = 100_000 + seed % 900_000 + rng.u64(0..250_000);
        let ts = UtcDateTime::from_offset_datetime(date.midnight().assume_utc())?;
        daily.push(Bar::new(ts, open, high, low, close, Some(volume))?);
    }

    let long_range = monthly_history(seed, base, now, &mut rng)?;
    let last = daily.last().copied();
    let daily = PriceHistory::new(daily)?;

    let Some(last) = last else {
        return Err(ValidationError::InvalidBarRange);
    };
    let market_close = last
        .ts
        .into_inner()
        .replace_time(Time::from_hms(SESSION_CLOSE_HOUR, 0, 0).unwrap_or(Time::MIDNIGHT));
    let as_of = UtcDateTime::from_offset_datetime(market_close.min(now.into_inner()))?;

    let quote = RawQuote::new(last.close, as_of)?
        .with_range(Some(last.open), Some(last.high), Some(last.low))?
        .with_volume(last.volume);

    Ok(MarketSnapshot {
        quote,
        fundamentals: fundamentals(symbol, seed),
        daily,
        long_range,
    })
}

/// Synthetic headlines; roughly one symbol in five has no coverage in a language.
pub fn headlines(symbol: &Symbol, language: Language, now: UtcDateTime) -> Option<Vec<Headline>> {
    let seed = symbol_seed(symbol).wrapping_add(language as u64 * 7_919);
    if seed % 5 == 0 {
        return None;
    }

    let templates: &[&str] = match language {
        Language::Pt => &[
            "{} dispara após lucro recorde",
            "{} recua com pessimismo do mercado",
            "Analistas mantêm recomendação de compra para {}",
            "{} anuncia dividendos e ações sobem",
            "{} cai após rebaixamento",
            "{} divulga calendário de resultados",
        ],
        Language::En => &[
            "{} shares surge on strong growth",
            "{} slips as analysts cut targets",
            "{} announces dividend increase",
            "{} faces probe over accounting",
            "{} rallies after earnings beat",
            "{} schedules investor day",
        ],
    };

    let ticker = symbol.display_ticker();
    let count = 1 + (seed % 6) as usize;
    let items = (0..count)
        .map(|index| {
            let slot = (seed as usize).wrapping_add(index * 3) % templates.len();
            let template = templates[slot];
            let title = template.replacen("{}", ticker, 1);
            let published_at = now.saturating_sub_days(index as i64);
            Headline {
                raw_sentiment: lexicon::score(&title, language),
                title,
                published_at: Some(published_at),
            }
        })
        .collect();

    Some(items)
}

fn base_price(symbol: &Symbol, seed: u64) -> f64 {
    match symbol.as_str() {
        "^BVSP" => 125_000.0,
        "^GSPC" => 5_200.0,
        "USDBRL=X" => 5.40,
        "BTC-USD" => 60_000.0,
        "ETH-USD" => 3_000.0,
        "GC=F" => 2_300.0,
        "PA=F" | "PL=F" => 1_000.0,
        "SI=F" => 28.0,
        _ => 8.0 + (seed % 4_000) as f64 / 10.0,
    }
}

/// Weekday session dates, oldest first, ending on the latest weekday at or before `now`.
fn session_dates(now: UtcDateTime) -> Vec<time::Date> {
    let mut dates = Vec::with_capacity(DAILY_SESSIONS);
    let mut day = now.date();
    while dates.len() < DAILY_SESSIONS {
        if !matches!(day.weekday(), Weekday::Saturday | Weekday::Sunday) {
            dates.push(day);
        }
        match day.previous_day() {
            Some(previous) => day = previous,
            None => break,
        }
    }
    dates.reverse();
    dates
}

fn monthly_history(
    seed: u64,
    base: f64,
    now: UtcDateTime,
    rng: &mut fastrand::Rng,
) -> Result<PriceHistory, ValidationError> {
    // Between 3 and 20 years of monthly closes, walking backwards from `base`.
    let months = 36 + (seed % 205) as usize;
    let mut closes = Vec::with_capacity(months);
    let mut close = base;
    for _ in 0..months {
        closes.push(close);
        close = (close * (1.0 - 0.005 + rng.f64() * 0.06 - 0.03)).max(0.01);
    }
    closes.reverse();

    let newest = now.saturating_sub_days(400).date();
    let mut bars = Vec::with_capacity(months);
    for (index, close) in closes.into_iter().enumerate() {
        let back = i64::try_from(months - index).unwrap_or(i64::MAX);
        let date = newest.saturating_sub(Duration::days(back.saturating_mul(30)));
        let ts = UtcDateTime::from_offset_datetime(date.midnight().assume_utc())?;
        bars.push(Bar::new(ts, close, close * 1.04, close * 0.96, close, None)?);
    }
    PriceHistory::new(bars)
}

fn fundamentals(symbol: &Symbol, seed: u64) -> FundamentalMetrics {
    let raw = symbol.as_str();
    if raw.starts_with('^') || raw.contains('=') || raw.ends_with("-USD") {
        return FundamentalMetrics::default();
    }

    let ratings = ["strong_buy", "buy", "hold", "underperform"];
    FundamentalMetrics {
        pe_ratio: Some(6.0 + (seed % 250) as f64 / 10.0),
        forward_pe: Some(5.0 + (seed % 200) as f64 / 10.0),
        price_to_book: Some(0.6 + (seed % 60) as f64 / 10.0),
        dividend_yield: Some((seed % 120) as f64 / 1_000.0),
        eps: Some(0.5 + (seed % 90) as f64 / 10.0),
        market_cap: Some(2.0e9 + (seed % 500) as f64 * 1.0e9),
        profit_margin: Some((seed % 35) as f64 / 100.0),
        roe: Some((seed % 40) as f64 / 100.0),
        debt_to_equity: Some((seed % 180) as f64),
        beta: Some(0.5 + (seed % 15) as f64 / 10.0),
        analyst_rating: Some(ratings[(seed % 4) as usize].to_owned()),
        target_price: None,
        analyst_count: Some(3 + (seed % 20) as u32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HistoricalReference;

    fn now() -> UtcDateTime {
        UtcDateTime::parse("2025-03-12T15:30:00Z").expect("timestamp")
    }

    #[test]
    fn snapshot_is_deterministic_per_symbol() {
        let symbol = Symbol::parse("ITUB4.SA").expect("symbol");
        let first = market_snapshot(&symbol, now()).expect("snapshot");
        let second = market_snapshot(&symbol, now()).expect("snapshot");

        assert_eq!(first, second);
        assert_eq!(first.daily.len(), DAILY_SESSIONS);
        assert!(first.long_range.len() >= 36);
        assert_eq!(first.quote.as_of, now());
    }

    #[test]
    fn snapshot_supports_every_horizon() {
        let symbol = Symbol::parse("^BVSP").expect("symbol");
        let snapshot = market_snapshot(&symbol, now()).expect("snapshot");
        let reference = HistoricalReference::from_histories(
            &snapshot.daily,
            &snapshot.long_range,
            snapshot.quote.price,
            snapshot.quote.as_of,
        );

        assert!(reference.prices.one_day.is_some());
        assert!(reference.prices.one_week.is_some());
        assert!(reference.prices.one_month.is_some());
        assert!(reference.prices.ytd.is_some());
        assert!(reference.prices.all.is_some());
        assert!(snapshot.fundamentals.is_empty());
    }

    #[test]
    fn weekend_quote_uses_friday_close() {
        let saturday = UtcDateTime::parse("2025-03-15T12:00:00Z").expect("timestamp");
        let symbol = Symbol::parse("AAPL").expect("symbol");
        let snapshot = market_snapshot(&symbol, saturday).expect("snapshot");

        assert_eq!(
            snapshot.quote.as_of.format_rfc3339(),
            "2025-03-14T20:00:00Z"
        );
    }

    #[test]
    fn headlines_are_scored_with_lexicon() {
        let symbol = Symbol::parse("PETR4.SA").expect("symbol");
        for language in Language::ALL {
            if let Some(items) = headlines(&symbol, language, now()) {
                assert!(!items.is_empty());
                for item in items {
                    assert!(item.title.contains("PETR4"));
                    assert_eq!(item.raw_sentiment, lexicon::score(&item.title, language));
                }
            }
        }
    }
}
