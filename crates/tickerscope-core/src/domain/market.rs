use serde::{Deserialize, Serialize};

use crate::domain::{Currency, UtcDateTime};
use crate::ValidationError;

const FIVE_YEARS_DAYS: i64 = 1826;

/// One OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub ts: UtcDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<u64>,
}

impl Bar {
    pub fn new(
        ts: UtcDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: Option<u64>,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("open", open)?;
        validate_non_negative("high", high)?;
        validate_non_negative("low", low)?;
        validate_non_negative("close", close)?;

        if high < low {
            return Err(ValidationError::InvalidBarRange);
        }

        Ok(Self {
            ts,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

/// Time-ordered series of bars, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    bars: Vec<Bar>,
}

impl PriceHistory {
    pub fn new(bars: Vec<Bar>) -> Result<Self, ValidationError> {
        if bars.windows(2).any(|pair| pair[0].ts >= pair[1].ts) {
            return Err(ValidationError::UnorderedBars);
        }
        Ok(Self { bars })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|bar| bar.close).collect()
    }

    /// Latest bar satisfying `keep`, scanning from the newest.
    fn latest_where(&self, keep: impl Fn(&Bar) -> bool) -> Option<&Bar> {
        self.bars.iter().rev().find(|bar| keep(bar))
    }
}

/// Quote as reported by a market data provider, in the instrument's home currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawQuote {
    pub price: f64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<u64>,
    pub as_of: UtcDateTime,
}

impl RawQuote {
    pub fn new(price: f64, as_of: UtcDateTime) -> Result<Self, ValidationError> {
        validate_positive("price", price)?;
        Ok(Self {
            price,
            open: None,
            high: None,
            low: None,
            volume: None,
            as_of,
        })
    }

    pub fn with_range(
        mut self,
        open: Option<f64>,
        high: Option<f64>,
        low: Option<f64>,
    ) -> Result<Self, ValidationError> {
        validate_optional_non_negative("open", open)?;
        validate_optional_non_negative("high", high)?;
        validate_optional_non_negative("low", low)?;
        if let (Some(high), Some(low)) = (high, low) {
            if high < low {
                return Err(ValidationError::InvalidBarRange);
            }
        }
        self.open = open;
        self.high = high;
        self.low = low;
        Ok(self)
    }

    pub fn with_volume(mut self, volume: Option<u64>) -> Self {
        self.volume = volume;
        self
    }
}

/// Run-wide USD/BRL snapshot, BRL per one USD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FxRate {
    pub brl_per_usd: f64,
    pub as_of: UtcDateTime,
}

impl FxRate {
    pub fn new(brl_per_usd: f64, as_of: UtcDateTime) -> Result<Self, ValidationError> {
        validate_positive("brl_per_usd", brl_per_usd)?;
        Ok(Self { brl_per_usd, as_of })
    }

    pub fn to_usd(&self, amount: f64, currency: Currency) -> f64 {
        match currency {
            Currency::Usd => amount,
            Currency::Brl => amount / self.brl_per_usd,
        }
    }
}

/// Normalized quote carried by an instrument record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub price: f64,
    pub currency: Currency,
    pub price_usd: f64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<u64>,
    pub as_of: UtcDateTime,
    /// Rate used for `price_usd`; absent for USD instruments.
    pub fx_rate: Option<f64>,
}

impl QuoteSnapshot {
    /// Normalize a raw quote. `fx` may be absent only for USD instruments.
    pub fn normalize(raw: RawQuote, currency: Currency, fx: Option<&FxRate>) -> Option<Self> {
        let (price_usd, fx_rate) = match (currency, fx) {
            (Currency::Usd, _) => (raw.price, None),
            (_, Some(fx)) => (fx.to_usd(raw.price, currency), Some(fx.brl_per_usd)),
            (_, None) => return None,
        };

        Some(Self {
            price: raw.price,
            currency,
            price_usd,
            open: raw.open,
            high: raw.high,
            low: raw.low,
            volume: raw.volume,
            as_of: raw.as_of,
            fx_rate,
        })
    }
}

/// Valuation and analyst fields; each is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalMetrics {
    pub pe_ratio: Option<f64>,
    pub forward_pe: Option<f64>,
    pub price_to_book: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub eps: Option<f64>,
    pub market_cap: Option<f64>,
    pub profit_margin: Option<f64>,
    pub roe: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub beta: Option<f64>,
    pub analyst_rating: Option<String>,
    pub target_price: Option<f64>,
    pub analyst_count: Option<u32>,
}

impl FundamentalMetrics {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Horizon {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "1m")]
    OneMonth,
    #[serde(rename = "ytd")]
    Ytd,
    #[serde(rename = "5y")]
    FiveYears,
    #[serde(rename = "all")]
    All,
}

impl Horizon {
    pub const ALL: [Self; 6] = [
        Self::OneDay,
        Self::OneWeek,
        Self::OneMonth,
        Self::Ytd,
        Self::FiveYears,
        Self::All,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneDay => "1d",
            Self::OneWeek => "1w",
            Self::OneMonth => "1m",
            Self::Ytd => "ytd",
            Self::FiveYears => "5y",
            Self::All => "all",
        }
    }
}

/// One optional value per horizon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HorizonValues {
    #[serde(rename = "1d")]
    pub one_day: Option<f64>,
    #[serde(rename = "1w")]
    pub one_week: Option<f64>,
    #[serde(rename = "1m")]
    pub one_month: Option<f64>,
    pub ytd: Option<f64>,
    #[serde(rename = "5y")]
    pub five_years: Option<f64>,
    pub all: Option<f64>,
}

impl HorizonValues {
    pub fn get(&self, horizon: Horizon) -> Option<f64> {
        match horizon {
            Horizon::OneDay => self.one_day,
            Horizon::OneWeek => self.one_week,
            Horizon::OneMonth => self.one_month,
            Horizon::Ytd => self.ytd,
            Horizon::FiveYears => self.five_years,
            Horizon::All => self.all,
        }
    }

    pub fn set(&mut self, horizon: Horizon, value: Option<f64>) {
        let slot = match horizon {
            Horizon::OneDay => &mut self.one_day,
            Horizon::OneWeek => &mut self.one_week,
            Horizon::OneMonth => &mut self.one_month,
            Horizon::Ytd => &mut self.ytd,
            Horizon::FiveYears => &mut self.five_years,
            Horizon::All => &mut self.all,
        };
        *slot = value;
    }

    pub fn from_fn(mut f: impl FnMut(Horizon) -> Option<f64>) -> Self {
        let mut values = Self::default();
        for horizon in Horizon::ALL {
            values.set(horizon, f(horizon));
        }
        values
    }
}

/// Reference prices per horizon and the percent return of `price` against each.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalReference {
    pub prices: HorizonValues,
    pub returns: HorizonValues,
}

impl HistoricalReference {
    /// Derive reference prices from daily and long-range (monthly) histories.
    ///
    /// A horizon the histories do not reach is left absent, together with its return.
    pub fn from_histories(
        daily: &PriceHistory,
        long_range: &PriceHistory,
        price: f64,
        as_of: UtcDateTime,
    ) -> Self {
        let as_of_date = as_of.date();
        let week_cutoff = as_of.saturating_sub_days(7);
        let month_cutoff = as_of.saturating_sub_days(30);
        let year_start = as_of.start_of_year();
        let five_year_cutoff = as_of.saturating_sub_days(FIVE_YEARS_DAYS);

        let prices = HorizonValues::from_fn(|horizon| match horizon {
            Horizon::OneDay => daily
                .latest_where(|bar| bar.ts.date() < as_of_date)
                .map(|bar| bar.close),
            Horizon::OneWeek => latest_close(daily, long_range, |bar| bar.ts <= week_cutoff),
            Horizon::OneMonth => latest_close(daily, long_range, |bar| bar.ts <= month_cutoff),
            Horizon::Ytd => latest_close(daily, long_range, |bar| bar.ts < year_start),
            Horizon::FiveYears => {
                latest_close(daily, long_range, |bar| bar.ts <= five_year_cutoff)
            }
            Horizon::All => long_range.first().map(|bar| bar.close),
        });

        let returns = HorizonValues::from_fn(|horizon| {
            prices
                .get(horizon)
                .and_then(|reference| percent_change(price, reference))
        });

        Self { prices, returns }
    }
}

fn latest_close(
    daily: &PriceHistory,
    long_range: &PriceHistory,
    keep: impl Fn(&Bar) -> bool,
) -> Option<f64> {
    let from_daily = daily.latest_where(&keep);
    let from_long = long_range.latest_where(&keep);
    match (from_daily, from_long) {
        (Some(a), Some(b)) => Some(if a.ts >= b.ts { a.close } else { b.close }),
        (Some(bar), None) | (None, Some(bar)) => Some(bar.close),
        (None, None) => None,
    }
}

/// `(price / reference - 1) * 100`, absent for a non-positive reference.
pub fn percent_change(price: f64, reference: f64) -> Option<f64> {
    if !reference.is_finite() || reference <= 0.0 || !price.is_finite() {
        return None;
    }
    Some((price / reference - 1.0) * 100.0)
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

fn validate_optional_non_negative(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    match value {
        Some(value) => validate_non_negative(field, value),
        None => Ok(()),
    }
}

fn validate_positive(field: &'static str, value: f64) -> Result<(), ValidationError> {
    validate_non_negative(field, value)?;
    if value == 0.0 {
        return Err(ValidationError::NonPositiveValue { field });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(value: &str) -> UtcDateTime {
        UtcDateTime::parse(value).expect("valid timestamp")
    }

    fn bar(at: &str, close: f64) -> Bar {
        Bar::new(ts(at), close, close, close, close, Some(1_000)).expect("valid bar")
    }

    #[test]
    fn rejects_unordered_bars() {
        let err = PriceHistory::new(vec![
            bar("2025-03-02T00:00:00Z", 10.0),
            bar("2025-03-01T00:00:00Z", 11.0),
        ])
        .expect_err("must fail");
        assert_eq!(err, ValidationError::UnorderedBars);
    }

    #[test]
    fn rejects_inverted_bar_range() {
        let err = Bar::new(ts("2025-03-01T00:00:00Z"), 1.0, 1.0, 2.0, 1.5, None)
            .expect_err("must fail");
        assert_eq!(err, ValidationError::InvalidBarRange);
    }

    #[test]
    fn converts_brl_by_division_and_passes_usd_through() {
        let fx = FxRate::new(5.0, ts("2025-03-10T15:00:00Z")).expect("fx");
        assert_eq!(fx.to_usd(50.0, Currency::Brl), 10.0);
        assert_eq!(fx.to_usd(50.0, Currency::Usd), 50.0);

        let raw = RawQuote::new(25.0, ts("2025-03-10T15:00:00Z")).expect("quote");
        assert!(QuoteSnapshot::normalize(raw, Currency::Brl, None).is_none());
        let usd = QuoteSnapshot::normalize(raw, Currency::Usd, None).expect("usd quote");
        assert_eq!(usd.price_usd, 25.0);
        assert_eq!(usd.fx_rate, None);
    }

    #[test]
    fn derives_reference_prices_per_horizon() {
        let daily = PriceHistory::new(vec![
            bar("2024-12-30T00:00:00Z", 80.0),
            bar("2025-02-07T00:00:00Z", 90.0),
            bar("2025-03-03T00:00:00Z", 95.0),
            bar("2025-03-07T00:00:00Z", 98.0),
            bar("2025-03-10T00:00:00Z", 100.0),
        ])
        .expect("daily");
        let monthly = PriceHistory::new(vec![
            bar("2018-01-01T00:00:00Z", 20.0),
            bar("2019-01-01T00:00:00Z", 40.0),
            bar("2021-01-01T00:00:00Z", 50.0),
        ])
        .expect("monthly");

        let reference =
            HistoricalReference::from_histories(&daily, &monthly, 110.0, ts("2025-03-10T18:00:00Z"));

        assert_eq!(reference.prices.one_day, Some(98.0));
        assert_eq!(reference.prices.one_week, Some(95.0));
        assert_eq!(reference.prices.one_month, Some(90.0));
        assert_eq!(reference.prices.ytd, Some(80.0));
        assert_eq!(reference.prices.five_years, Some(40.0));
        assert_eq!(reference.prices.all, Some(20.0));
        assert_eq!(reference.returns.all, Some(450.0));
        assert!((reference.returns.one_day.expect("1d") - 12.244_897_959).abs() < 1e-6);
    }

    #[test]
    fn short_history_leaves_horizons_absent() {
        let daily = PriceHistory::new(vec![bar("2025-03-10T00:00:00Z", 100.0)]).expect("daily");
        let reference = HistoricalReference::from_histories(
            &daily,
            &PriceHistory::empty(),
            101.0,
            ts("2025-03-10T18:00:00Z"),
        );

        for horizon in Horizon::ALL {
            assert_eq!(reference.prices.get(horizon), None, "{}", horizon.as_str());
            assert_eq!(reference.returns.get(horizon), None, "{}", horizon.as_str());
        }
    }

    #[test]
    fn percent_change_is_absent_for_non_positive_reference() {
        assert_eq!(percent_change(10.0, 0.0), None);
        assert_eq!(percent_change(10.0, -1.0), None);
        assert_eq!(percent_change(11.0, 10.0).map(|v| v.round()), Some(10.0));
    }
}
