//! Technical indicators over a daily price/volume window.
//!
//! Every function is pure. When the history is shorter than an indicator's window the
//! result is `None`; a partial window never produces a value.

use crate::domain::{percent_change, Bar, PriceHistory, TechnicalIndicators};

pub const RSI_PERIOD: usize = 14;
pub const MA_SHORT: usize = 50;
pub const MA_LONG: usize = 200;
pub const VOLATILITY_WINDOW: usize = 30;
pub const VOLUME_WINDOW: usize = 20;
/// Trading days in a 52-week lookback.
pub const YEAR_BARS: usize = 252;

/// Compute every indicator for `history`, comparing against the live `price`.
pub fn compute_indicators(history: &PriceHistory, price: f64) -> TechnicalIndicators {
    let closes = history.closes();
    let ma_50 = simple_moving_average(&closes, MA_SHORT);
    let ma_200 = simple_moving_average(&closes, MA_LONG);
    let (avg_volume_20d, volume_ratio) = volume_ratio(history.bars());
    let range = week_52_range(history.bars());

    TechnicalIndicators {
        rsi_14: rsi(&closes, RSI_PERIOD),
        ma_50,
        ma_200,
        above_ma_50: ma_50.map(|ma| price > ma),
        above_ma_200: ma_200.map(|ma| price > ma),
        volatility_30d: volatility(&closes, VOLATILITY_WINDOW),
        avg_volume_20d,
        volume_ratio,
        week_52_high: range.map(|(high, _)| high),
        week_52_low: range.map(|(_, low)| low),
        pct_from_52w_high: range.and_then(|(high, _)| percent_change(price, high)),
        pct_from_52w_low: range.and_then(|(_, low)| percent_change(price, low)),
    }
}

/// Mean of the trailing `window` closes.
pub fn simple_moving_average(closes: &[f64], window: usize) -> Option<f64> {
    if window == 0 || closes.len() < window {
        return None;
    }
    let tail = &closes[closes.len() - window..];
    Some(tail.iter().sum::<f64>() / window as f64)
}

/// Wilder RSI. Needs `period + 1` closes.
///
/// Seed averages are the simple mean of the first `period` gains and losses, then each
/// later change is folded in as `avg = (avg * (period - 1) + x) / period`.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let changes: Vec<f64> = closes.windows(2).map(|pair| pair[1] - pair[0]).collect();
    let (seed, rest) = changes.split_at(period);
    let n = period as f64;

    let mut avg_gain = seed.iter().map(|change| change.max(0.0)).sum::<f64>() / n;
    let mut avg_loss = seed.iter().map(|change| (-change).max(0.0)).sum::<f64>() / n;

    for change in rest {
        avg_gain = (avg_gain * (n - 1.0) + change.max(0.0)) / n;
        avg_loss = (avg_loss * (n - 1.0) + (-change).max(0.0)) / n;
    }

    let value = if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    };

    value.is_finite().then(|| value.clamp(0.0, 100.0))
}

/// Sample standard deviation of the last `window` daily returns, in percent.
pub fn volatility(closes: &[f64], window: usize) -> Option<f64> {
    if window < 2 || closes.len() < window + 1 {
        return None;
    }

    let tail = &closes[closes.len() - (window + 1)..];
    let returns = tail
        .windows(2)
        .map(|pair| (pair[0] > 0.0).then(|| pair[1] / pair[0] - 1.0))
        .collect::<Option<Vec<f64>>>()?;

    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / (returns.len() - 1) as f64;

    Some(variance.sqrt() * 100.0)
}

/// Returns `(avg_volume_20d, volume_ratio)`.
///
/// The average covers the 20 bars before the last one; the ratio is the last bar's volume
/// over that average. Both are absent when a volume is missing; the ratio is also absent
/// when the average is zero.
pub fn volume_ratio(bars: &[Bar]) -> (Option<f64>, Option<f64>) {
    if bars.len() < VOLUME_WINDOW + 1 {
        return (None, None);
    }

    let window = &bars[bars.len() - (VOLUME_WINDOW + 1)..];
    let Some(volumes) = window
        .iter()
        .map(|bar| bar.volume.map(|volume| volume as f64))
        .collect::<Option<Vec<f64>>>()
    else {
        return (None, None);
    };

    let (previous, current) = volumes.split_at(VOLUME_WINDOW);
    let average = previous.iter().sum::<f64>() / VOLUME_WINDOW as f64;
    let ratio = (average > 0.0).then(|| current[0] / average);

    (Some(average), ratio)
}

/// `(high, low)` over the trailing 52 weeks of bars.
pub fn week_52_range(bars: &[Bar]) -> Option<(f64, f64)> {
    let start = bars.len().saturating_sub(YEAR_BARS);
    let window = &bars[start..];
    if window.is_empty() {
        return None;
    }

    let high = window.iter().map(|bar| bar.high).fold(f64::MIN, f64::max);
    let low = window.iter().map(|bar| bar.low).fold(f64::MAX, f64::min);
    Some((high, low))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UtcDateTime;

    fn history_from(closes: &[f64], volume: Option<u64>) -> PriceHistory {
        let start = UtcDateTime::parse("2024-01-01T00:00:00Z").expect("timestamp");
        let bars = closes
            .iter()
            .enumerate()
            .map(|(index, close)| {
                let ts = UtcDateTime::from_unix_timestamp(
                    start.into_inner().unix_timestamp() + index as i64 * 86_400,
                )
                .expect("timestamp");
                Bar::new(ts, *close, close * 1.01, close * 0.99, *close, volume).expect("bar")
            })
            .collect();
        PriceHistory::new(bars).expect("history")
    }

    #[test]
    fn rsi_requires_fifteen_closes() {
        let closes: Vec<f64> = (0..14).map(|i| 10.0 + i as f64).collect();
        assert_eq!(rsi(&closes, RSI_PERIOD), None);

        let closes: Vec<f64> = (0..15).map(|i| 10.0 + i as f64).collect();
        assert_eq!(rsi(&closes, RSI_PERIOD), Some(100.0));
    }

    #[test]
    fn rsi_matches_reference_values() {
        // Alternating +1/-1 changes balance gains and losses.
        let closes: Vec<f64> = (0..30).map(|i| if i % 2 == 0 { 10.0 } else { 11.0 }).collect();
        let value = rsi(&closes, RSI_PERIOD).expect("rsi");
        assert!((value - 50.0).abs() < 5.0, "value={value}");

        let flat = vec![42.0; 20];
        assert_eq!(rsi(&flat, RSI_PERIOD), Some(50.0));

        let falling: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        assert_eq!(rsi(&falling, RSI_PERIOD), Some(0.0));
    }

    #[test]
    fn moving_averages_need_full_window() {
        let closes: Vec<f64> = (1..=199).map(f64::from).collect();
        assert_eq!(simple_moving_average(&closes, MA_LONG), None);
        assert_eq!(simple_moving_average(&closes, MA_SHORT), Some(174.5));
    }

    #[test]
    fn volatility_of_constant_returns_is_zero() {
        let closes: Vec<f64> = (0..31).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
        let value = volatility(&closes, VOLATILITY_WINDOW).expect("volatility");
        assert!(value.abs() < 1e-9, "value={value}");

        assert_eq!(volatility(&closes[..30], VOLATILITY_WINDOW), None);
    }

    #[test]
    fn volume_ratio_is_absent_for_zero_average() {
        let history = history_from(&[10.0; 21], Some(0));
        assert_eq!(volume_ratio(history.bars()), (Some(0.0), None));
    }

    #[test]
    fn volume_ratio_is_absent_when_any_volume_missing() {
        let history = history_from(&[10.0; 25], None);
        assert_eq!(volume_ratio(history.bars()), (None, None));
    }

    #[test]
    fn short_history_leaves_long_indicators_absent() {
        let closes: Vec<f64> = (0..120).map(|i| 50.0 + (i % 7) as f64).collect();
        let indicators = compute_indicators(&history_from(&closes, Some(1_000)), 55.0);

        assert!(indicators.ma_50.is_some());
        assert!(indicators.rsi_14.is_some());
        assert!(indicators.volatility_30d.is_some());
        assert_eq!(indicators.volume_ratio, Some(1.0));
        assert_eq!(indicators.ma_200, None);
        assert_eq!(indicators.above_ma_200, None);
    }

    #[test]
    fn week_52_range_uses_bar_extremes() {
        let history = history_from(&[10.0, 20.0, 15.0], Some(1));
        let (high, low) = week_52_range(history.bars()).expect("range");
        assert!((high - 20.2).abs() < 1e-9);
        assert!((low - 9.9).abs() < 1e-9);
        assert_eq!(week_52_range(&[]), None);
    }
}
