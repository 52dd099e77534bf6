//! Threshold rules mapping indicators to discrete signals.
//!
//! | Signal | Rule | Polarity |
//! |--------|------|----------|
//! | oversold | RSI-14 < `oversold_rsi` | bullish |
//! | overbought | RSI-14 > `overbought_rsi` | bearish |
//! | near_52w_high | price >= high * (1 - band) | bullish |
//! | near_52w_low | price <= low * (1 + band) | bearish |
//! | golden_cross | MA50 > MA200 | bullish |
//! | death_cross | MA50 < MA200 | bearish |
//! | volume_spike | volume ratio > `volume_spike_ratio` | neutral |
//!
//! Crosses are state-based: they describe the current MA relation, not a crossing event.

use crate::config::SignalThresholds;
use crate::domain::{SignalSet, SignalSummary, TechnicalIndicators};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Bullish,
    Bearish,
    Neutral,
}

/// Derive the signal set for one instrument at `price`.
pub fn detect_signals(
    indicators: &TechnicalIndicators,
    price: f64,
    thresholds: &SignalThresholds,
) -> SignalSet {
    let band = thresholds.near_extreme_band;
    let crosses = indicators
        .ma_50
        .zip(indicators.ma_200)
        .map(|(short, long)| (short > long, short < long));

    let mut signals = SignalSet {
        oversold: indicators.rsi_14.map(|rsi| rsi < thresholds.oversold_rsi),
        overbought: indicators.rsi_14.map(|rsi| rsi > thresholds.overbought_rsi),
        near_52w_high: indicators
            .week_52_high
            .map(|high| price >= high * (1.0 - band)),
        near_52w_low: indicators
            .week_52_low
            .map(|low| price <= low * (1.0 + band)),
        golden_cross: crosses.map(|(golden, _)| golden),
        death_cross: crosses.map(|(_, death)| death),
        volume_spike: indicators
            .volume_ratio
            .map(|ratio| ratio > thresholds.volume_spike_ratio),
        summary: SignalSummary::Neutral,
    };
    signals.summary = summarize(&signals, thresholds.summary_margin);
    signals
}

/// Directional summary from the active signals. Absent signals count as inactive.
pub fn summarize(signals: &SignalSet, margin: u32) -> SignalSummary {
    let (mut bullish, mut bearish) = (0_u32, 0_u32);
    for (active, polarity) in weighted(signals) {
        if active != Some(true) {
            continue;
        }
        match polarity {
            Polarity::Bullish => bullish += 1,
            Polarity::Bearish => bearish += 1,
            Polarity::Neutral => {}
        }
    }

    if bullish >= bearish.saturating_add(margin) {
        SignalSummary::Bullish
    } else if bearish >= bullish.saturating_add(margin) {
        SignalSummary::Bearish
    } else {
        SignalSummary::Neutral
    }
}

fn weighted(signals: &SignalSet) -> [(Option<bool>, Polarity); 7] {
    [
        (signals.oversold, Polarity::Bullish),
        (signals.golden_cross, Polarity::Bullish),
        (signals.near_52w_high, Polarity::Bullish),
        (signals.overbought, Polarity::Bearish),
        (signals.death_cross, Polarity::Bearish),
        (signals.near_52w_low, Polarity::Bearish),
        (signals.volume_spike, Polarity::Neutral),
    ]
}
