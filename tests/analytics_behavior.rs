//! Behavior-driven tests for indicators, signals and sentiment scoring.

use tickerscope_core::analytics::{
    aggregate_language, combine_sentiment, compute_indicators, detect_signals,
};
use tickerscope_core::{
    Bar, PriceHistory, SentimentLabel, SentimentSettings, SignalSummary, SignalThresholds,
    TechnicalIndicators,
};
use tickerscope_tests::*;

/// One bar per day from 2024-01-01, with a one percent intraday range.
fn daily_history(closes: &[f64], volumes: &[u64]) -> PriceHistory {
    let start = UtcDateTime::parse("2024-01-01T00:00:00Z").expect("timestamp");
    let base = start.into_inner().unix_timestamp();
    let bars = closes
        .iter()
        .zip(volumes)
        .enumerate()
        .map(|(day, (close, volume))| {
            let ts = UtcDateTime::from_unix_timestamp(base + day as i64 * 86_400).expect("timestamp");
            Bar::new(ts, *close, close * 1.01, close * 0.99, *close, Some(*volume)).expect("bar")
        })
        .collect();
    PriceHistory::new(bars).expect("ordered history")
}

// =============================================================================
// Signals
// =============================================================================

#[test]
fn when_rsi_is_low_and_short_average_leads_summary_is_bullish() {
    // Given: RSI 25, MA50 above MA200 and ordinary volume
    let indicators = TechnicalIndicators {
        rsi_14: Some(25.0),
        ma_50: Some(110.0),
        ma_200: Some(100.0),
        volume_ratio: Some(1.1),
        ..TechnicalIndicators::default()
    };

    // When: Signals are detected with the default thresholds
    let signals = detect_signals(&indicators, 105.0, &SignalThresholds::default());

    // Then: Oversold and golden cross fire, volume stays quiet, summary is bullish
    assert_eq!(signals.oversold, Some(true));
    assert_eq!(signals.golden_cross, Some(true));
    assert_eq!(signals.death_cross, Some(false));
    assert_eq!(signals.volume_spike, Some(false));
    assert_eq!(signals.summary, SignalSummary::Bullish);
}

#[test]
fn when_history_is_shorter_than_long_average_crosses_are_absent() {
    // Given: 150 daily bars, enough for RSI and MA50 but not MA200
    let closes: Vec<f64> = (0..150).map(|day| 100.0 + (day % 7) as f64).collect();
    let volumes = vec![1_000_u64; 150];
    let history = daily_history(&closes, &volumes);

    // When: Indicators and signals are computed
    let indicators = compute_indicators(&history, 103.0);
    let signals = detect_signals(&indicators, 103.0, &SignalThresholds::default());

    // Then: The long average and both crosses are absent, the rest is present
    assert!(indicators.ma_200.is_none());
    assert!(indicators.above_ma_200.is_none());
    assert!(indicators.rsi_14.is_some());
    assert!(indicators.ma_50.is_some());
    assert!(indicators.volatility_30d.is_some());
    assert_eq!(signals.golden_cross, None);
    assert_eq!(signals.death_cross, None);
}

#[test]
fn when_last_session_volume_triples_a_spike_is_flagged() {
    // Given: Flat volume for 40 sessions, then a session at three times the average
    let closes = vec![50.0; 41];
    let mut volumes = vec![2_000_u64; 40];
    volumes.push(6_000);
    let history = daily_history(&closes, &volumes);

    // When: Indicators and signals are computed
    let indicators = compute_indicators(&history, 50.0);
    let signals = detect_signals(&indicators, 50.0, &SignalThresholds::default());

    // Then: The ratio is measured against the preceding 20 sessions
    assert_eq!(indicators.avg_volume_20d, Some(2_000.0));
    assert_eq!(indicators.volume_ratio, Some(3.0));
    assert_eq!(signals.volume_spike, Some(true));
    // And: A flat tape has neutral RSI and the volume spike alone does not move the summary
    assert_eq!(indicators.rsi_14, Some(50.0));
    assert_eq!(signals.summary, SignalSummary::Neutral);
}

#[test]
fn when_prices_only_rise_rsi_saturates_and_price_sits_above_its_average() {
    // Given: A steady uptrend over 60 sessions
    let closes: Vec<f64> = (0..60).map(|day| 10.0 + day as f64).collect();
    let history = daily_history(&closes, &vec![500_u64; 60]);

    // When: Indicators are computed at the last close
    let indicators = compute_indicators(&history, 69.0);

    // Then: RSI is pinned at 100 and the price is above its 50-day average
    assert_eq!(indicators.rsi_14, Some(100.0));
    assert_eq!(indicators.above_ma_50, Some(true));
    let high = indicators.week_52_high.expect("52-week high");
    assert!((high - 69.0 * 1.01).abs() < 1e-9);
}

// =============================================================================
// Sentiment
// =============================================================================

#[test]
fn when_only_portuguese_news_exists_its_score_is_the_combined_score() {
    // Given: Ten Portuguese headlines scored 0.5 and no English coverage
    let settings = SentimentSettings::default();
    let headlines: Vec<Headline> = (0..10)
        .map(|index| headline(&format!("Notícia {index}"), 0.5))
        .collect();

    // When: Both languages are aggregated and combined
    let pt = aggregate_language(&headlines, settings.max_headlines);
    let record = combine_sentiment(pt, None, &settings).expect("sentiment");

    // Then: The combined score is 0.5 and the label positive
    assert!((record.combined - 0.5).abs() < 1e-9);
    assert_eq!(record.label, SentimentLabel::Positive);
    assert!(record.en.is_none());
    assert_eq!(record.article_count(), 10);
}

#[test]
fn when_both_languages_exist_scores_are_weighted() {
    // Given: Portuguese news at +0.5 and English news at -0.5
    let settings = SentimentSettings::default();
    let pt = aggregate_language(&[headline("Alta", 0.5)], settings.max_headlines);
    let en = aggregate_language(&[headline("Drop", -0.5)], settings.max_headlines);

    // When: They are combined with the default 0.6 / 0.4 weights
    let record = combine_sentiment(pt, en, &settings).expect("sentiment");

    // Then: The result leans Portuguese but stays inside the neutral band
    assert!((record.combined - 0.1).abs() < 1e-9);
    assert_eq!(record.label, SentimentLabel::Neutral);
}

#[test]
fn when_more_headlines_arrive_than_allowed_extra_ones_are_ignored() {
    // Given: Ten positive headlines followed by five very negative ones
    let settings = SentimentSettings::default();
    let mut headlines: Vec<Headline> = (0..10).map(|_| headline("Bom", 0.4)).collect();
    headlines.extend((0..5).map(|_| headline("Ruim", -1.0)));

    // When: The language is aggregated
    let sentiment = aggregate_language(&headlines, settings.max_headlines).expect("sentiment");

    // Then: Only the first ten count
    assert_eq!(sentiment.article_count, 10);
    assert!((sentiment.score - 0.4).abs() < 1e-9);
}

#[test]
fn when_no_language_has_coverage_sentiment_is_absent() {
    // Given: No headlines in either language
    let settings = SentimentSettings::default();

    // When: Aggregating an empty list and combining
    let pt = aggregate_language(&[], settings.max_headlines);

    // Then: Nothing is produced
    assert!(pt.is_none());
    assert!(combine_sentiment(pt, None, &settings).is_none());
}
