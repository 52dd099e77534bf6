use crate::config::SentimentSettings;
use crate::data_source::Headline;
use crate::domain::{LanguageSentiment, SentimentLabel, SentimentRecord};

/// Collapse one language's headlines into a score, count and latest headline.
///
/// Only the first `max_headlines` items are considered, and the mean covers only
/// finite scores. A list without any finite score yields `None`.
pub fn aggregate_language(headlines: &[Headline], max_headlines: usize) -> Option<LanguageSentiment> {
    let considered = &headlines[..headlines.len().min(max_headlines)];
    let scores: Vec<f64> = considered
        .iter()
        .map(|headline| headline.raw_sentiment)
        .filter(|score| score.is_finite())
        .collect();
    if scores.is_empty() {
        return None;
    }

    let mean = scores.iter().sum::<f64>() / scores.len() as f64;

    let latest = considered
        .iter()
        .enumerate()
        .max_by(|(left_index, left), (right_index, right)| {
            left.published_at
                .cmp(&right.published_at)
                // Ties keep the earlier item so untimestamped lists report their first headline.
                .then(right_index.cmp(left_index))
        })
        .map(|(_, headline)| headline.title.clone());

    Some(LanguageSentiment {
        score: mean.clamp(-1.0, 1.0),
        article_count: considered.len(),
        latest_headline: latest,
    })
}

/// Weighted combination of the per-language scores.
///
/// Both present: weighted mean. One present: that score unchanged. Neither: `None`.
pub fn combine(
    pt: Option<LanguageSentiment>,
    en: Option<LanguageSentiment>,
    settings: &SentimentSettings,
) -> Option<SentimentRecord> {
    let combined = match (&pt, &en) {
        (Some(pt), Some(en)) => {
            let total = settings.pt_weight + settings.en_weight;
            (settings.pt_weight * pt.score + settings.en_weight * en.score) / total
        }
        (Some(only), None) | (None, Some(only)) => only.score,
        (None, None) => return None,
    };

    Some(SentimentRecord {
        label: label_for(combined, settings.label_threshold),
        pt,
        en,
        combined,
    })
}

pub fn label_for(score: f64, threshold: f64) -> SentimentLabel {
    if score > threshold {
        SentimentLabel::Positive
    } else if score < -threshold {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    }
}
