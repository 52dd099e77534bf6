use std::sync::Arc;

use serde::Deserialize;

use crate::adapters::{lexicon, synthetic};
use crate::data_source::{FetchError, Headline, Language, NewsSource, SourceFuture};
use crate::domain::{Symbol, UtcDateTime};

use super::yahoo::YahooTransport;

enum Mode {
    Live(Arc<YahooTransport>),
    Synthetic,
}

/// Headlines from the Yahoo search API, scored with the keyword lexicon.
pub struct YahooNews {
    mode: Mode,
    max_headlines: usize,
}

impl YahooNews {
    pub fn live(transport: Arc<YahooTransport>, max_headlines: usize) -> Self {
        Self {
            mode: Mode::Live(transport),
            max_headlines,
        }
    }

    pub fn synthetic() -> Self {
        Self {
            mode: Mode::Synthetic,
            max_headlines: 10,
        }
    }
}

impl NewsSource for YahooNews {
    fn name(&self) -> &'static str {
        match self.mode {
            Mode::Live(_) => "yahoo",
            Mode::Synthetic => "synthetic",
        }
    }

    fn fetch_news<'a>(
        &'a self,
        symbol: &'a Symbol,
        language: Language,
    ) -> SourceFuture<'a, Option<Vec<Headline>>> {
        Box::pin(async move {
            match &self.mode {
                Mode::Live(transport) => {
                    let url = search_url(symbol, language, self.max_headlines);
                    let response = transport.get(&url).await?;
                    if !response.is_success() {
                        return Err(FetchError::malformed(format!(
                            "yahoo search returned status {}",
                            response.status
                        )));
                    }
                    parse_search(&response.body, language)
                }
                Mode::Synthetic => Ok(synthetic::headlines(symbol, language, UtcDateTime::now())),
            }
        })
    }
}

fn search_url(symbol: &Symbol, language: Language, max_headlines: usize) -> String {
    let (lang, region) = match language {
        Language::Pt => ("pt-BR", "BR"),
        Language::En => ("en-US", "US"),
    };
    format!(
        "https://query2.finance.yahoo.com/v1/finance/search?q={}&quotesCount=0&newsCount={max_headlines}&lang={lang}&region={region}",
        urlencoding::encode(symbol.as_str()),
    )
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    news: Option<Vec<SearchNewsItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchNewsItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    provider_publish_time: Option<i64>,
}

/// `None` when the response has no news section at all.
fn parse_search(body: &str, language: Language) -> Result<Option<Vec<Headline>>, FetchError> {
    let response: SearchResponse = serde_json::from_str(body)
        .map_err(|error| FetchError::malformed(format!("failed to parse yahoo search: {error}")))?;

    Ok(response.news.map(|items| {
        items
            .into_iter()
            .filter_map(|item| {
                let title = item.title?.trim().to_owned();
                if title.is_empty() {
                    return None;
                }
                Some(Headline {
                    raw_sentiment: lexicon::score(&title, language),
                    published_at: item
                        .provider_publish_time
                        .and_then(|epoch| UtcDateTime::from_unix_timestamp(epoch).ok()),
                    title,
                })
            })
            .collect()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_region_specific_search_url() {
        let symbol = Symbol::parse("VALE3.SA").expect("symbol");

        let pt = search_url(&symbol, Language::Pt, 10);
        let en = search_url(&symbol, Language::En, 5);

        assert!(pt.contains("q=VALE3.SA") && pt.contains("lang=pt-BR") && pt.contains("region=BR"));
        assert!(en.contains("newsCount=5") && en.contains("lang=en-US"));
    }

    #[test]
    fn parses_and_scores_headlines() {
        let body = r#"{"news":[
            {"title":"Vale dispara com lucro recorde","providerPublishTime":1741795200},
            {"title":"   "},
            {"title":"Vale recua após queda do minério"}
        ]}"#;

        let headlines = parse_search(body, Language::Pt)
            .expect("parse")
            .expect("news section present");

        assert_eq!(headlines.len(), 2);
        assert_eq!(headlines[0].raw_sentiment, 1.0);
        assert!(headlines[0].published_at.is_some());
        assert_eq!(headlines[1].raw_sentiment, -1.0);
        assert!(headlines[1].published_at.is_none());
    }

    #[test]
    fn missing_news_section_is_absent() {
        let parsed = parse_search(r#"{"quotes":[]}"#, Language::En).expect("parse");
        assert!(parsed.is_none());
    }

    #[tokio::test]
    async fn synthetic_mode_is_deterministic() {
        let news = YahooNews::synthetic();
        let symbol = Symbol::parse("AAPL").expect("symbol");

        let first = news.fetch_news(&symbol, Language::En).await.expect("fetch");
        let second = news.fetch_news(&symbol, Language::En).await.expect("fetch");

        assert_eq!(
            first.map(|items| items.into_iter().map(|item| item.title).collect::<Vec<_>>()),
            second.map(|items| items.into_iter().map(|item| item.title).collect::<Vec<_>>()),
        );
    }
}
