use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::analytics::{aggregate_language, combine_sentiment, BenchmarkReturns};
use crate::catalog::InstrumentCatalog;
use crate::config::{PipelineConfig, SentimentSettings};
use crate::data_source::{Language, MarketDataSource, NewsSource};
use crate::domain::{
    BenchmarkIndex, FailureReason, FxRate, HistoricalReference, HorizonValues,
    InstrumentDescriptor, InstrumentRecord, LanguageSentiment, SentimentRecord, Symbol,
    UtcDateTime,
};
use crate::retry::{retry_transient, RetryPolicy};

use super::quote_fetcher::{analyze, QuoteFetcher};
use super::report::{PipelineError, RecordSink, RunReport, RunSummary};
use super::worker_pool::run_phase;

/// Provider symbol of the USD/BRL pair, quoted as BRL per USD.
pub const FX_SYMBOL: &str = "USDBRL=X";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Prerequisite {
    Fx,
    Benchmark(BenchmarkIndex),
}

impl Prerequisite {
    const fn provider_symbol(self) -> &'static str {
        match self {
            Self::Fx => FX_SYMBOL,
            Self::Benchmark(index) => index.provider_symbol(),
        }
    }
}

enum Resolved {
    Fx(FxRate),
    Benchmark(HorizonValues),
}

/// Phase-1 output, read-only for the rest of the run.
#[derive(Debug, Clone, Copy, Default)]
struct RunContext {
    fx: Option<FxRate>,
    benchmarks: BenchmarkReturns,
}

/// Drives one run: prerequisites, quotes, news, merge, and optional persistence.
///
/// Each phase runs on its own bounded worker pool and completes fully before the
/// next starts. Only a missing FX rate that the catalog needs can fail the run; every
/// other problem is recorded on the affected instrument.
pub struct FetchOrchestrator {
    market: Arc<dyn MarketDataSource>,
    news: Arc<dyn NewsSource>,
    config: PipelineConfig,
}

impl FetchOrchestrator {
    pub fn new(
        market: Arc<dyn MarketDataSource>,
        news: Arc<dyn NewsSource>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            market,
            news,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run phases 1 to 3 and return one record per catalog instrument.
    ///
    /// An empty catalog yields an empty report with an all-zero summary.
    pub async fn run(&self, catalog: &InstrumentCatalog) -> Result<RunReport, PipelineError> {
        let run_id = Uuid::new_v4();
        let started_at = UtcDateTime::now();
        let clock = Instant::now();
        let run_deadline = clock + self.config.run_deadline();
        let fetcher = QuoteFetcher::new(Arc::clone(&self.market), self.config.retry_policy());
        let mut warnings = Vec::new();

        info!(
            run_id = %run_id,
            source = self.market.name(),
            instruments = catalog.len(),
            "run started"
        );

        let context = self
            .resolve_prerequisites(&fetcher, catalog.requires_fx(), run_deadline, &mut warnings)
            .await?;

        // Phase 2: quotes, indicators, benchmark deltas and signals per instrument.
        let thresholds = self.config.signals;
        let jobs = catalog
            .iter()
            .map(|descriptor| (descriptor.symbol.clone(), descriptor.clone()))
            .collect();
        let mut quotes = run_phase(
            "quotes",
            self.config.pools.quotes,
            jobs,
            run_deadline,
            move |descriptor: InstrumentDescriptor| {
                let fetcher = fetcher.clone();
                async move {
                    fetcher
                        .fetch(&descriptor, context.fx.as_ref())
                        .await
                        .map(|fetched| analyze(fetched, &context.benchmarks, &thresholds))
                }
            },
        )
        .await;
        if quotes.deadline_hit {
            let unfinished = catalog
                .iter()
                .filter(|descriptor| !quotes.settled(&descriptor.symbol))
                .count();
            warn!(phase = "quotes", unfinished, "run deadline reached");
            warnings.push(format!(
                "run deadline reached during quote phase; {unfinished} instruments unfinished"
            ));
        }

        // Phase 3: news sentiment for instruments that fetched successfully.
        let jobs = quotes
            .results
            .iter()
            .filter(|(_, result)| result.is_ok())
            .map(|(symbol, _)| (symbol.clone(), symbol.clone()))
            .collect();
        let news = Arc::clone(&self.news);
        let policy = self.config.retry_policy();
        let settings = self.config.sentiment;
        let mut sentiments = run_phase(
            "news",
            self.config.pools.news,
            jobs,
            run_deadline,
            move |symbol: Symbol| {
                let news = Arc::clone(&news);
                async move { gather_sentiment(news.as_ref(), &symbol, &policy, &settings).await }
            },
        )
        .await;
        if sentiments.deadline_hit {
            warn!(phase = "news", "run deadline reached, unfinished sentiment omitted");
            warnings.push(String::from(
                "run deadline reached during news phase; sentiment omitted for unfinished instruments",
            ));
        }
        for (symbol, message) in &sentiments.aborted {
            warn!(phase = "news", symbol = %symbol, message = %message, "sentiment task aborted");
        }

        // Merge by symbol; completion order never matters.
        let mut records: Vec<InstrumentRecord> = catalog
            .iter()
            .map(|descriptor| {
                let symbol = &descriptor.symbol;
                match quotes.results.remove(symbol) {
                    Some(Ok(view)) => {
                        let sentiment = sentiments.results.remove(symbol).flatten();
                        InstrumentRecord::succeeded(descriptor.clone(), view, sentiment)
                    }
                    Some(Err(reason)) => InstrumentRecord::failed(descriptor.clone(), reason),
                    None => {
                        let reason = match quotes.aborted.remove(symbol) {
                            Some(message) => FailureReason::WorkerAborted { message },
                            None => FailureReason::DeadlineExceeded,
                        };
                        InstrumentRecord::failed(descriptor.clone(), reason)
                    }
                }
            })
            .collect();
        records.sort_by(|left, right| left.symbol().cmp(right.symbol()));

        let summary = RunSummary::from_records(&records);
        info!(
            run_id = %run_id,
            source = self.market.name(),
            total = summary.total,
            succeeded = summary.succeeded,
            degraded = summary.degraded,
            failed = summary.failed,
            elapsed_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX),
            "run finished"
        );

        Ok(RunReport {
            run_id,
            source: self.market.name().to_owned(),
            started_at,
            finished_at: UtcDateTime::now(),
            fx_rate: context.fx,
            benchmarks: context.benchmarks,
            summary,
            warnings,
            records,
        })
    }

    /// Run, then hand the merged record set to `sink` in one sequential write.
    pub async fn run_with_sink(
        &self,
        catalog: &InstrumentCatalog,
        sink: &mut dyn RecordSink,
    ) -> Result<RunReport, PipelineError> {
        let report = self.run(catalog).await?;
        debug!(run_id = %report.run_id, records = report.records.len(), "persisting run");
        sink.write_run(&report)?;
        Ok(report)
    }

    async fn resolve_prerequisites(
        &self,
        fetcher: &QuoteFetcher,
        needs_fx: bool,
        run_deadline: Instant,
        warnings: &mut Vec<String>,
    ) -> Result<RunContext, PipelineError> {
        let mut keys = Vec::with_capacity(3);
        if needs_fx {
            keys.push(Prerequisite::Fx);
        }
        keys.extend(BenchmarkIndex::ALL.map(Prerequisite::Benchmark));

        let deadline = (Instant::now() + self.config.prerequisite_timeout()).min(run_deadline);
        let task_fetcher = fetcher.clone();
        let mut outcome = run_phase(
            "prerequisites",
            self.config.pools.prerequisites,
            keys.iter().map(|key| (*key, *key)).collect(),
            deadline,
            move |key: Prerequisite| {
                let fetcher = task_fetcher.clone();
                async move { resolve(&fetcher, key).await }
            },
        )
        .await;

        let mut context = RunContext::default();
        let mut fx_problem = None;
        for key in keys {
            let problem = match (key, outcome.results.remove(&key)) {
                (Prerequisite::Fx, Some(Ok(Resolved::Fx(rate)))) => {
                    context.fx = Some(rate);
                    continue;
                }
                (Prerequisite::Benchmark(index), Some(Ok(Resolved::Benchmark(returns)))) => {
                    context.benchmarks.set(index, returns);
                    continue;
                }
                (_, Some(Ok(_))) => String::from("provider returned an unexpected prerequisite"),
                (_, Some(Err(reason))) => reason,
                (_, None) => outcome
                    .aborted
                    .remove(&key)
                    .map(|message| format!("worker aborted: {message}"))
                    .unwrap_or_else(|| String::from("prerequisite phase timed out")),
            };

            match key {
                Prerequisite::Fx => fx_problem = Some(problem),
                Prerequisite::Benchmark(index) => {
                    warn!(
                        phase = "prerequisites",
                        benchmark = index.as_str(),
                        problem = %problem,
                        "benchmark unavailable, deltas omitted for this run"
                    );
                    warnings.push(format!(
                        "benchmark {} unavailable: {problem}",
                        index.provider_symbol()
                    ));
                }
            }
        }

        if needs_fx && context.fx.is_none() {
            let reason = fx_problem.unwrap_or_else(|| String::from("no FX result"));
            error!(phase = "prerequisites", symbol = FX_SYMBOL, reason = %reason, "FX rate unavailable, aborting run");
            return Err(PipelineError::FxUnavailable { reason });
        }

        info!(
            phase = "prerequisites",
            fx = ?context.fx.map(|fx| fx.brl_per_usd),
            benchmarks = context.benchmarks.available(),
            "prerequisites resolved"
        );
        Ok(context)
    }
}

async fn resolve(fetcher: &QuoteFetcher, key: Prerequisite) -> Result<Resolved, String> {
    let symbol = Symbol::parse(key.provider_symbol()).map_err(|error| error.to_string())?;
    let snapshot = fetcher
        .fetch_snapshot(&symbol)
        .await
        .map_err(|reason| reason.detail())?;

    match key {
        Prerequisite::Fx => FxRate::new(snapshot.quote.price, snapshot.quote.as_of)
            .map(Resolved::Fx)
            .map_err(|error| error.to_string()),
        Prerequisite::Benchmark(_) => {
            let reference = HistoricalReference::from_histories(
                &snapshot.daily,
                &snapshot.long_range,
                snapshot.quote.price,
                snapshot.quote.as_of,
            );
            Ok(Resolved::Benchmark(reference.returns))
        }
    }
}

async fn gather_sentiment(
    news: &dyn NewsSource,
    symbol: &Symbol,
    policy: &RetryPolicy,
    settings: &SentimentSettings,
) -> Option<SentimentRecord> {
    let (pt, en) = tokio::join!(
        language_sentiment(news, symbol, Language::Pt, policy, settings.max_headlines),
        language_sentiment(news, symbol, Language::En, policy, settings.max_headlines),
    );
    combine_sentiment(pt, en, settings)
}

async fn language_sentiment(
    news: &dyn NewsSource,
    symbol: &Symbol,
    language: Language,
    policy: &RetryPolicy,
    max_headlines: usize,
) -> Option<LanguageSentiment> {
    let label = format!("{symbol}:{language}");
    match retry_transient(policy, &label, || news.fetch_news(symbol, language)).await {
        Ok(Some(headlines)) => aggregate_language(&headlines, max_headlines),
        Ok(None) => None,
        Err(error) => {
            debug!(symbol = %symbol, language = language.as_str(), error = ?error, "news unavailable");
            None
        }
    }
}
