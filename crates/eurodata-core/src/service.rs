//! Question-to-answer pipeline
//!
//! Routes a question, fetches every resulting plan through the cache and
//! attaches a trend summary to each table.

use crate::cache::{CachedFetcher, FetchCache};
use crate::classifier::IndicatorClassifier;
use crate::config::DataConfig;
use crate::error::Result;
use crate::fetchers::{Fetcher, ProviderFetcher};
use crate::interpreter::QueryInterpreter;
use crate::plan::QueryPlan;
use crate::router::QueryRouter;
use crate::summary::TrendSummarizer;
use crate::table::ObservationTable;
use eurodata_llm::LLMProvider;
use serde::Serialize;
use std::sync::Arc;

/// One fetched series with its plan and summary
#[derive(Debug, Clone, Serialize)]
pub struct SeriesAnswer {
    pub plan: QueryPlan,
    pub table: ObservationTable,
    pub summary: String,
}

/// Router, fetcher and summarizer wired together
pub struct QueryService {
    router: QueryRouter,
    fetcher: Arc<dyn Fetcher>,
    summarizer: TrendSummarizer,
}

impl QueryService {
    /// Compose a service from its parts
    pub fn new(router: QueryRouter, fetcher: Arc<dyn Fetcher>, summarizer: TrendSummarizer) -> Self {
        Self {
            router,
            fetcher,
            summarizer,
        }
    }

    /// Production wiring: reqwest session, disk cache and, when `llm` is
    /// given, model-backed classification and summaries
    pub fn from_config(config: &DataConfig, llm: Option<Arc<dyn LLMProvider>>) -> Result<Self> {
        config.validate()?;

        let fetcher = CachedFetcher::new(
            ProviderFetcher::from_config(config)?,
            FetchCache::new(&config.cache_dir),
            config.cache_enabled,
        );

        let (classifier, summarizer) = match llm {
            Some(provider) => (
                Some(IndicatorClassifier::new(Arc::clone(&provider), &config.model)),
                TrendSummarizer::with_llm(provider, &config.model),
            ),
            None => (None, TrendSummarizer::numeric()),
        };

        tracing::info!(
            cache_dir = %config.cache_dir.display(),
            cache_enabled = config.cache_enabled,
            model = classifier.is_some().then_some(config.model.as_str()),
            "Query service ready"
        );

        Ok(Self::new(
            QueryRouter::new(QueryInterpreter::new(classifier)),
            Arc::new(fetcher),
            summarizer,
        ))
    }

    /// Answer a question with one entry per routed plan
    ///
    /// An empty table is a normal answer whose summary says no data was
    /// returned.
    pub async fn answer(&self, text: &str) -> Result<Vec<SeriesAnswer>> {
        let plans = self.router.route(text).await.into_vec();
        let mut answers = Vec::with_capacity(plans.len());

        for plan in plans {
            let table = self.fetcher.fetch(&plan).await?;
            if table.is_empty() {
                tracing::warn!(indicator = plan.indicator(), "No data returned");
            }
            let summary = self
                .summarizer
                .summarize(plan.indicator(), plan.provider(), &table)
                .await;
            answers.push(SeriesAnswer {
                plan,
                table,
                summary,
            });
        }

        Ok(answers)
    }
}
