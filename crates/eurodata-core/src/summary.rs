//! Short textual trend summaries for fetched tables

use crate::catalog::Provider;
use crate::table::ObservationTable;
use chrono::Local;
use eurodata_llm::{CompletionRequest, LLMProvider, Message};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;

/// Summary text for an empty table
pub const NO_DATA: &str = "No data returned.";

const NOT_ENOUGH_DATA: &str = "Not enough data to summarize.";

/// Data-source citation for a provider
pub fn citation(provider: Provider) -> &'static str {
    match provider {
        Provider::Ecb => {
            "Data source: European Central Bank Data Portal (https://data.ecb.europa.eu/), licensed under CC BY 4.0."
        }
        Provider::Eurostat => {
            "Data source: Eurostat (https://ec.europa.eu/eurostat), licensed under CC BY 4.0."
        }
    }
}

/// Direction of the latest move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Direction {
    fn of(change: f64) -> Self {
        if change > 0.0 {
            Self::Up
        } else if change < 0.0 {
            Self::Down
        } else {
            Self::Flat
        }
    }

    /// Arrow glyph
    pub fn arrow(self) -> &'static str {
        match self {
            Self::Up => "↑",
            Self::Down => "↓",
            Self::Flat => "→",
        }
    }
}

/// Latest move of one region, values rounded to two decimals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendStats {
    pub region: String,
    pub last: f64,
    pub prev: f64,
    pub abs_change: f64,
    /// Percent change against `prev`; 0 when `prev` is 0
    pub pct_change: f64,
    pub direction: Direction,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Per-region stats over the last two observations
///
/// Regions with fewer than two rows are skipped. Output is ordered by region.
pub fn compute_trend_stats(table: &ObservationTable) -> Vec<TrendStats> {
    table
        .regions()
        .into_iter()
        .filter_map(|region| {
            let mut values = table.for_region(region).map(|o| o.value).rev();
            let last = values.next()?;
            let prev = values.next()?;
            let change = last - prev;
            let pct_change = if prev == 0.0 { 0.0 } else { change / prev * 100.0 };
            Some(TrendStats {
                region: region.to_string(),
                last: round2(last),
                prev: round2(prev),
                abs_change: round2(change),
                pct_change: round2(pct_change),
                direction: Direction::of(change),
            })
        })
        .collect()
}

/// Writes three-bullet summaries, with or without a language model
#[derive(Clone, Default)]
pub struct TrendSummarizer {
    provider: Option<Arc<dyn LLMProvider>>,
    model: String,
}

impl TrendSummarizer {
    /// Summaries from `model` on `provider`
    pub fn with_llm(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider: Some(provider),
            model: model.into(),
        }
    }

    /// Numeric summaries only
    pub fn numeric() -> Self {
        Self::default()
    }

    /// Summary of `table` ending with the provider citation
    pub async fn summarize(&self, indicator: &str, source: Provider, table: &ObservationTable) -> String {
        let cite = citation(source);
        if table.is_empty() {
            return format!("{NO_DATA}\n\n{cite}");
        }

        let stats = compute_trend_stats(table);
        if stats.is_empty() {
            return format!("{NOT_ENOUGH_DATA}\n\n{cite}");
        }

        if let Some(provider) = &self.provider {
            match self.ask_model(provider.as_ref(), indicator, &stats).await {
                Some(text) => return format!("Quick summary\n{text}\n\n{cite}"),
                None => tracing::warn!(indicator, "Model summary unavailable, using numeric fallback"),
            }
        }

        numeric_summary(&stats, cite)
    }

    async fn ask_model(
        &self,
        provider: &dyn LLMProvider,
        indicator: &str,
        stats: &[TrendStats],
    ) -> Option<String> {
        let request = CompletionRequest::builder(&self.model)
            .system("You are an expert macroeconomic data analyst.")
            .add_message(Message::user(build_prompt(indicator, stats)))
            .max_tokens(200)
            .temperature(0.4)
            .build();

        match provider.complete(request).await {
            Ok(response) => {
                let text = response.text().trim();
                (!text.is_empty()).then(|| text.to_string())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Summary request failed");
                None
            }
        }
    }
}

fn build_prompt(indicator: &str, stats: &[TrendStats]) -> String {
    let month = Local::now().format("%B %Y");
    let mut prompt = format!(
        "Summarize the following indicator: '{indicator}'. The current month is {month}. \
         Focus on trends, differences and anomalies.\n\nLatest available data by region:\n"
    );
    for s in stats {
        let _ = writeln!(
            prompt,
            "- {}: {:.2} ({} {:+.2}, {:+.1}%)",
            s.region,
            s.last,
            s.direction.arrow(),
            s.abs_change,
            s.pct_change
        );
    }
    prompt.push_str(
        "\nNow write exactly 3 short bullet points (at most 20 words each). \
         Be factual and clear, no speculation. Mention changes or comparisons if visible.",
    );
    prompt
}

fn numeric_summary(stats: &[TrendStats], cite: &str) -> String {
    let mut lines = vec!["Quick summary".to_string()];
    lines.extend(stats.iter().map(|s| {
        format!(
            "• {}: {:.1} ({} {:+.1}, {:+.1}%)",
            s.region,
            s.last,
            s.direction.arrow(),
            s.abs_change,
            s.pct_change
        )
    }));
    lines.push("• (model summary unavailable, numeric fallback)".to_string());
    lines.push(String::new());
    lines.push(cite.to_string());
    lines.join("\n")
}
