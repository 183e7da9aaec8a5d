//! Free-text question to query plan
//!
//! Resolution order, first success wins: an explicit EUR currency pair, the
//! synonym table, the optional LLM classifier, and finally euro-area
//! inflation.

use crate::catalog::{
    self, CatalogEntry, Dimensions, EXCHANGE_RATE, INFLATION, PAIR_SLOT, REGION_SLOT,
};
use crate::classifier::IndicatorClassifier;
use crate::error::{DataError, Result};
use crate::extract::{DEFAULT_REGION, detect_countries, detect_period};
use crate::plan::{DataTarget, QueryParams, QueryPlan};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Currency codes and the words that name them after "eur"/"euro"
const CURRENCY_ALIASES: &[(&str, &[&str])] = &[
    ("USD", &["usd", "dollar"]),
    ("GBP", &["gbp", "pound", "sterling"]),
    ("JPY", &["jpy", "yen"]),
    ("CHF", &["chf", "swiss franc", "franc"]),
    ("CNY", &["cny", "yuan", "renminbi"]),
    ("SEK", &["sek", "krona"]),
    ("PLN", &["pln", "zloty"]),
    ("CAD", &["cad", "canadian dollar"]),
];

static FX_PATTERNS: LazyLock<std::result::Result<Vec<(&'static str, Regex)>, regex::Error>> =
    LazyLock::new(|| {
        CURRENCY_ALIASES
            .iter()
            .map(|(code, aliases)| {
                let pattern = format!(r"\b(eur|euro)[\s/-]*({})s?\b", aliases.join("|"));
                Regex::new(&pattern).map(|re| (*code, re))
            })
            .collect()
    });

/// Turns questions into plans
#[derive(Clone, Default)]
pub struct QueryInterpreter {
    classifier: Option<IndicatorClassifier>,
}

impl QueryInterpreter {
    /// Create an interpreter; without a classifier step 3 is skipped
    pub fn new(classifier: Option<IndicatorClassifier>) -> Self {
        Self { classifier }
    }

    /// Plan for `text`, or `None` when interpretation failed internally
    pub async fn interpret(&self, text: &str) -> Option<QueryPlan> {
        self.interpret_all(text).await?.into_iter().next()
    }

    /// Plans for every distinct indicator named in `text`
    ///
    /// Same resolution order as [`interpret`](Self::interpret); only the
    /// synonym step can produce more than one plan. Never empty when `Some`.
    pub async fn interpret_all(&self, text: &str) -> Option<Vec<QueryPlan>> {
        match self.try_interpret(text).await {
            Ok(plans) if !plans.is_empty() => Some(plans),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Interpretation failed");
                None
            }
        }
    }

    async fn try_interpret(&self, text: &str) -> Result<Vec<QueryPlan>> {
        let regions = detect_countries(text);
        let params = QueryParams::since(detect_period(text).start_period);

        if let Some(pair) = detect_fx_pair(text)? {
            let fx = required(EXCHANGE_RATE)?;
            tracing::info!(pair, "Matched currency pair");
            return Ok(vec![build_plan(fx, &regions, params, Some(pair))]);
        }

        let matched = catalog::match_distinct(text);
        if !matched.is_empty() {
            tracing::info!(indicators = ?matched.iter().map(|e| e.key).collect::<Vec<_>>(), "Matched synonyms");
            return Ok(matched
                .into_iter()
                .map(|entry| build_plan(entry, &regions, params.clone(), None))
                .collect());
        }

        if let Some(classifier) = &self.classifier {
            if let Some(entry) = classifier.classify(text).await {
                tracing::info!(indicator = entry.key, "Classified by model");
                return Ok(vec![build_plan(entry, &regions, params, None)]);
            }
        }

        tracing::info!("No indicator recognized, using euro-area inflation");
        let default_regions = BTreeSet::from([DEFAULT_REGION.to_string()]);
        Ok(vec![build_plan(required(INFLATION)?, &default_regions, params, None)])
    }
}

fn required(key: &str) -> Result<&'static CatalogEntry> {
    catalog::entry(key)
        .ok_or_else(|| DataError::InterpretationError(format!("catalog has no {key} entry")))
}

/// Currency code of a "EUR/xxx"-style pair named in `text`
pub fn detect_fx_pair(text: &str) -> Result<Option<&'static str>> {
    let patterns = FX_PATTERNS
        .as_ref()
        .map_err(|e| DataError::InterpretationError(e.to_string()))?;
    let lower = text.to_lowercase();

    Ok(patterns
        .iter()
        .find(|(_, re)| re.is_match(&lower))
        .map(|(code, _)| *code))
}

/// Instantiate a catalog entry for regions, window and currency
fn build_plan(
    entry: &CatalogEntry,
    regions: &BTreeSet<String>,
    params: QueryParams,
    pair: Option<&str>,
) -> QueryPlan {
    let codes: Vec<&str> = regions.iter().map(String::as_str).collect();
    let regional = codes != [DEFAULT_REGION];
    let mut label = entry.label.to_string();
    if let Some(pair) = pair {
        label = label.replace(PAIR_SLOT, pair);
    }

    let target = match entry.dimensions {
        Dimensions::SeriesKey(template) => {
            let mut series = template.replace(REGION_SLOT, &codes.join("+"));
            if let Some(pair) = pair {
                series = series.replace(PAIR_SLOT, pair);
            }
            if regional && entry.has_region_slot() {
                label = format!("{label} ({})", codes.join(", "));
            }
            DataTarget::Ecb {
                flow: entry.dataset.to_string(),
                series,
            }
        }
        Dimensions::Filters(filters) => {
            if regional {
                label = format!("{label} ({})", codes.join(", "));
            }
            DataTarget::Eurostat {
                dataset: entry.dataset.to_string(),
                filters: filters
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
                geo: codes.iter().map(|c| (*c).to_string()).collect(),
            }
        }
    };

    debug_assert_eq!(target.provider(), entry.provider);
    QueryPlan::new(target, params, label, entry.freq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Provider;
    use crate::classifier::testing::{MockLlm, reply};
    use std::sync::Arc;

    fn with_model(mock: MockLlm) -> QueryInterpreter {
        QueryInterpreter::new(Some(IndicatorClassifier::new(Arc::new(mock), "test-model")))
    }

    fn ecb_series(plan: &QueryPlan) -> (&str, &str) {
        match plan.target() {
            DataTarget::Ecb { flow, series } => (flow.as_str(), series.as_str()),
            DataTarget::Eurostat { .. } => panic!("Expected ECB target"),
        }
    }

    #[tokio::test]
    async fn test_euro_dollar() {
        let plan = QueryInterpreter::default().interpret("euro dollar").await.unwrap();
        assert_eq!(plan.provider(), Provider::Ecb);
        assert_eq!(ecb_series(&plan), ("EXR", "D.USD.EUR.SP00.A"));
        assert!(plan.indicator().contains("USD"));
        assert!(!plan.indicator().contains(PAIR_SLOT));
    }

    #[tokio::test]
    async fn test_fx_pairs() {
        let interpreter = QueryInterpreter::default();
        for (text, code) in [
            ("EUR/GBP last 6 months", "GBP"),
            ("eur-jpy since 2020", "JPY"),
            ("Euro Swiss franc", "CHF"),
            ("eurusd", "USD"),
        ] {
            let plan = interpreter.interpret(text).await.unwrap();
            assert_eq!(ecb_series(&plan).1, format!("D.{code}.EUR.SP00.A"), "{text}");
        }
    }

    #[tokio::test]
    async fn test_currency_alias_needs_whole_word() {
        let interpreter = QueryInterpreter::default();

        let plan = interpreter.interpret("Euro France inflation").await.unwrap();
        assert_eq!(ecb_series(&plan), ("ICP", "M.FR.N.000000.4.ANR"));

        let plan = interpreter.interpret("euro swiss francs").await.unwrap();
        assert_eq!(ecb_series(&plan).1, "D.CHF.EUR.SP00.A");
    }

    #[tokio::test]
    async fn test_overlapping_phrases_pick_specific_indicator() {
        let interpreter = QueryInterpreter::default();
        for (text, dataset, region) in [
            ("house price index in Spain", "prc_hpi_q", "ES"),
            ("industrial output growth in Germany", "sts_inpr_m", "DE"),
        ] {
            let plan = interpreter.interpret(text).await.unwrap();
            match plan.target() {
                DataTarget::Eurostat { dataset: found, geo, .. } => {
                    assert_eq!(found, dataset, "{text}");
                    assert_eq!(geo, &vec![region.to_string()], "{text}");
                }
                DataTarget::Ecb { .. } => panic!("Expected Eurostat target for {text}"),
            }
        }
    }

    #[tokio::test]
    async fn test_fx_wins_over_synonyms() {
        // "exchange" and "currency" are exchange-rate synonyms, but the pair decides
        let plan = QueryInterpreter::default()
            .interpret("currency exchange euro yen")
            .await
            .unwrap();
        assert_eq!(ecb_series(&plan).1, "D.JPY.EUR.SP00.A");
    }

    #[tokio::test]
    async fn test_unmatched_text_defaults_to_inflation() {
        let plan = QueryInterpreter::default()
            .interpret("what happened in Italy today?")
            .await
            .unwrap();
        assert_eq!(ecb_series(&plan), ("ICP", "M.U2.N.000000.4.ANR"));
        assert_eq!(plan.indicator(), "Inflation (HICP)");
        assert!(plan.params().start_period.is_some());
    }

    #[tokio::test]
    async fn test_region_fills_ecb_slot() {
        let plan = QueryInterpreter::default()
            .interpret("Inflation Italy vs Belgium last 3 years")
            .await
            .unwrap();
        assert_eq!(ecb_series(&plan).1, "M.BE+IT.N.000000.4.ANR");
        assert_eq!(plan.indicator(), "Inflation (HICP) (BE, IT)");
    }

    #[tokio::test]
    async fn test_ecb_key_without_slot_is_not_regionalized() {
        let plan = QueryInterpreter::default()
            .interpret("deposit rate in Germany")
            .await
            .unwrap();
        assert_eq!(ecb_series(&plan), ("FM", "D.U2.EUR.4F.KR.DFR.LEV"));
        assert_eq!(plan.indicator(), "Deposit Facility Rate (DFR)");
    }

    #[tokio::test]
    async fn test_region_goes_to_eurostat_geo() {
        let plan = QueryInterpreter::default()
            .interpret("Unemployment in Greece since 2019")
            .await
            .unwrap();
        match plan.target() {
            DataTarget::Eurostat {
                dataset,
                filters,
                geo,
            } => {
                assert_eq!(dataset, "une_rt_m");
                assert_eq!(filters["age"], "TOTAL");
                assert_eq!(geo, &vec!["GR".to_string()]);
            }
            DataTarget::Ecb { .. } => panic!("Expected Eurostat target"),
        }
        assert_eq!(plan.params().start_period.as_deref(), Some("2019-01"));
    }

    #[tokio::test]
    async fn test_classifier_only_without_synonym() {
        let mut mock = MockLlm::new();
        mock.expect_complete().times(0);
        let plan = with_model(mock).interpret("gdp in Spain").await.unwrap();
        assert_eq!(plan.provider(), Provider::Eurostat);

        let mut mock = MockLlm::new();
        mock.expect_complete()
            .times(1)
            .returning(|_| reply("house_prices"));
        let plan = with_model(mock)
            .interpret("how expensive are flats in Austria")
            .await
            .unwrap();
        assert!(plan.indicator().starts_with("House prices"));
    }

    #[tokio::test]
    async fn test_classifier_failure_falls_to_default() {
        let mut mock = MockLlm::new();
        mock.expect_complete()
            .returning(|_| Err(eurodata_llm::LLMError::RateLimitExceeded("slow down".to_string())));
        let plan = with_model(mock).interpret("how are things").await.unwrap();
        assert_eq!(ecb_series(&plan).1, "M.U2.N.000000.4.ANR");
    }

    #[tokio::test]
    async fn test_interpret_all_fans_out_synonyms() {
        let plans = QueryInterpreter::default()
            .interpret_all("compare inflation and unemployment in Italy")
            .await
            .unwrap();
        let labels: Vec<&str> = plans.iter().map(QueryPlan::indicator).collect();
        assert_eq!(
            labels,
            vec!["Inflation (HICP) (IT)", "Unemployment rate (Eurostat) (IT)"]
        );
    }

    #[tokio::test]
    async fn test_plans_always_have_params_and_label() {
        let interpreter = QueryInterpreter::default();
        for text in ["", "   ", "???", "GDP", "eur/usd", "\u{1F4B6} prices"] {
            let plan = interpreter.interpret(text).await.unwrap();
            assert!(!plan.indicator().is_empty());
            assert!(!plan.params().is_empty());
        }
    }
}
