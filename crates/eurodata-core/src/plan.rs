//! Structured query plan shared by interpretation and fetching

use crate::catalog::{Frequency, Provider};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Provider-specific part of a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider")]
pub enum DataTarget {
    /// ECB dataflow and fully qualified series key
    #[serde(rename = "ECB")]
    Ecb {
        /// Dataflow identifier, e.g. "ICP"
        flow: String,
        /// Dot-separated series key; a segment may be a `+`-joined union
        series: String,
    },
    /// Eurostat dataset with dimension filters and regions
    Eurostat {
        /// Dataset code, e.g. "une_rt_m"
        dataset: String,
        /// Dimension filters other than geo
        filters: BTreeMap<String, String>,
        /// Requested region codes (ECB conventions, mapped at fetch time)
        geo: Vec<String>,
    },
}

impl DataTarget {
    /// Serving provider
    pub fn provider(&self) -> Provider {
        match self {
            Self::Ecb { .. } => Provider::Ecb,
            Self::Eurostat { .. } => Provider::Eurostat,
        }
    }

    /// Stable identifier of the selected data, used for cache keys
    pub fn dataset_id(&self) -> String {
        match self {
            Self::Ecb { flow, series } => format!("ECB/{flow}/{series}"),
            Self::Eurostat { dataset, .. } => format!("Eurostat/{dataset}"),
        }
    }
}

/// Optional time filters
///
/// When both a window bound and `last_n_observations` are set, the window
/// wins: see [`QueryParams::effective`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    /// First period, `YYYY-MM` (or `YYYY`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_period: Option<String>,
    /// Last period
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_period: Option<String>,
    /// Number of most recent observations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_n_observations: Option<u32>,
}

impl QueryParams {
    /// Params starting at `start_period`
    pub fn since(start_period: impl Into<String>) -> Self {
        Self {
            start_period: Some(start_period.into()),
            ..Self::default()
        }
    }

    /// Params asking for the last `n` observations
    pub fn last(n: u32) -> Self {
        Self {
            last_n_observations: Some(n.max(1)),
            ..Self::default()
        }
    }

    /// True when no filter is set
    pub fn is_empty(&self) -> bool {
        self.start_period.is_none() && self.end_period.is_none() && self.last_n_observations.is_none()
    }

    /// The filters actually sent upstream
    ///
    /// An explicit window takes precedence; `last_n_observations` is dropped
    /// whenever a start or end period is present.
    pub fn effective(&self) -> Self {
        if self.start_period.is_some() || self.end_period.is_some() {
            Self {
                last_n_observations: None,
                ..self.clone()
            }
        } else {
            self.clone()
        }
    }

    /// SDMX query pairs (`startPeriod`, `endPeriod`, `lastNObservations`)
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let effective = self.effective();
        let mut pairs = Vec::new();
        if let Some(start) = effective.start_period {
            pairs.push(("startPeriod".to_string(), start));
        }
        if let Some(end) = effective.end_period {
            pairs.push(("endPeriod".to_string(), end));
        }
        if let Some(n) = effective.last_n_observations {
            pairs.push(("lastNObservations".to_string(), n.to_string()));
        }
        pairs
    }
}

/// How the consumer should chart the result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartMode {
    /// One series
    #[default]
    Single,
    /// Side-by-side comparison
    Compare,
    /// Emphasis on evolution over time
    Trend,
}

/// What kind of reading the question asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    Growth,
    Decline,
    Comparison,
    #[default]
    Neutral,
}

/// Whether several countries are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompareMode {
    #[default]
    None,
    MultiCountry,
}

/// Intent annotations added by the router
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotations {
    pub chart_mode: ChartMode,
    pub analysis_type: AnalysisType,
    pub compare_mode: CompareMode,
    /// Country names mentioned in the question
    pub countries: BTreeSet<String>,
}

/// A resolved query
///
/// Built once by the interpreter; afterwards only the router touches it, and
/// only to set [`Annotations`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    #[serde(flatten)]
    target: DataTarget,
    params: QueryParams,
    indicator: String,
    freq: Frequency,
    #[serde(default)]
    annotations: Annotations,
}

impl QueryPlan {
    /// Create a plan
    pub fn new(
        target: DataTarget,
        params: QueryParams,
        indicator: impl Into<String>,
        freq: Frequency,
    ) -> Self {
        Self {
            target,
            params,
            indicator: indicator.into(),
            freq,
            annotations: Annotations::default(),
        }
    }

    /// Euro-area headline inflation, last 12 observations
    pub fn default_plan() -> Self {
        Self::new(
            DataTarget::Ecb {
                flow: "ICP".to_string(),
                series: "M.U2.N.000000.4.ANR".to_string(),
            },
            QueryParams::last(12),
            "Euro area inflation (default)",
            Frequency::M,
        )
    }

    /// Serving provider
    pub fn provider(&self) -> Provider {
        self.target.provider()
    }

    /// Provider-specific target
    pub fn target(&self) -> &DataTarget {
        &self.target
    }

    /// Time filters
    pub fn params(&self) -> &QueryParams {
        &self.params
    }

    /// Display label
    pub fn indicator(&self) -> &str {
        &self.indicator
    }

    /// Advisory frequency
    pub fn freq(&self) -> Frequency {
        self.freq
    }

    /// Router annotations
    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub(crate) fn annotate(&mut self, annotations: Annotations) {
        self.annotations = annotations;
    }

    /// Canonical request parameters used for cache keys
    pub fn request_params(&self) -> BTreeMap<String, String> {
        let mut params: BTreeMap<String, String> =
            self.params.to_query_pairs().into_iter().collect();
        if let DataTarget::Eurostat { filters, geo, .. } = &self.target {
            params.extend(filters.iter().map(|(k, v)| (k.clone(), v.clone())));
            params.insert("geo".to_string(), geo.join("+"));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plan() {
        let plan = QueryPlan::default_plan();
        assert_eq!(plan.provider(), Provider::Ecb);
        assert_eq!(plan.params().last_n_observations, Some(12));
        assert_eq!(plan.annotations(), &Annotations::default());
        match plan.target() {
            DataTarget::Ecb { flow, series } => {
                assert_eq!(flow, "ICP");
                assert_eq!(series, "M.U2.N.000000.4.ANR");
            }
            DataTarget::Eurostat { .. } => panic!("Expected ECB target"),
        }
    }

    #[test]
    fn test_window_wins_over_last_n() {
        let params = QueryParams {
            start_period: Some("2020-01".to_string()),
            end_period: None,
            last_n_observations: Some(24),
        };
        assert_eq!(
            params.to_query_pairs(),
            vec![("startPeriod".to_string(), "2020-01".to_string())]
        );

        let params = QueryParams::last(24);
        assert_eq!(
            params.to_query_pairs(),
            vec![("lastNObservations".to_string(), "24".to_string())]
        );
    }

    #[test]
    fn test_last_is_positive() {
        assert_eq!(QueryParams::last(0).last_n_observations, Some(1));
        assert!(QueryParams::default().is_empty());
        assert!(!QueryParams::since("2021-01").is_empty());
    }

    #[test]
    fn test_request_params_are_sorted_and_complete() {
        let plan = QueryPlan::new(
            DataTarget::Eurostat {
                dataset: "une_rt_m".to_string(),
                filters: BTreeMap::from([
                    ("sex".to_string(), "T".to_string()),
                    ("age".to_string(), "TOTAL".to_string()),
                ]),
                geo: vec!["FR".to_string(), "IT".to_string()],
            },
            QueryParams::since("2020-01"),
            "Unemployment",
            Frequency::M,
        );

        let keys: Vec<_> = plan.request_params().into_keys().collect();
        assert_eq!(keys, vec!["age", "geo", "sex", "startPeriod"]);
        assert_eq!(plan.request_params()["geo"], "FR+IT");
        assert_eq!(plan.target().dataset_id(), "Eurostat/une_rt_m");
    }

    #[test]
    fn test_plan_serializes_with_provider_tag() {
        let json = serde_json::to_value(QueryPlan::default_plan()).unwrap();
        assert_eq!(json["provider"], "ECB");
        assert_eq!(json["flow"], "ICP");
        assert_eq!(json["params"]["lastNObservations"], 12);
        assert_eq!(json["annotations"]["chart_mode"], "single");
    }
}
