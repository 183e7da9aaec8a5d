//! Query router
//!
//! Detects the intent of a question (chart mode, analysis type, countries),
//! delegates indicator selection to the [`QueryInterpreter`] and annotates
//! every resulting plan. Intent keywords match whole words, so "and" does
//! not fire inside "England" nor "vs" inside "cvs".

use crate::extract::detect_country_names;
use crate::interpreter::QueryInterpreter;
use crate::plan::{AnalysisType, Annotations, ChartMode, CompareMode, QueryPlan};

/// Keywords for intent detection
mod keywords {
    pub const COMPARE: &[&str] = &["compare", "comparison", "vs", "versus", "between", "and"];

    pub const TREND: &[&str] = &[
        "trend",
        "evolution",
        "change",
        "growth",
        "increase",
        "decrease",
        "decline",
        "rise",
        "fall",
        "over time",
        "history",
    ];

    pub const GROWTH: &[&str] = &[
        "growth", "grow", "growing", "increase", "increasing", "rise", "rising", "higher", "up",
    ];

    pub const DECLINE: &[&str] = &[
        "decline",
        "declining",
        "decrease",
        "decreasing",
        "fall",
        "falling",
        "drop",
        "lower",
        "down",
    ];

    pub const COMPARISON: &[&str] = &["compare", "comparison", "vs", "versus", "between"];
}

/// Plans produced for one question
#[derive(Debug, Clone, PartialEq)]
pub enum RoutedPlans {
    /// One indicator
    Single(QueryPlan),
    /// Several indicators compared side by side
    Many(Vec<QueryPlan>),
}

impl RoutedPlans {
    /// All plans, in order
    pub fn plans(&self) -> &[QueryPlan] {
        match self {
            Self::Single(plan) => std::slice::from_ref(plan),
            Self::Many(plans) => plans,
        }
    }

    /// Consume into a list of plans
    pub fn into_vec(self) -> Vec<QueryPlan> {
        match self {
            Self::Single(plan) => vec![plan],
            Self::Many(plans) => plans,
        }
    }
}

/// Lower-cased words of a question, for whole-word keyword tests
struct Words {
    spaced: String,
}

impl Words {
    fn new(text: &str) -> Self {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !(c.is_alphanumeric() || c == '-'))
            .filter(|w| !w.is_empty())
            .collect();
        Self {
            spaced: format!(" {} ", words.join(" ")),
        }
    }

    fn matches_any(&self, keywords: &[&str]) -> bool {
        keywords
            .iter()
            .any(|kw| self.spaced.contains(&format!(" {kw} ")))
    }
}

/// Intent annotations for `text`, computed without interpreting it
pub fn detect_intent(text: &str) -> Annotations {
    let words = Words::new(text);

    let chart_mode = if words.matches_any(keywords::COMPARE) {
        ChartMode::Compare
    } else if words.matches_any(keywords::TREND) {
        ChartMode::Trend
    } else {
        ChartMode::Single
    };

    let analysis_type = if words.matches_any(keywords::GROWTH) {
        AnalysisType::Growth
    } else if words.matches_any(keywords::DECLINE) {
        AnalysisType::Decline
    } else if words.matches_any(keywords::COMPARISON) {
        AnalysisType::Comparison
    } else {
        AnalysisType::Neutral
    };

    let countries = detect_country_names(text);
    let compare_mode = if countries.len() >= 2 {
        CompareMode::MultiCountry
    } else {
        CompareMode::None
    };

    Annotations {
        chart_mode,
        analysis_type,
        compare_mode,
        countries,
    }
}

/// Routes questions to annotated plans
#[derive(Clone, Default)]
pub struct QueryRouter {
    interpreter: QueryInterpreter,
}

impl QueryRouter {
    /// Create a router around an interpreter
    pub fn new(interpreter: QueryInterpreter) -> Self {
        Self { interpreter }
    }

    /// Route a question
    ///
    /// Blank input gets the default plan as is. In compare mode a question
    /// naming several indicators yields one plan per indicator. When the
    /// interpreter fails, the default plan still carries the detected intent.
    pub async fn route(&self, text: &str) -> RoutedPlans {
        if text.trim().is_empty() {
            tracing::warn!("Empty question, using default plan");
            return RoutedPlans::Single(QueryPlan::default_plan());
        }

        let intent = detect_intent(text);
        tracing::debug!(?intent, "Detected intent");

        let annotate = |mut plan: QueryPlan| {
            plan.annotate(intent.clone());
            plan
        };

        match self.interpreter.interpret_all(text).await {
            Some(plans) if intent.chart_mode == ChartMode::Compare && plans.len() >= 2 => {
                RoutedPlans::Many(plans.into_iter().map(annotate).collect())
            }
            Some(plans) => match plans.into_iter().next() {
                Some(plan) => RoutedPlans::Single(annotate(plan)),
                None => RoutedPlans::Single(annotate(QueryPlan::default_plan())),
            },
            None => {
                tracing::warn!("Interpretation failed, using default plan");
                RoutedPlans::Single(annotate(QueryPlan::default_plan()))
            }
        }
    }
}
