//! European macro statistics query engine
//!
//! Turns free-text questions about euro-area economics into structured
//! queries against the ECB Data Portal or Eurostat, and fetches the answer as
//! a normalized time series. It includes:
//!
//! - A static indicator catalog with synonym matching
//! - Country and time-window extraction from free text
//! - Optional LLM classification for questions no synonym covers
//! - Intent routing (compare/trend, growth/decline, multi-country)
//! - ECB (SDMX-JSON with SDMX-CSV fallback) and Eurostat (JSON-stat) fetchers
//! - A content-addressed disk cache for fetched tables
//! - Trend summaries with a numeric fallback
//!
//! # Architecture
//!
//! text → [`QueryRouter`] → [`QueryInterpreter`] → [`QueryPlan`]s →
//! [`Fetcher`] → [`ObservationTable`]s → [`TrendSummarizer`]
//!
//! [`QueryService`] wires these together.
//!
//! # Example
//!
//! ```rust,ignore
//! use eurodata_core::{DataConfig, QueryService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DataConfig::from_env()?;
//!     let service = QueryService::from_config(&config, None)?;
//!
//!     for answer in service.answer("Inflation Italy vs France last 3 years").await? {
//!         println!("{}: {} rows", answer.plan.indicator(), answer.table.len());
//!         println!("{}", answer.summary);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetchers;
pub mod interpreter;
pub mod plan;
pub mod router;
pub mod service;
pub mod summary;
pub mod table;

// Re-export main types for convenience
pub use cache::{CachedFetcher, FetchCache};
pub use catalog::{CatalogEntry, Frequency, Provider};
pub use classifier::IndicatorClassifier;
pub use config::DataConfig;
pub use error::{DataError, Result};
pub use fetchers::{EcbFetcher, EurostatFetcher, Fetcher, HttpTransport, ProviderFetcher, ReqwestTransport};
pub use interpreter::QueryInterpreter;
pub use plan::{AnalysisType, Annotations, ChartMode, CompareMode, DataTarget, QueryParams, QueryPlan};
pub use router::{QueryRouter, RoutedPlans};
pub use service::{QueryService, SeriesAnswer};
pub use summary::{TrendStats, TrendSummarizer};
pub use table::{Observation, ObservationTable};
