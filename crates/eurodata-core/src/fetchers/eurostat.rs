//! Eurostat dissemination API fetcher
//!
//! Requests `{base}/{dataset}` in JSON-stat form. Each requested region is
//! tried under its chain of Eurostat codes until one returns data; the euro
//! area aggregate in particular has changed code over time (EA20, EA19, EA).

use super::Fetcher;
use super::http::HttpTransport;
use crate::catalog::Frequency;
use crate::error::{DataError, Result};
use crate::plan::{DataTarget, QueryParams, QueryPlan};
use crate::table::{Observation, ObservationTable, json_value, parse_period};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Euro-area aggregate codes, newest first
pub const EURO_AREA_ALIASES: &[&str] = &["EA20", "EA19", "EA"];

/// Eurostat codes to try, in order, for a region code
pub fn geo_aliases(region: &str) -> Vec<String> {
    match region {
        "U2" | "EA" => EURO_AREA_ALIASES.iter().map(|c| (*c).to_string()).collect(),
        "GR" => vec!["EL".to_string()],
        other => vec![other.to_string()],
    }
}

/// Eurostat fetcher
pub struct EurostatFetcher {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
}

impl EurostatFetcher {
    /// Create a fetcher against `base_url`
    pub fn new(base_url: impl Into<String>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            base_url: base_url.into(),
            transport,
        }
    }

    /// Fetch one region of a dataset, walking its alias chain
    pub async fn fetch_region(
        &self,
        dataset: &str,
        filters: &BTreeMap<String, String>,
        params: &QueryParams,
        freq: Frequency,
        region: &str,
    ) -> ObservationTable {
        let url = format!("{}/{dataset}", self.base_url);

        for alias in geo_aliases(region) {
            let query = build_query(filters, params, freq, &alias);
            match self.attempt(&url, &query, &alias).await {
                Ok(table) if !table.is_empty() => {
                    tracing::info!(dataset, geo = %alias, rows = table.len(), "Eurostat data fetched");
                    return table;
                }
                Ok(_) => {
                    tracing::warn!(dataset, geo = %alias, "Eurostat returned no values");
                }
                Err(e) => {
                    tracing::warn!(dataset, geo = %alias, error = %e, "Eurostat request failed");
                }
            }
        }

        ObservationTable::empty()
    }

    async fn attempt(&self, url: &str, query: &[(String, String)], alias: &str) -> Result<ObservationTable> {
        let response = self.transport.get(url, query).await?;
        if !response.is_success() {
            return Err(DataError::HttpStatus {
                status: response.status,
                url: url.to_string(),
            });
        }
        expand_json_stat(&response.body, alias)
    }
}

#[async_trait]
impl Fetcher for EurostatFetcher {
    async fn fetch(&self, plan: &QueryPlan) -> Result<ObservationTable> {
        let DataTarget::Eurostat {
            dataset,
            filters,
            geo,
        } = plan.target()
        else {
            return Err(DataError::UnsupportedProvider(plan.provider().to_string()));
        };

        let mut tables = Vec::with_capacity(geo.len());
        for region in geo {
            tables.push(
                self.fetch_region(dataset, filters, plan.params(), plan.freq(), region)
                    .await,
            );
        }

        let table = ObservationTable::concat(tables);
        if table.is_empty() {
            tracing::warn!(dataset = %dataset, ?geo, "No Eurostat region produced data");
        }
        Ok(table)
    }
}

/// Query pairs for one alias
///
/// SDMX window names are translated to Eurostat's (`sinceTimePeriod`,
/// `untilTimePeriod`, `lastTimePeriod`) and periods reformatted to the
/// dataset frequency.
fn build_query(
    filters: &BTreeMap<String, String>,
    params: &QueryParams,
    freq: Frequency,
    alias: &str,
) -> Vec<(String, String)> {
    let mut query = vec![
        ("format".to_string(), "JSON".to_string()),
        ("lang".to_string(), "EN".to_string()),
    ];
    query.extend(filters.iter().map(|(k, v)| (k.clone(), v.clone())));

    let window = params.effective();
    if let Some(start) = window.start_period {
        query.push(("sinceTimePeriod".to_string(), format_period(&start, freq)));
    }
    if let Some(end) = window.end_period {
        query.push(("untilTimePeriod".to_string(), format_period(&end, freq)));
    }
    if let Some(n) = window.last_n_observations {
        query.push(("lastTimePeriod".to_string(), n.to_string()));
    }

    query.push(("geo".to_string(), alias.to_string()));
    query
}

/// Reformat a `YYYY-MM` (or `YYYY`) period for a dataset frequency
pub fn format_period(period: &str, freq: Frequency) -> String {
    let Some(year) = period.get(..4).filter(|y| y.bytes().all(|b| b.is_ascii_digit())) else {
        return period.to_string();
    };
    let month: u32 = period
        .get(5..7)
        .and_then(|m| m.parse().ok())
        .filter(|m| (1..=12).contains(m))
        .unwrap_or(1);

    match freq {
        Frequency::A => year.to_string(),
        Frequency::Q => format!("{year}-Q{}", (month - 1) / 3 + 1),
        Frequency::M | Frequency::D => format!("{year}-{month:02}"),
    }
}

/// Ordered category codes of one dimension
struct Dimension {
    id: String,
    codes: Vec<String>,
}

/// Expand a JSON-stat dataset into observations
///
/// The flat value index enumerates the Cartesian product of dimension codes
/// in declaration order, last dimension varying fastest. Dense value arrays
/// are read positionally and stop when exhausted; sparse value objects are
/// keyed by the flat index. Rows take their region from the `geo` dimension,
/// or `alias` when the dataset has none.
pub fn expand_json_stat(body: &str, alias: &str) -> Result<ObservationTable> {
    let root: Value = serde_json::from_str(body)?;
    let Some(values) = root.get("value") else {
        return Ok(ObservationTable::empty());
    };

    let dims = dimensions(&root)?;
    let time_pos = dims
        .iter()
        .position(|d| d.id.eq_ignore_ascii_case("time"))
        .ok_or_else(|| DataError::ApiError("JSON-stat without time dimension".to_string()))?;
    let geo_pos = dims.iter().position(|d| d.id.eq_ignore_ascii_case("geo"));
    let total = dims
        .iter()
        .try_fold(1usize, |acc, d| acc.checked_mul(d.codes.len()))
        .ok_or_else(|| DataError::ApiError("JSON-stat dimension sizes overflow".to_string()))?;

    let cells: Vec<(usize, &Value)> = match values {
        Value::Array(items) => items.iter().enumerate().collect(),
        Value::Object(items) => items
            .iter()
            .filter_map(|(k, v)| Some((k.parse::<usize>().ok()?, v)))
            .collect(),
        _ => return Err(DataError::ApiError("JSON-stat value is not a collection".to_string())),
    };

    let mut rows = Vec::new();
    for (flat, raw) in cells {
        if flat >= total {
            continue;
        }
        let coords = decode_index(flat, &dims);
        let time = parse_period(&dims[time_pos].codes[coords[time_pos]]);
        let region = geo_pos.map_or_else(|| alias.to_string(), |p| dims[p].codes[coords[p]].clone());
        if let (Some(time), Some(value)) = (time, json_value(raw)) {
            rows.push(Observation { time, value, region });
        }
    }

    Ok(ObservationTable::new(rows))
}

fn dimensions(root: &Value) -> Result<Vec<Dimension>> {
    let dimension = root
        .get("dimension")
        .and_then(Value::as_object)
        .ok_or_else(|| DataError::ApiError("JSON-stat without dimension".to_string()))?;

    let order: Vec<String> = match root.get("id").and_then(Value::as_array) {
        Some(ids) => ids.iter().filter_map(Value::as_str).map(str::to_string).collect(),
        None => dimension
            .keys()
            .filter(|k| !matches!(k.as_str(), "id" | "size"))
            .cloned()
            .collect(),
    };

    order
        .into_iter()
        .map(|id| {
            let category = dimension
                .get(&id)
                .and_then(|d| d.get("category"))
                .ok_or_else(|| DataError::ApiError(format!("JSON-stat dimension {id} has no category")))?;
            let codes = category_codes(category);
            if codes.is_empty() {
                return Err(DataError::ApiError(format!("JSON-stat dimension {id} is empty")));
            }
            Ok(Dimension { id, codes })
        })
        .collect()
}

/// Codes ordered by their category index
///
/// The index may be an object of positions or an array of codes; a category
/// with only labels has its codes in label order.
fn category_codes(category: &Value) -> Vec<String> {
    match category.get("index") {
        Some(Value::Object(index)) => {
            let mut pairs: Vec<(u64, &String)> = index
                .iter()
                .filter_map(|(code, pos)| Some((pos.as_u64()?, code)))
                .collect();
            pairs.sort_by_key(|(pos, _)| *pos);
            pairs.into_iter().map(|(_, code)| code.clone()).collect()
        }
        Some(Value::Array(codes)) => codes.iter().filter_map(Value::as_str).map(str::to_string).collect(),
        _ => category
            .get("label")
            .and_then(Value::as_object)
            .map(Map::keys)
            .map(|keys| keys.cloned().collect())
            .unwrap_or_default(),
    }
}

/// Mixed-radix decode of a flat index, last dimension fastest
fn decode_index(mut flat: usize, dims: &[Dimension]) -> Vec<usize> {
    let mut coords = vec![0; dims.len()];
    for (slot, dim) in coords.iter_mut().zip(dims).rev() {
        let size = dim.codes.len();
        *slot = flat % size;
        flat /= size;
    }
    coords
}
