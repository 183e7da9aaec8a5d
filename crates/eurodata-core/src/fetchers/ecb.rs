//! ECB Data Portal fetcher
//!
//! Requests `{base}/data/{flow}/{series}` as SDMX-JSON first and falls back
//! to SDMX-CSV (`csvdata`) when the JSON attempt fails or yields nothing.
//!
//! Regions come from the `REF_AREA` dimension when the response carries it;
//! otherwise they are derived from the country position of the requested key.

use super::Fetcher;
use super::http::HttpTransport;
use crate::error::{DataError, Result};
use crate::extract::DEFAULT_REGION;
use crate::plan::{DataTarget, QueryPlan};
use crate::table::{Observation, ObservationTable, json_value, parse_period, parse_value};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::sync::Arc;

const REF_AREA: &str = "REF_AREA";
const TIME_PERIOD: &str = "TIME_PERIOD";
const OBS_VALUE: &str = "OBS_VALUE";

/// Response formats, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    SdmxJson,
    Csv,
}

impl Format {
    fn as_param(self) -> &'static str {
        match self {
            Self::SdmxJson => "sdmx-json",
            Self::Csv => "csvdata",
        }
    }
}

/// ECB fetcher
pub struct EcbFetcher {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
}

impl EcbFetcher {
    /// Create a fetcher against `base_url`
    pub fn new(base_url: impl Into<String>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            base_url: base_url.into(),
            transport,
        }
    }

    /// Fetch one series key from a dataflow
    pub async fn fetch_series(
        &self,
        flow: &str,
        series: &str,
        params: &[(String, String)],
    ) -> ObservationTable {
        let url = format!("{}/data/{flow}/{series}", self.base_url);
        let regions = key_regions(series);

        for format in [Format::SdmxJson, Format::Csv] {
            match self.attempt(&url, params, format, &regions).await {
                Ok(table) if !table.is_empty() => {
                    tracing::info!(flow, series, rows = table.len(), format = format.as_param(), "ECB data fetched");
                    return table;
                }
                Ok(_) => {
                    tracing::warn!(flow, series, format = format.as_param(), "ECB returned no observations");
                }
                Err(e) => {
                    tracing::warn!(flow, series, format = format.as_param(), error = %e, "ECB request failed");
                }
            }
        }

        ObservationTable::empty()
    }

    async fn attempt(
        &self,
        url: &str,
        params: &[(String, String)],
        format: Format,
        regions: &[String],
    ) -> Result<ObservationTable> {
        let mut query = vec![("format".to_string(), format.as_param().to_string())];
        query.extend_from_slice(params);

        let response = self.transport.get(url, &query).await?;
        if !response.is_success() {
            return Err(DataError::HttpStatus {
                status: response.status,
                url: url.to_string(),
            });
        }

        match format {
            Format::SdmxJson => parse_sdmx_json(&response.body, regions),
            Format::Csv => parse_csv(&response.body, regions),
        }
    }
}

#[async_trait]
impl Fetcher for EcbFetcher {
    async fn fetch(&self, plan: &QueryPlan) -> Result<ObservationTable> {
        let DataTarget::Ecb { flow, series } = plan.target() else {
            return Err(DataError::UnsupportedProvider(plan.provider().to_string()));
        };
        Ok(self
            .fetch_series(flow, series, &plan.params().to_query_pairs())
            .await)
    }
}

/// Country codes at the conventional position (second segment) of a key
///
/// Falls back to the euro area when that segment is not made of two-letter
/// area codes, e.g. the currency segment of an FX key.
fn key_regions(series: &str) -> Vec<String> {
    let codes: Vec<String> = series
        .split('.')
        .nth(1)
        .map(|segment| segment.split('+').map(str::to_string).collect())
        .unwrap_or_default();

    let is_area = |c: &String| c.len() == 2 && c.bytes().all(|b| b.is_ascii_alphanumeric());
    if !codes.is_empty() && codes.iter().all(is_area) {
        codes
    } else {
        vec![DEFAULT_REGION.to_string()]
    }
}

fn joined(regions: &[String]) -> String {
    regions.join("+")
}

/// Parse an SDMX-JSON data message
///
/// Every series is read when `REF_AREA` is a series dimension; otherwise only
/// the first series is, attributed to the requested key.
fn parse_sdmx_json(body: &str, regions: &[String]) -> Result<ObservationTable> {
    let root: Value = serde_json::from_str(body)?;
    let message = root.get("data").unwrap_or(&root);

    let series_map = message
        .pointer("/dataSets/0/series")
        .and_then(Value::as_object)
        .ok_or_else(|| DataError::ApiError("SDMX-JSON without dataSets[0].series".to_string()))?;
    let structure = message
        .get("structure")
        .ok_or_else(|| DataError::ApiError("SDMX-JSON without structure".to_string()))?;

    let times = time_values(structure)?;
    let series_dims = structure
        .pointer("/dimensions/series")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let area_pos = series_dims
        .iter()
        .position(|d| d.get("id").and_then(Value::as_str) == Some(REF_AREA));

    let take = if area_pos.is_some() { series_map.len() } else { 1 };
    let mut rows = Vec::new();

    for (key, series) in series_map.iter().take(take) {
        let region = area_pos
            .and_then(|pos| dimension_code(series_dims, key, pos))
            .unwrap_or_else(|| joined(regions));

        let Some(observations) = series.get("observations").and_then(Value::as_object) else {
            continue;
        };
        for (index, obs) in observations {
            let time = index
                .parse::<usize>()
                .ok()
                .and_then(|i| times.get(i).copied().flatten());
            let value = obs.get(0).and_then(json_value);
            if let (Some(time), Some(value)) = (time, value) {
                rows.push(Observation {
                    time,
                    value,
                    region: region.clone(),
                });
            }
        }
    }

    Ok(ObservationTable::new(rows))
}

/// Parsed time values of the observation dimension, by position
fn time_values(structure: &Value) -> Result<Vec<Option<NaiveDate>>> {
    let dims = structure
        .pointer("/dimensions/observation")
        .and_then(Value::as_array)
        .ok_or_else(|| DataError::ApiError("SDMX-JSON without observation dimension".to_string()))?;

    let time_dim = dims
        .iter()
        .find(|d| d.get("id").and_then(Value::as_str) == Some(TIME_PERIOD))
        .or_else(|| dims.first())
        .ok_or_else(|| DataError::ApiError("SDMX-JSON without time dimension".to_string()))?;

    Ok(time_dim
        .get("values")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .map(|v| v.get("id").and_then(Value::as_str).and_then(parse_period))
                .collect()
        })
        .unwrap_or_default())
}

/// Code of the dimension at `pos` for a `0:1:0`-style series key
fn dimension_code(dims: &[Value], key: &str, pos: usize) -> Option<String> {
    let index: usize = key.split(':').nth(pos)?.parse().ok()?;
    dims.get(pos)?
        .pointer(&format!("/values/{index}/id"))?
        .as_str()
        .map(str::to_string)
}

/// Parse an SDMX-CSV payload
///
/// Leading lines before the header containing `OBS_VALUE` are skipped.
fn parse_csv(body: &str, regions: &[String]) -> Result<ObservationTable> {
    let start = body
        .lines()
        .position(|line| line.contains(OBS_VALUE))
        .ok_or_else(|| DataError::ApiError("CSV without OBS_VALUE header".to_string()))?;
    let payload = body.lines().skip(start).collect::<Vec<_>>().join("\n");

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(payload.as_bytes());
    let headers = reader.headers()?.clone();

    let time_col = find_column(&headers, TIME_PERIOD, &["TIME", "PERIOD"])
        .ok_or_else(|| DataError::ApiError("CSV without time column".to_string()))?;
    let value_col = find_column(&headers, OBS_VALUE, &["OBS", "VALUE"])
        .ok_or_else(|| DataError::ApiError("CSV without value column".to_string()))?;
    let area_col = headers.iter().position(|h| h.trim() == REF_AREA);

    let mut rows = Vec::new();
    for record in reader.records() {
        let Ok(record) = record else { continue };
        let time = record.get(time_col).and_then(parse_period);
        let value = record.get(value_col).and_then(parse_value);
        let region = area_col
            .and_then(|c| record.get(c))
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        if let (Some(time), Some(value)) = (time, value) {
            rows.push((time, value, region));
        }
    }

    let rows = if area_col.is_some() {
        rows.into_iter()
            .filter_map(|(time, value, region)| {
                Some(Observation {
                    time,
                    value,
                    region: region?,
                })
            })
            .collect()
    } else {
        attribute_blocks(rows.into_iter().map(|(t, v, _)| (t, v)).collect(), regions)
    };

    Ok(ObservationTable::new(rows))
}

fn find_column(headers: &csv::StringRecord, exact: &str, fragments: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(exact))
        .or_else(|| {
            headers.iter().position(|h| {
                let upper = h.to_uppercase();
                fragments.iter().any(|f| upper.contains(f))
            })
        })
}

/// Assign regions to rows of a response without an area column
///
/// A multi-country key yields one block per country, each block starting
/// where the time sequence restarts. When the block count does not match the
/// requested codes, all rows get the joined code.
fn attribute_blocks(rows: Vec<(NaiveDate, f64)>, regions: &[String]) -> Vec<Observation> {
    let mut blocks: Vec<Vec<(NaiveDate, f64)>> = Vec::new();
    let mut last: Option<NaiveDate> = None;
    for (time, value) in rows {
        if last.is_none_or(|prev| time <= prev) {
            blocks.push(Vec::new());
        }
        if let Some(block) = blocks.last_mut() {
            block.push((time, value));
        }
        last = Some(time);
    }

    if regions.len() > 1 && blocks.len() == regions.len() {
        blocks
            .into_iter()
            .zip(regions)
            .flat_map(|(block, region)| {
                block.into_iter().map(move |(time, value)| Observation {
                    time,
                    value,
                    region: region.clone(),
                })
            })
            .collect()
    } else {
        let region = joined(regions);
        blocks
            .into_iter()
            .flatten()
            .map(|(time, value)| Observation {
                time,
                value,
                region: region.clone(),
            })
            .collect()
    }
}
