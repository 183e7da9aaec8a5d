//! Normalized observation table
//!
//! Every fetcher produces the same three-column shape: a parsed date, a
//! finite value and a region code. Rows that fail any of these are dropped
//! on construction, and rows are kept in ascending time order.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One data point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Period start
    pub time: NaiveDate,
    /// Observed value
    pub value: f64,
    /// Region code
    pub region: String,
}

/// Rows sorted by time, with no missing fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Observation>", into = "Vec<Observation>")]
pub struct ObservationTable {
    rows: Vec<Observation>,
}

impl ObservationTable {
    /// Build a table, dropping invalid rows and sorting by time
    ///
    /// The sort is stable, so rows with equal times keep their input order.
    pub fn new(rows: Vec<Observation>) -> Self {
        let mut rows: Vec<Observation> = rows
            .into_iter()
            .filter(|row| row.value.is_finite() && !row.region.trim().is_empty())
            .collect();
        rows.sort_by_key(|row| row.time);
        Self { rows }
    }

    /// Build a table from raw period labels and values
    ///
    /// Entries whose period or value does not parse are dropped.
    pub fn from_raw<I, T, V, R>(raw: I) -> Self
    where
        I: IntoIterator<Item = (T, V, R)>,
        T: AsRef<str>,
        V: AsRef<str>,
        R: Into<String>,
    {
        let rows = raw
            .into_iter()
            .filter_map(|(time, value, region)| {
                Some(Observation {
                    time: parse_period(time.as_ref())?,
                    value: parse_value(value.as_ref())?,
                    region: region.into(),
                })
            })
            .collect();
        Self::new(rows)
    }

    /// Empty table
    pub fn empty() -> Self {
        Self::default()
    }

    /// Concatenate tables, re-sorting by time
    pub fn concat(tables: impl IntoIterator<Item = ObservationTable>) -> Self {
        Self::new(tables.into_iter().flat_map(|t| t.rows).collect())
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when there are no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in time order
    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    /// Iterate over rows
    pub fn iter(&self) -> std::slice::Iter<'_, Observation> {
        self.rows.iter()
    }

    /// Distinct region codes, sorted
    pub fn regions(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|r| r.region.as_str()).collect()
    }

    /// Rows of one region, in time order
    pub fn for_region<'a>(
        &'a self,
        region: &'a str,
    ) -> impl DoubleEndedIterator<Item = &'a Observation> {
        self.rows.iter().filter(move |r| r.region == region)
    }
}

impl From<Vec<Observation>> for ObservationTable {
    fn from(rows: Vec<Observation>) -> Self {
        Self::new(rows)
    }
}

impl From<ObservationTable> for Vec<Observation> {
    fn from(table: ObservationTable) -> Self {
        table.rows
    }
}

impl<'a> IntoIterator for &'a ObservationTable {
    type Item = &'a Observation;
    type IntoIter = std::slice::Iter<'a, Observation>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Parse an SDMX period label into the first day of the period
///
/// Accepts `YYYY-MM-DD`, ISO date-times, `YYYY-MM`, `YYYY`, `YYYY-Qn`,
/// `YYYYMmm` and `YYYY-Sn`. Quarters map to months 01/04/07/10 and halves
/// to 01/07.
pub fn parse_period(label: &str) -> Option<NaiveDate> {
    let s = label.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if s.len() > 10 {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
            return Some(dt.date());
        }
        if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
            return Some(dt.date_naive());
        }
        // Trailing time we don't understand; fall back to the date prefix
        return s.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
    }

    let (year, rest) = split_year(s)?;
    let month = if rest.is_empty() {
        1
    } else if let Some(q) = rest.strip_prefix("-Q").or_else(|| rest.strip_prefix('Q')) {
        match q.parse::<u32>().ok()? {
            n @ 1..=4 => (n - 1) * 3 + 1,
            _ => return None,
        }
    } else if let Some(h) = rest.strip_prefix("-S").or_else(|| rest.strip_prefix('S')) {
        match h.parse::<u32>().ok()? {
            1 => 1,
            2 => 7,
            _ => return None,
        }
    } else if let Some(m) = rest.strip_prefix('M').or_else(|| rest.strip_prefix('-')) {
        if m.len() != 2 {
            return None;
        }
        m.parse::<u32>().ok()?
    } else {
        return None;
    };

    NaiveDate::from_ymd_opt(year, month, 1)
}

fn split_year(s: &str) -> Option<(i32, &str)> {
    let digits = s.get(..4)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((digits.parse().ok()?, &s[4..]))
}

/// Parse a numeric cell; empty, NaN and infinite values are rejected
pub fn parse_value(raw: &str) -> Option<f64> {
    let v: f64 = raw.trim().parse().ok()?;
    v.is_finite().then_some(v)
}

/// Parse a JSON value that may be a number or a numeric string
pub fn json_value(raw: &serde_json::Value) -> Option<f64> {
    match raw {
        serde_json::Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        serde_json::Value::String(s) => parse_value(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn obs(time: NaiveDate, value: f64, region: &str) -> Observation {
        Observation {
            time,
            value,
            region: region.to_string(),
        }
    }

    #[test]
    fn test_period_formats() {
        assert_eq!(parse_period("2024-03-15"), Some(day(2024, 3, 15)));
        assert_eq!(parse_period("2024-03"), Some(day(2024, 3, 1)));
        assert_eq!(parse_period("2024"), Some(day(2024, 1, 1)));
        assert_eq!(parse_period("2024-Q1"), Some(day(2024, 1, 1)));
        assert_eq!(parse_period("2024-Q3"), Some(day(2024, 7, 1)));
        assert_eq!(parse_period("2024Q4"), Some(day(2024, 10, 1)));
        assert_eq!(parse_period("2024M07"), Some(day(2024, 7, 1)));
        assert_eq!(parse_period("2024-S2"), Some(day(2024, 7, 1)));
        assert_eq!(parse_period("2024-03-15T10:30:00"), Some(day(2024, 3, 15)));
        assert_eq!(parse_period("2024-03-15T10:30:00+01:00"), Some(day(2024, 3, 15)));
    }

    #[test]
    fn test_period_rejects_garbage() {
        for bad in ["", "abcd", "2024-Q5", "2024-13", "2024-S3", "20", "2024-1", "2024W01"] {
            assert_eq!(parse_period(bad), None, "{bad} should not parse");
        }
    }

    #[test]
    fn test_values() {
        assert_eq!(parse_value(" 2.5 "), Some(2.5));
        assert_eq!(parse_value("NaN"), None);
        assert_eq!(parse_value("inf"), None);
        assert_eq!(parse_value(""), None);
        assert_eq!(json_value(&serde_json::json!(1.25)), Some(1.25));
        assert_eq!(json_value(&serde_json::json!("3")), Some(3.0));
        assert_eq!(json_value(&serde_json::Value::Null), None);
    }

    #[test]
    fn test_invalid_rows_dropped_and_sorted() {
        let table = ObservationTable::new(vec![
            obs(day(2024, 3, 1), 2.0, "IT"),
            obs(day(2024, 1, 1), f64::NAN, "IT"),
            obs(day(2024, 2, 1), 1.5, ""),
            obs(day(2024, 1, 1), 1.0, "IT"),
        ]);

        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0].time, day(2024, 1, 1));
        assert_eq!(table.rows()[1].time, day(2024, 3, 1));
    }

    #[test]
    fn test_sort_is_stable() {
        let table = ObservationTable::new(vec![
            obs(day(2024, 2, 1), 2.0, "FR"),
            obs(day(2024, 1, 1), 1.0, "IT"),
            obs(day(2024, 1, 1), 1.1, "FR"),
        ]);
        let regions: Vec<_> = table.iter().map(|r| r.region.as_str()).collect();
        assert_eq!(regions, vec!["IT", "FR", "FR"]);
    }

    #[test]
    fn test_from_raw_skips_unparseable() {
        let table = ObservationTable::from_raw(vec![
            ("2024-01", "1.0", "U2"),
            ("not a date", "2.0", "U2"),
            ("2024-02", "", "U2"),
            ("2024-03", "3.0", "U2"),
        ]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.regions(), BTreeSet::from(["U2"]));
    }

    #[test]
    fn test_concat_and_regions() {
        let a = ObservationTable::from_raw(vec![("2024-02", "2", "FR")]);
        let b = ObservationTable::from_raw(vec![("2024-01", "1", "IT")]);
        let table = ObservationTable::concat([a, b]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0].region, "IT");
        assert_eq!(table.for_region("FR").count(), 1);
    }

    #[test]
    fn test_deserialize_reapplies_invariants() {
        let json = r#"[
            {"time": "2024-02-01", "value": 2.0, "region": "IT"},
            {"time": "2024-01-01", "value": 1.0, "region": " "}
        ]"#;
        let table: ObservationTable = serde_json::from_str(json).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].region, "IT");
    }
}
