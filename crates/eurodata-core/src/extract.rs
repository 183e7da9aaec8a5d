//! Country and time-window extraction from free text

use chrono::{Duration, Local, NaiveDate};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// ECB code of the euro area aggregate, used when no region is named
pub const DEFAULT_REGION: &str = "U2";

/// Lower-case region names and their codes (ECB conventions)
pub const COUNTRY_CODES: &[(&str, &str)] = &[
    ("italy", "IT"),
    ("france", "FR"),
    ("germany", "DE"),
    ("spain", "ES"),
    ("belgium", "BE"),
    ("netherlands", "NL"),
    ("austria", "AT"),
    ("portugal", "PT"),
    ("greece", "GR"),
    ("finland", "FI"),
    ("ireland", "IE"),
    ("luxembourg", "LU"),
    ("poland", "PL"),
    ("sweden", "SE"),
    ("denmark", "DK"),
    ("hungary", "HU"),
    ("czech", "CZ"),
    ("romania", "RO"),
    ("bulgaria", "BG"),
    ("croatia", "HR"),
    ("slovakia", "SK"),
    ("slovenia", "SI"),
    ("euro area", "U2"),
    ("european union", "EU27_2020"),
];

/// Time window detected in a question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodFilter {
    /// First period to request, `YYYY-MM`
    pub start_period: String,
}

static SINCE_YEAR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"since\s*(\d{4})").ok());
static LAST_N_YEARS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"last\s+(\d+)\s*years?").ok());
static LAST_N_MONTHS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"last\s+(\d+)\s*months?").ok());

/// Region codes named in `text`, or the euro area when none is
///
/// Matching is by substring on the lower-cased text, so multi-word names such
/// as "euro area" work and a name embedded in a longer token still counts.
pub fn detect_countries(text: &str) -> BTreeSet<String> {
    let lower = text.to_lowercase();
    let found: BTreeSet<String> = COUNTRY_CODES
        .iter()
        .filter(|(name, _)| lower.contains(name))
        .map(|(_, code)| (*code).to_string())
        .collect();

    if found.is_empty() {
        BTreeSet::from([DEFAULT_REGION.to_string()])
    } else {
        found
    }
}

/// Region names (not codes) named in `text`; empty when none is
pub fn detect_country_names(text: &str) -> BTreeSet<String> {
    let lower = text.to_lowercase();
    COUNTRY_CODES
        .iter()
        .filter(|(name, _)| lower.contains(name))
        .map(|(name, _)| (*name).to_string())
        .collect()
}

/// Start of the requested window, relative to today
pub fn detect_period(text: &str) -> PeriodFilter {
    detect_period_on(text, Local::now().date_naive())
}

/// Start of the requested window, relative to `today`
///
/// First match wins: "since YYYY", then "last N years" (N x 365 days), then
/// "last N months" (N x 30 days), else five years back. Windows reaching
/// before the year 1000 start there.
pub fn detect_period_on(text: &str, today: NaiveDate) -> PeriodFilter {
    let lower = text.to_lowercase();

    if let Some(year) = capture_number(&SINCE_YEAR, &lower) {
        return PeriodFilter {
            start_period: format!("{year:04}-01"),
        };
    }

    let days_back = capture_number(&LAST_N_YEARS, &lower)
        .map(|n| n.saturating_mul(365))
        .or_else(|| capture_number(&LAST_N_MONTHS, &lower).map(|n| n.saturating_mul(30)))
        .unwrap_or(5 * 365);

    PeriodFilter {
        start_period: month_of(days_before(today, days_back)),
    }
}

fn capture_number(pattern: &LazyLock<Option<Regex>>, text: &str) -> Option<i64> {
    pattern
        .as_ref()?
        .captures(text)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

/// Earliest start a window may reach
fn earliest_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(1000, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn days_before(today: NaiveDate, days: i64) -> NaiveDate {
    Duration::try_days(days)
        .and_then(|d| today.checked_sub_signed(d))
        .map_or_else(earliest_start, |date| date.max(earliest_start()))
}

fn month_of(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}
