//! Static indicator catalog and synonym table
//!
//! Each entry names the provider, the dataset, how to select a series inside
//! it and a display label. ECB entries carry a literal series key that may
//! contain a `{region}` or `{pair}` slot; Eurostat entries carry dimension
//! filters and receive their region through `geo`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Statistical data provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    /// European Central Bank Data Portal
    #[serde(rename = "ECB")]
    Ecb,
    /// Eurostat dissemination API
    Eurostat,
}

impl Provider {
    /// Display name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ecb => "ECB",
            Self::Eurostat => "Eurostat",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observation frequency (advisory)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    /// Daily
    D,
    /// Monthly
    M,
    /// Quarterly
    Q,
    /// Annual
    A,
}

/// How a series is selected inside its dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimensions {
    /// ECB dot-separated series key, possibly with `{region}` / `{pair}` slots
    SeriesKey(&'static str),
    /// Eurostat dimension filters, applied alongside `geo`
    Filters(&'static [(&'static str, &'static str)]),
}

/// One catalog indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Canonical key, also the classifier vocabulary
    pub key: &'static str,
    /// Serving provider
    pub provider: Provider,
    /// Dataflow (ECB) or dataset code (Eurostat)
    pub dataset: &'static str,
    /// Series selection
    pub dimensions: Dimensions,
    /// Native frequency
    pub freq: Frequency,
    /// Display label, may contain `{pair}`
    pub label: &'static str,
}

impl CatalogEntry {
    /// Whether the series key has a region slot
    pub fn has_region_slot(&self) -> bool {
        matches!(self.dimensions, Dimensions::SeriesKey(key) if key.contains(REGION_SLOT))
    }
}

/// Region placeholder in ECB series keys
pub const REGION_SLOT: &str = "{region}";
/// Currency placeholder in FX keys and labels
pub const PAIR_SLOT: &str = "{pair}";

/// Key of the FX entry
pub const EXCHANGE_RATE: &str = "exchange_rate";
/// Key of the fallback entry
pub const INFLATION: &str = "inflation";

/// The indicator table
///
/// Order matters for synonym matching: more specific entries come before the
/// general ones they overlap with (core inflation and house prices before
/// inflation, industrial production before GDP).
pub const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        key: "core_inflation",
        provider: Provider::Ecb,
        dataset: "ICP",
        dimensions: Dimensions::SeriesKey("M.{region}.N.XEF000.4.ANR"),
        freq: Frequency::M,
        label: "Core inflation (HICP excl. energy and food)",
    },
    CatalogEntry {
        key: "house_prices",
        provider: Provider::Eurostat,
        dataset: "prc_hpi_q",
        dimensions: Dimensions::Filters(&[("purchase", "TOTAL"), ("unit", "RCH_A")]),
        freq: Frequency::Q,
        label: "House prices (annual rate of change, Eurostat)",
    },
    CatalogEntry {
        key: INFLATION,
        provider: Provider::Ecb,
        dataset: "ICP",
        dimensions: Dimensions::SeriesKey("M.{region}.N.000000.4.ANR"),
        freq: Frequency::M,
        label: "Inflation (HICP)",
    },
    CatalogEntry {
        key: "deposit_rate",
        provider: Provider::Ecb,
        dataset: "FM",
        dimensions: Dimensions::SeriesKey("D.U2.EUR.4F.KR.DFR.LEV"),
        freq: Frequency::D,
        label: "Deposit Facility Rate (DFR)",
    },
    CatalogEntry {
        key: "refinancing_rate",
        provider: Provider::Ecb,
        dataset: "FM",
        dimensions: Dimensions::SeriesKey("D.U2.EUR.4F.KR.MRR_FR.LEV"),
        freq: Frequency::D,
        label: "Main Refinancing Operations rate (MRO)",
    },
    CatalogEntry {
        key: "marginal_lending_rate",
        provider: Provider::Ecb,
        dataset: "FM",
        dimensions: Dimensions::SeriesKey("D.U2.EUR.4F.KR.MLFR.LEV"),
        freq: Frequency::D,
        label: "Marginal Lending Facility rate (MLF)",
    },
    CatalogEntry {
        key: EXCHANGE_RATE,
        provider: Provider::Ecb,
        dataset: "EXR",
        dimensions: Dimensions::SeriesKey("D.{pair}.EUR.SP00.A"),
        freq: Frequency::D,
        label: "EUR/{pair} Exchange Rate",
    },
    CatalogEntry {
        key: "money_supply",
        provider: Provider::Ecb,
        dataset: "BSI",
        dimensions: Dimensions::SeriesKey("M.U2.Y.V.M30.X.I.U2.2300.Z01.A"),
        freq: Frequency::M,
        label: "Broad money M3 (annual growth rate)",
    },
    CatalogEntry {
        key: "euribor",
        provider: Provider::Ecb,
        dataset: "FM",
        dimensions: Dimensions::SeriesKey("M.U2.EUR.RT.MM.EURIBOR3MD_.HSTA"),
        freq: Frequency::M,
        label: "3-month Euribor",
    },
    CatalogEntry {
        key: "bond_yield",
        provider: Provider::Ecb,
        dataset: "IRS",
        dimensions: Dimensions::SeriesKey("M.{region}.L.L40.CI.0000.EUR.N.Z"),
        freq: Frequency::M,
        label: "Long-term government bond yield (10Y)",
    },
    CatalogEntry {
        key: "industrial_production",
        provider: Provider::Eurostat,
        dataset: "sts_inpr_m",
        dimensions: Dimensions::Filters(&[
            ("nace_r2", "B-D"),
            ("s_adj", "SCA"),
            ("unit", "I21"),
        ]),
        freq: Frequency::M,
        label: "Industrial production index (2021=100, Eurostat)",
    },
    CatalogEntry {
        key: "gdp",
        provider: Provider::Eurostat,
        dataset: "namq_10_gdp",
        dimensions: Dimensions::Filters(&[
            ("unit", "CLV_PCH_PRE"),
            ("s_adj", "SCA"),
            ("na_item", "B1GQ"),
        ]),
        freq: Frequency::Q,
        label: "GDP growth (q/q, Eurostat)",
    },
    CatalogEntry {
        key: "youth_unemployment",
        provider: Provider::Eurostat,
        dataset: "une_rt_m",
        dimensions: Dimensions::Filters(&[
            ("sex", "T"),
            ("age", "Y_LT25"),
            ("unit", "PC_ACT"),
            ("s_adj", "SA"),
        ]),
        freq: Frequency::M,
        label: "Youth unemployment rate (under 25, Eurostat)",
    },
    CatalogEntry {
        key: "unemployment",
        provider: Provider::Eurostat,
        dataset: "une_rt_m",
        dimensions: Dimensions::Filters(&[
            ("sex", "T"),
            ("age", "TOTAL"),
            ("unit", "PC_ACT"),
            ("s_adj", "SA"),
        ]),
        freq: Frequency::M,
        label: "Unemployment rate (Eurostat)",
    },
    CatalogEntry {
        key: "retail_trade",
        provider: Provider::Eurostat,
        dataset: "sts_trtu_m",
        dimensions: Dimensions::Filters(&[
            ("indic_bt", "VOL_SLS"),
            ("nace_r2", "G47"),
            ("s_adj", "SCA"),
            ("unit", "I21"),
        ]),
        freq: Frequency::M,
        label: "Retail trade volume (2021=100, Eurostat)",
    },
    CatalogEntry {
        key: "government_debt",
        provider: Provider::Eurostat,
        dataset: "gov_10q_ggdebt",
        dimensions: Dimensions::Filters(&[
            ("unit", "PC_GDP"),
            ("sector", "S13"),
            ("na_item", "GD"),
        ]),
        freq: Frequency::Q,
        label: "Government debt (% of GDP, Eurostat)",
    },
];

/// Lower-case trigger phrases per catalog key, in catalog order
pub const SYNONYMS: &[(&str, &[&str])] = &[
    ("core_inflation", &["core inflation", "underlying inflation", "core hicp"]),
    ("house_prices", &["house price", "housing", "property price", "real estate"]),
    (
        INFLATION,
        &["inflation", "hicp", "consumer price", "cost of living", "price index"],
    ),
    ("deposit_rate", &["deposit", "dfr", "policy rate", "interest rate"]),
    ("refinancing_rate", &["refinancing", "mro", "refi rate"]),
    ("marginal_lending_rate", &["marginal lending", "mlf"]),
    (EXCHANGE_RATE, &["exchange rate", "exchange", "currency", "fx"]),
    ("money_supply", &["money supply", "m3", "broad money"]),
    ("euribor", &["euribor", "interbank"]),
    ("bond_yield", &["bond yield", "government bond", "10-year", "10y", "yields"]),
    (
        "industrial_production",
        &["industrial production", "industrial output", "manufacturing", "industry"],
    ),
    ("gdp", &["gdp", "gross domestic product", "economic growth", "output growth"]),
    ("youth_unemployment", &["youth unemployment", "young people", "under 25"]),
    ("unemployment", &["unemployment", "jobless", "labour market", "labor market"]),
    ("retail_trade", &["retail", "shop sales", "consumer spending"]),
    ("government_debt", &["government debt", "public debt", "debt"]),
];

/// Look up an entry by key
pub fn entry(key: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|e| e.key == key)
}

/// All catalog keys in table order
pub fn keys() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(|e| e.key)
}

/// Trigger phrases for a key
pub fn synonyms(key: &str) -> &'static [&'static str] {
    SYNONYMS
        .iter()
        .find(|(k, _)| *k == key)
        .map_or(&[], |(_, phrases)| *phrases)
}

/// Catalog entries whose synonyms occur in `text`, in table order
pub fn match_synonyms(text: &str) -> Vec<&'static CatalogEntry> {
    let lower = text.to_lowercase();
    SYNONYMS
        .iter()
        .filter(|(_, phrases)| phrases.iter().any(|p| lower.contains(p)))
        .filter_map(|(key, _)| entry(key))
        .collect()
}

/// Byte spans of every occurrence of `phrases` in `lower`
fn hit_spans(lower: &str, phrases: &[&str]) -> Vec<(usize, usize)> {
    phrases
        .iter()
        .copied()
        .flat_map(|p| lower.match_indices(p).map(|(start, m)| (start, start + m.len())))
        .collect()
}

/// Like [`match_synonyms`], but an entry whose every hit overlaps a hit of an
/// earlier entry is dropped ("youth unemployment" does not also count as
/// "unemployment", while "core inflation vs headline inflation" keeps both)
pub fn match_distinct(text: &str) -> Vec<&'static CatalogEntry> {
    let lower = text.to_lowercase();
    let mut accepted: Vec<(usize, usize)> = Vec::new();
    let mut entries = Vec::new();

    for (key, phrases) in SYNONYMS {
        let spans = hit_spans(&lower, phrases);
        if spans.is_empty() {
            continue;
        }
        let shadowed = spans.iter().all(|&(start, end)| {
            accepted
                .iter()
                .any(|&(prev_start, prev_end)| start < prev_end && prev_start < end)
        });
        if shadowed {
            continue;
        }
        if let Some(found) = entry(key) {
            accepted.extend(spans);
            entries.push(found);
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_entry_has_synonyms() {
        for entry in CATALOG {
            assert!(
                !synonyms(entry.key).is_empty(),
                "{} has no synonyms",
                entry.key
            );
        }
        assert_eq!(SYNONYMS.len(), CATALOG.len());
    }

    #[test]
    fn test_keys_are_unique() {
        let unique: HashSet<_> = keys().collect();
        assert_eq!(unique.len(), CATALOG.len());
    }

    #[test]
    fn test_synonyms_are_lowercase() {
        for (_, phrases) in SYNONYMS {
            for phrase in *phrases {
                assert_eq!(*phrase, phrase.to_lowercase());
            }
        }
    }

    #[test]
    fn test_dimension_shape_matches_provider() {
        for entry in CATALOG {
            match (entry.provider, entry.dimensions) {
                (Provider::Ecb, Dimensions::SeriesKey(_))
                | (Provider::Eurostat, Dimensions::Filters(_)) => {}
                _ => panic!("{} has dimensions of the wrong provider", entry.key),
            }
        }
    }

    #[test]
    fn test_specific_entries_match_first() {
        let matches = match_synonyms("Core inflation in Spain");
        assert_eq!(matches[0].key, "core_inflation");

        let matches = match_synonyms("youth unemployment italy");
        assert_eq!(matches[0].key, "youth_unemployment");
    }

    #[test]
    fn test_match_collects_all_hits() {
        let keys: Vec<_> = match_synonyms("compare inflation and unemployment")
            .iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec!["inflation", "unemployment"]);
    }

    #[test]
    fn test_distinct_drops_shadowed_entries() {
        let keys: Vec<_> = match_distinct("compare youth unemployment in Italy and France")
            .iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec!["youth_unemployment"]);

        let keys: Vec<_> = match_distinct("compare inflation and unemployment")
            .iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec!["inflation", "unemployment"]);
    }

    #[test]
    fn test_distinct_compares_positions() {
        let keys: Vec<_> = match_distinct("core inflation vs headline inflation")
            .iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec!["core_inflation", "inflation"]);

        let keys: Vec<_> = match_distinct("core inflation in Spain")
            .iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec!["core_inflation"]);
    }

    #[test]
    fn test_overlapping_phrases_resolve_to_specific_entry() {
        let keys: Vec<_> = match_distinct("house price index in Spain")
            .iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec!["house_prices"]);

        let keys: Vec<_> = match_distinct("industrial output growth in Germany")
            .iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec!["industrial_production"]);
    }

    #[test]
    fn test_region_slot() {
        assert!(entry(INFLATION).unwrap().has_region_slot());
        assert!(!entry("deposit_rate").unwrap().has_region_slot());
        assert!(!entry("gdp").unwrap().has_region_slot());
    }

    #[test]
    fn test_fx_entry_has_pair_slots() {
        let fx = entry(EXCHANGE_RATE).unwrap();
        assert!(fx.label.contains(PAIR_SLOT));
        assert_eq!(fx.dimensions, Dimensions::SeriesKey("D.{pair}.EUR.SP00.A"));
    }
}
