//! Provider fetchers
//!
//! Each fetcher turns a [`QueryPlan`] into an [`ObservationTable`]. Ordinary
//! upstream trouble (bad status, timeouts, malformed payloads) is logged and
//! yields an empty table; only a plan for the wrong provider is an error.

pub mod ecb;
pub mod eurostat;
pub mod http;

pub use ecb::EcbFetcher;
pub use eurostat::EurostatFetcher;
pub use http::{HttpResponse, HttpTransport, ReqwestTransport};

use crate::catalog::Provider;
use crate::config::DataConfig;
use crate::error::Result;
use crate::plan::QueryPlan;
use crate::table::ObservationTable;
use async_trait::async_trait;
use std::sync::Arc;

/// Turns plans into normalized tables
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the data selected by `plan`
    async fn fetch(&self, plan: &QueryPlan) -> Result<ObservationTable>;
}

/// Dispatches plans to the fetcher of their provider
pub struct ProviderFetcher {
    ecb: EcbFetcher,
    eurostat: EurostatFetcher,
}

impl ProviderFetcher {
    /// Fetchers for both providers sharing one transport
    pub fn new(config: &DataConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            ecb: EcbFetcher::new(config.ecb_base_url.clone(), Arc::clone(&transport)),
            eurostat: EurostatFetcher::new(config.eurostat_base_url.clone(), transport),
        }
    }

    /// Fetchers using a rate-limited reqwest session
    pub fn from_config(config: &DataConfig) -> Result<Self> {
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(config)?);
        Ok(Self::new(config, transport))
    }
}

#[async_trait]
impl Fetcher for ProviderFetcher {
    async fn fetch(&self, plan: &QueryPlan) -> Result<ObservationTable> {
        match plan.provider() {
            Provider::Ecb => self.ecb.fetch(plan).await,
            Provider::Eurostat => self.eurostat.fetch(plan).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::http::testing::{FakeTransport, ok};
    use super::*;
    use crate::catalog::Frequency;
    use crate::plan::{DataTarget, QueryParams};
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_dispatch_by_provider() {
        let transport = Arc::new(FakeTransport::new(|url, _| {
            if url.contains("eurostat") {
                ok(r#"{"id":["geo","time"],"size":[1,1],
                    "dimension":{"geo":{"category":{"index":{"EA20":0}}},
                                 "time":{"category":{"index":{"2024-01":0}}}},
                    "value":{"0":6.4}}"#)
            } else {
                ok("KEY,REF_AREA,TIME_PERIOD,OBS_VALUE\nICP.M.U2,U2,2024-01,2.8\n")
            }
        }));
        let config = DataConfig::builder()
            .ecb_base_url("http://ecb.test/service")
            .eurostat_base_url("http://eurostat.test/data")
            .build()
            .unwrap();
        let fetcher = ProviderFetcher::new(&config, transport.clone());

        let table = fetcher.fetch(&QueryPlan::default_plan()).await.unwrap();
        assert_eq!(table.rows()[0].value, 2.8);

        let plan = QueryPlan::new(
            DataTarget::Eurostat {
                dataset: "une_rt_m".to_string(),
                filters: BTreeMap::new(),
                geo: vec!["U2".to_string()],
            },
            QueryParams::default(),
            "Unemployment",
            Frequency::M,
        );
        let table = fetcher.fetch(&plan).await.unwrap();
        assert_eq!(table.rows()[0].region, "EA20");
    }
}
