//! Disk-backed fetch cache
//!
//! Entries are JSON files named by a SHA-256 over the dataset identity and
//! the canonical (sorted) request parameters. Writes go to a temporary file
//! first and are renamed into place, so a reader sees either the old entry or
//! the new one. Any read problem is treated as a miss.

use crate::error::Result;
use crate::fetchers::Fetcher;
use crate::plan::QueryPlan;
use crate::table::ObservationTable;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Content-addressed table store
#[derive(Debug, Clone)]
pub struct FetchCache {
    dir: PathBuf,
}

impl FetchCache {
    /// Cache rooted at `dir` (created on first write)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Key for a dataset and its request parameters
    pub fn key(dataset: &str, params: &BTreeMap<String, String>) -> String {
        let params_json = serde_json::to_string(params).unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(dataset.as_bytes());
        hasher.update(b"|");
        hasher.update(params_json.as_bytes());

        format!("{:x}", hasher.finalize())
    }

    /// Key for a plan
    pub fn plan_key(plan: &QueryPlan) -> String {
        Self::key(&plan.target().dataset_id(), &plan.request_params())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Cached table, or `None` on a miss or unreadable entry
    pub async fn get(&self, key: &str) -> Option<ObservationTable> {
        let path = self.path_for(key);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!(path = %path.display(), error = %e, "Cache read failed");
                }
                return None;
            }
        };

        match serde_json::from_slice(&raw) {
            Ok(table) => Some(table),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Discarding corrupted cache entry");
                None
            }
        }
    }

    /// Store a table under `key`, replacing any previous entry
    pub async fn put(&self, key: &str, table: &ObservationTable) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let body = serde_json::to_vec(table)?;
        let tmp = self.dir.join(format!(".{key}.{}.tmp", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, body).await?;
        if let Err(e) = tokio::fs::rename(&tmp, self.path_for(key)).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::debug!(key, rows = table.len(), "Cached table");
        Ok(())
    }

    /// Remove every cache entry
    pub async fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                tokio::fs::remove_file(&path).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Fetcher wrapper that memoizes non-empty tables on disk
pub struct CachedFetcher<F> {
    inner: F,
    cache: FetchCache,
    read_enabled: bool,
}

impl<F: Fetcher> CachedFetcher<F> {
    /// Wrap `inner`; `read_enabled` controls whether [`Fetcher::fetch`] reads
    /// the cache before going upstream
    pub fn new(inner: F, cache: FetchCache, read_enabled: bool) -> Self {
        Self {
            inner,
            cache,
            read_enabled,
        }
    }

    /// Underlying cache
    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }

    /// Fetch, reading the cache first when `use_cache` is set
    ///
    /// Fresh non-empty results are always written back. Empty tables are not
    /// cached so a transient upstream failure is retried next time.
    pub async fn fetch_with(&self, plan: &QueryPlan, use_cache: bool) -> Result<ObservationTable> {
        let key = FetchCache::plan_key(plan);

        if use_cache {
            if let Some(table) = self.cache.get(&key).await {
                tracing::info!(indicator = plan.indicator(), rows = table.len(), "Loaded table from cache");
                return Ok(table);
            }
        }

        let table = self.inner.fetch(plan).await?;
        if !table.is_empty() {
            if let Err(e) = self.cache.put(&key, &table).await {
                tracing::warn!(error = %e, "Failed to cache table");
            }
        }
        Ok(table)
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for CachedFetcher<F> {
    async fn fetch(&self, plan: &QueryPlan) -> Result<ObservationTable> {
        self.fetch_with(plan, self.read_enabled).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetchers::EcbFetcher;
    use crate::fetchers::http::testing::{FakeTransport, ok};
    use std::sync::Arc;

    const CSV: &str = "REF_AREA,TIME_PERIOD,OBS_VALUE\nU2,2024-01,2.8\nU2,2024-02,2.6\n";

    fn cached_ecb(dir: &Path, transport: Arc<FakeTransport>) -> CachedFetcher<EcbFetcher> {
        CachedFetcher::new(
            EcbFetcher::new("http://ecb.test/service", transport),
            FetchCache::new(dir),
            true,
        )
    }

    #[test]
    fn test_key_is_order_independent() {
        let a = BTreeMap::from([
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "1".to_string()),
        ]);
        let mut b = BTreeMap::new();
        b.insert("a".to_string(), "1".to_string());
        b.insert("b".to_string(), "2".to_string());

        assert_eq!(FetchCache::key("ds", &a), FetchCache::key("ds", &b));
        assert_ne!(FetchCache::key("ds", &a), FetchCache::key("other", &a));
        assert_eq!(FetchCache::key("ds", &a).len(), 64);
    }

    #[tokio::test]
    async fn test_second_call_hits_cache() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::new(|_, _| ok(CSV)));
        let fetcher = cached_ecb(dir.path(), transport.clone());
        let plan = QueryPlan::default_plan();

        let first = fetcher.fetch(&plan).await.unwrap();
        let calls = transport.call_count();
        let second = fetcher.fetch(&plan).await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(transport.call_count(), calls);
    }

    #[tokio::test]
    async fn test_bypass_reads_upstream_but_refreshes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::new(|_, _| ok(CSV)));
        let fetcher = cached_ecb(dir.path(), transport.clone());
        let plan = QueryPlan::default_plan();

        fetcher.fetch_with(&plan, false).await.unwrap();
        let calls = transport.call_count();
        fetcher.fetch_with(&plan, false).await.unwrap();
        assert!(transport.call_count() > calls);

        let cached = fetcher.cache().get(&FetchCache::plan_key(&plan)).await;
        assert_eq!(cached.map(|t| t.len()), Some(2));
    }

    #[tokio::test]
    async fn test_empty_tables_are_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(FakeTransport::failing());
        let fetcher = cached_ecb(dir.path(), transport.clone());

        let table = fetcher.fetch(&QueryPlan::default_plan()).await.unwrap();
        assert!(table.is_empty());
        assert_eq!(fetcher.cache().clear().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_corrupted_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FetchCache::new(dir.path());
        std::fs::write(dir.path().join("abc.json"), b"{not json").unwrap();

        assert!(cache.get("abc").await.is_none());
        assert!(cache.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_and_clear_removes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FetchCache::new(dir.path().join("nested"));
        let table = ObservationTable::from_raw(vec![("2024-01", "1", "IT")]);

        cache.put("k", &table).await.unwrap();
        cache.put("k", &ObservationTable::concat([table.clone(), table.clone()])).await.unwrap();
        assert_eq!(cache.get("k").await.map(|t| t.len()), Some(2));

        assert_eq!(cache.clear().await.unwrap(), 1);
        assert!(cache.get("k").await.is_none());
    }
}
