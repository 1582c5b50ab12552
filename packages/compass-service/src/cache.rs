//! Read-through cache in front of listing and search results.
//!
//! The cache is an accelerator only. Every cache failure or timeout is logged and absorbed, and
//! the caller falls through to the stores.

use std::{future::Future, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use compass_storage::{cache::CacheStore, index::BoxFuture};

use crate::Result;

/// Where a response's payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
	Cache,
	Database,
}

#[derive(Clone)]
pub struct CacheFacade {
	store: Option<Arc<dyn CacheStore>>,
	prefix: String,
	ttl_secs: u64,
	timeout: Duration,
	invalidate_timeout: Duration,
}
impl CacheFacade {
	/// `store` is ignored when the cache is disabled in `cfg`.
	pub fn new(store: Option<Arc<dyn CacheStore>>, cfg: &compass_config::Cache) -> Self {
		Self {
			store: store.filter(|_| cfg.enabled),
			prefix: cfg.key_prefix.clone(),
			ttl_secs: cfg.ttl_secs,
			timeout: Duration::from_millis(cfg.timeout_ms),
			invalidate_timeout: Duration::from_millis(cfg.invalidate_timeout_ms),
		}
	}

	pub fn is_enabled(&self) -> bool {
		self.store.is_some()
	}

	pub fn list_key(&self) -> String {
		format!("{}:companies:all", self.prefix)
	}

	/// `digest` distinguishes requests that share a query but not their parameters.
	pub fn search_key(&self, query: &str, digest: Option<&str>) -> String {
		let query = normalize_query(query);

		match digest {
			Some(digest) => format!("{}:search:{query}:{digest}", self.prefix),
			None => format!("{}:search:{query}", self.prefix),
		}
	}

	pub fn search_pattern(&self) -> String {
		format!("{}:search:*", self.prefix)
	}

	/// Returns the cached value, or `None` on a miss, an undecodable entry, or any cache failure.
	pub async fn lookup<T>(&self, key: &str) -> Option<T>
	where
		T: DeserializeOwned,
	{
		let store = self.store.as_ref()?;
		let raw = self.bounded("get", key, self.timeout, store.get(key)).await??;

		match serde_json::from_str(&raw) {
			Ok(value) => Some(value),
			Err(err) => {
				tracing::warn!(key, error = %err, "Discarding undecodable cache entry.");

				None
			},
		}
	}

	pub async fn put<T>(&self, key: &str, value: &T)
	where
		T: Serialize,
	{
		let Some(store) = self.store.as_ref() else {
			return;
		};
		let raw = match serde_json::to_string(value) {
			Ok(raw) => raw,
			Err(err) => {
				tracing::warn!(key, error = %err, "Failed to encode cache entry.");

				return;
			},
		};

		self.bounded("set", key, self.timeout, store.set(key, &raw, self.ttl_secs)).await;
	}

	/// Serves `key` from the cache, or computes, stores, and returns it.
	///
	/// Errors from `compute` propagate and are never cached.
	pub async fn get_or_compute<T, F, Fut>(
		&self,
		key: &str,
		compute: F,
	) -> Result<(T, ResultSource)>
	where
		T: Serialize + DeserializeOwned,
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		if let Some(value) = self.lookup(key).await {
			tracing::debug!(key, "Cache hit.");

			return Ok((value, ResultSource::Cache));
		}

		let value = compute().await?;

		self.put(key, &value).await;

		Ok((value, ResultSource::Database))
	}

	pub async fn invalidate(&self, key: &str) {
		if let Some(store) = self.store.as_ref() {
			self.bounded("delete", key, self.timeout, store.delete(key)).await;
		}
	}

	/// Returns how many keys matching the glob `pattern` were removed.
	///
	/// The whole scan runs under `cache.invalidate_timeout_ms` rather than the per-call budget, so
	/// a large keyspace is cleared completely instead of being cut off after the first batches.
	pub async fn invalidate_pattern(&self, pattern: &str) -> u64 {
		let Some(store) = self.store.as_ref() else {
			return 0;
		};

		self.bounded("scan_delete", pattern, self.invalidate_timeout, store.scan_delete(pattern))
			.await
			.unwrap_or_default()
	}

	/// Drops the listing and every search result after a company is added or removed.
	pub async fn invalidate_mutations(&self) {
		self.invalidate(&self.list_key()).await;

		let removed = self.invalidate_pattern(&self.search_pattern()).await;

		tracing::debug!(removed, "Invalidated cached search results.");
	}

	async fn bounded<T>(
		&self,
		operation: &'static str,
		key: &str,
		timeout: Duration,
		fut: BoxFuture<'_, compass_storage::Result<T>>,
	) -> Option<T> {
		match tokio::time::timeout(timeout, fut).await {
			Ok(Ok(value)) => Some(value),
			Ok(Err(err)) => {
				tracing::warn!(
					operation,
					key,
					error = %err,
					"Cache call failed; continuing without cache."
				);

				None
			},
			Err(_) => {
				tracing::warn!(operation, key, "Cache call timed out; continuing without cache.");

				None
			},
		}
	}
}

/// Trims, lower-cases, and collapses whitespace so equivalent queries share a key.
pub fn normalize_query(query: &str) -> String {
	query.split_whitespace().map(str::to_lowercase).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
	use compass_testkit::MemoryCache;

	use super::*;

	fn cache_config(prefix: &str) -> compass_config::Cache {
		compass_config::Cache {
			enabled: true,
			url: "redis://127.0.0.1:6379".to_string(),
			key_prefix: prefix.to_string(),
			ttl_secs: 60,
			timeout_ms: 100,
			invalidate_timeout_ms: 1_000,
		}
	}

	fn facade(prefix: &str) -> CacheFacade {
		CacheFacade::new(None, &cache_config(prefix))
	}

	#[test]
	fn search_keys_share_normalized_queries() {
		let cache = facade("compass");

		assert_eq!(
			cache.search_key("  Tech Companies\nin  SF ", None),
			"compass:search:tech companies in sf"
		);
		assert_eq!(cache.search_key("tech", Some("abc")), "compass:search:tech:abc");
		assert_eq!(cache.list_key(), "compass:companies:all");
		assert_eq!(cache.search_pattern(), "compass:search:*");
	}

	#[test]
	fn result_source_serializes_lowercase() {
		assert_eq!(serde_json::to_string(&ResultSource::Cache).expect("Must encode."), "\"cache\"");
		assert_eq!(
			serde_json::to_string(&ResultSource::Database).expect("Must encode."),
			"\"database\""
		);
	}

	#[tokio::test]
	async fn put_lookup_invalidate_then_miss() {
		let store = Arc::new(MemoryCache::new());
		let cache = CacheFacade::new(Some(store.clone()), &cache_config("compass"));
		let key = cache.search_key("fintech", None);

		cache.put(&key, &vec![1_i64, 2, 3]).await;

		assert_eq!(cache.lookup::<Vec<i64>>(&key).await, Some(vec![1, 2, 3]));

		cache.invalidate(&key).await;

		assert_eq!(cache.lookup::<Vec<i64>>(&key).await, None);
		assert!(!store.contains(&key));
		assert_eq!(store.gets(), 2);
	}

	#[tokio::test]
	async fn slow_pattern_scans_still_clear_every_key() {
		let store = Arc::new(MemoryCache::new());
		let cache = CacheFacade::new(Some(store.clone()), &cache_config("compass"));

		for query in ["fintech", "robotics", "retail"] {
			cache.put(&cache.search_key(query, None), &query).await;
		}

		// Slower than `timeout_ms` but inside `invalidate_timeout_ms`.
		store.set_scan_latency(Duration::from_millis(300));

		assert_eq!(cache.invalidate_pattern(&cache.search_pattern()).await, 3);
		assert!(store.keys().is_empty());
	}

	#[tokio::test]
	async fn disabled_cache_never_touches_the_store() {
		let store = Arc::new(MemoryCache::new());
		let mut cfg = cache_config("compass");

		cfg.enabled = false;

		let cache = CacheFacade::new(Some(store.clone()), &cfg);

		cache.put("compass:companies:all", &1_u8).await;

		assert!(!cache.is_enabled());
		assert_eq!(cache.lookup::<u8>("compass:companies:all").await, None);
		assert_eq!((store.gets(), store.sets()), (0, 0));
	}
}
