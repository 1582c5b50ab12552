use std::time::Duration;

use compass_storage::cache::{CacheStore, RedisCache};

fn live_cache() -> Option<(RedisCache, String)> {
	let Some(url) = compass_testkit::env_redis_url() else {
		eprintln!("Skipping Redis tests; set COMPASS_REDIS_URL to run them.");

		return None;
	};
	let cache =
		RedisCache::new(&url, Duration::from_secs(2)).expect("Failed to build Redis client.");

	Some((cache, compass_testkit::unique_key_prefix()))
}

#[tokio::test]
#[ignore = "Requires external Redis. Set COMPASS_REDIS_URL to run."]
async fn set_get_delete_round_trip() {
	let Some((cache, prefix)) = live_cache() else {
		return;
	};
	let key = format!("{prefix}:companies:all");

	assert_eq!(cache.get(&key).await.expect("Get failed."), None);

	cache.set(&key, r#"[{"id":1}]"#, 60).await.expect("Set failed.");

	assert_eq!(cache.get(&key).await.expect("Get failed."), Some(r#"[{"id":1}]"#.to_string()));

	cache.delete(&key).await.expect("Delete failed.");

	assert_eq!(cache.get(&key).await.expect("Get failed."), None);
}

#[tokio::test]
#[ignore = "Requires external Redis. Set COMPASS_REDIS_URL to run."]
async fn entries_expire_after_their_ttl() {
	let Some((cache, prefix)) = live_cache() else {
		return;
	};
	let key = format!("{prefix}:search:short lived");

	cache.set(&key, "1", 1).await.expect("Set failed.");
	tokio::time::sleep(Duration::from_millis(1_500)).await;

	assert_eq!(cache.get(&key).await.expect("Get failed."), None);
}

#[tokio::test]
#[ignore = "Requires external Redis. Set COMPASS_REDIS_URL to run."]
async fn pattern_delete_pages_through_every_cursor() {
	let Some((cache, prefix)) = live_cache() else {
		return;
	};
	let list_key = format!("{prefix}:companies:all");

	// More keys than one SCAN page holds.
	for idx in 0..450 {
		cache.set(&format!("{prefix}:search:query {idx}"), "[]", 60).await.expect("Set failed.");
	}

	cache.set(&list_key, "[]", 60).await.expect("Set failed.");

	let removed =
		cache.scan_delete(&format!("{prefix}:search:*")).await.expect("Scan delete failed.");

	assert_eq!(removed, 450);
	assert_eq!(cache.get(&format!("{prefix}:search:query 7")).await.expect("Get failed."), None);
	assert_eq!(cache.get(&list_key).await.expect("Get failed."), Some("[]".to_string()));

	cache.delete(&list_key).await.expect("Delete failed.");
}
