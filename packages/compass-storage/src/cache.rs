use std::{sync::Arc, time::Duration};

use redis::{FromRedisValue, aio::MultiplexedConnection};
use tokio::sync::Mutex;

use crate::{Error, Result, index::BoxFuture};

const SCAN_BATCH: usize = 200;

/// A string key/value cache with per-entry TTL.
pub trait CacheStore
where
	Self: Send + Sync,
{
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>>;

	fn set<'a>(&'a self, key: &'a str, value: &'a str, ttl_secs: u64) -> BoxFuture<'a, Result<()>>;

	fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>>;

	/// Deletes every key matching the glob `pattern` and returns how many were removed.
	fn scan_delete<'a>(&'a self, pattern: &'a str) -> BoxFuture<'a, Result<u64>>;
}

/// Redis-backed [`CacheStore`] over one lazily opened multiplexed connection.
///
/// A failed command drops the connection and is retried once on a fresh one. Every round trip,
/// including each SCAN page, is bounded by `command_timeout`.
pub struct RedisCache {
	client: redis::Client,
	connection: Arc<Mutex<Option<MultiplexedConnection>>>,
	command_timeout: Duration,
}
impl RedisCache {
	/// Does not connect; the first command does.
	pub fn new(url: &str, command_timeout: Duration) -> Result<Self> {
		let client = redis::Client::open(url)?;

		Ok(Self { client, connection: Arc::new(Mutex::new(None)), command_timeout })
	}

	async fn connection(&self) -> Result<MultiplexedConnection> {
		let mut guard = self.connection.lock().await;

		if let Some(conn) = guard.as_ref() {
			return Ok(conn.clone());
		}

		let conn = tokio::time::timeout(
			self.command_timeout,
			self.client.get_multiplexed_async_connection(),
		)
		.await
		.map_err(|_| Error::Unavailable("redis connect timed out".to_string()))??;

		*guard = Some(conn.clone());

		tracing::debug!("Redis cache connected.");

		Ok(conn)
	}

	async fn run_command<T, F>(&self, operation: &'static str, build: F) -> Result<T>
	where
		T: FromRedisValue + Send,
		F: Fn() -> redis::Cmd,
	{
		let mut conn = self.connection().await?;

		match self.query(operation, &mut conn, build()).await {
			Ok(value) => Ok(value),
			Err(err) => {
				tracing::debug!(operation, error = %err, "Redis command failed; reconnecting.");

				*self.connection.lock().await = None;

				let mut conn = self.connection().await?;

				self.query(operation, &mut conn, build()).await
			},
		}
	}

	async fn query<T>(
		&self,
		operation: &'static str,
		conn: &mut MultiplexedConnection,
		cmd: redis::Cmd,
	) -> Result<T>
	where
		T: FromRedisValue + Send,
	{
		let reply: redis::RedisResult<T> =
			tokio::time::timeout(self.command_timeout, cmd.query_async(conn))
				.await
				.map_err(|_| Error::Unavailable(format!("redis {operation} timed out")))?;

		Ok(reply?)
	}

	async fn scan_delete_inner(&self, pattern: &str) -> Result<u64> {
		let mut cursor = 0_u64;
		let mut removed = 0_u64;

		loop {
			let (next, keys): (u64, Vec<String>) = self
				.run_command("SCAN", || {
					let mut cmd = redis::cmd("SCAN");

					cmd.arg(cursor).arg("MATCH").arg(pattern).arg("COUNT").arg(SCAN_BATCH);

					cmd
				})
				.await?;

			if !keys.is_empty() {
				let deleted: u64 = self
					.run_command("DEL", || {
						let mut cmd = redis::cmd("DEL");

						cmd.arg(&keys);

						cmd
					})
					.await?;

				removed += deleted;
			}
			if next == 0 {
				break;
			}

			cursor = next;
		}

		Ok(removed)
	}
}

impl CacheStore for RedisCache {
	fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
		Box::pin(async move {
			self.run_command("GET", || {
				let mut cmd = redis::cmd("GET");

				cmd.arg(key);

				cmd
			})
			.await
		})
	}

	fn set<'a>(&'a self, key: &'a str, value: &'a str, ttl_secs: u64) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.run_command::<(), _>("SETEX", || {
				let mut cmd = redis::cmd("SETEX");

				cmd.arg(key).arg(ttl_secs).arg(value);

				cmd
			})
			.await
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.run_command::<(), _>("DEL", || {
				let mut cmd = redis::cmd("DEL");

				cmd.arg(key);

				cmd
			})
			.await
		})
	}

	fn scan_delete<'a>(&'a self, pattern: &'a str) -> BoxFuture<'a, Result<u64>> {
		Box::pin(self.scan_delete_inner(pattern))
	}
}
