//! Redis-backed ephemeral store adapter. Leases are plain SETEX keys,
//! activity lives in one sorted set; multi-key writes go through a
//! pipeline so expiry windows stay aligned.

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use std::time::Duration;

use nsl_router::prelude::*;
use nsl_router::store_adapter::StoreAdapter;

/// Bounds every store call so a dead backend cannot starve handlers.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

fn inspect(err: &redis::RedisError) {
	warn!("store: {}", err);
}

#[derive(Clone)]
pub struct StoreAdapterRedis {
	manager: ConnectionManager,
}

impl std::fmt::Debug for StoreAdapterRedis {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StoreAdapterRedis").finish_non_exhaustive()
	}
}

impl StoreAdapterRedis {
	/// Connect to the store at `url` (e.g. `redis://127.0.0.1:6379`).
	/// The connection manager reconnects on its own.
	pub async fn new(url: &str) -> ClResult<Self> {
		let client = redis::Client::open(url).map_err(|e| {
			inspect(&e);
			Error::ConfigError(format!("invalid store url '{}'", url))
		})?;
		let config = ConnectionManagerConfig::new().set_response_timeout(RESPONSE_TIMEOUT);
		let manager =
			client.get_connection_manager_with_config(config).await.map_err(|e| {
				inspect(&e);
				Error::ServiceUnavailable("ephemeral store unreachable".into())
			})?;
		Ok(Self { manager })
	}
}

#[async_trait]
impl StoreAdapter for StoreAdapterRedis {
	async fn put_values(&self, entries: &[(String, String)], ttl_seconds: u64) -> ClResult<()> {
		if entries.is_empty() {
			return Ok(());
		}
		let mut conn = self.manager.clone();
		let mut pipe = redis::pipe();
		for (key, value) in entries {
			pipe.cmd("SETEX").arg(key).arg(ttl_seconds).arg(value).ignore();
		}
		pipe.query_async::<()>(&mut conn).await.map_err(|e| {
			inspect(&e);
			Error::DbError
		})?;
		Ok(())
	}

	async fn get_values(&self, keys: &[String]) -> ClResult<Vec<Option<String>>> {
		if keys.is_empty() {
			return Ok(Vec::new());
		}
		let mut conn = self.manager.clone();
		let mut cmd = redis::cmd("MGET");
		for key in keys {
			cmd.arg(key);
		}
		cmd.query_async(&mut conn).await.map_err(|e| {
			inspect(&e);
			Error::DbError
		})
	}

	async fn delete_values(&self, keys: &[String]) -> ClResult<()> {
		if keys.is_empty() {
			return Ok(());
		}
		let mut conn = self.manager.clone();
		let mut cmd = redis::cmd("DEL");
		for key in keys {
			cmd.arg(key);
		}
		cmd.query_async::<()>(&mut conn).await.map_err(|e| {
			inspect(&e);
			Error::DbError
		})?;
		Ok(())
	}

	async fn ttl(&self, key: &str) -> ClResult<i64> {
		let mut conn = self.manager.clone();
		redis::cmd("TTL").arg(key).query_async(&mut conn).await.map_err(|e| {
			inspect(&e);
			Error::DbError
		})
	}

	async fn zset_put(&self, set: &str, member: &str, score: i64) -> ClResult<()> {
		let mut conn = self.manager.clone();
		redis::cmd("ZADD")
			.arg(set)
			.arg(score)
			.arg(member)
			.query_async::<()>(&mut conn)
			.await
			.map_err(|e| {
				inspect(&e);
				Error::DbError
			})?;
		Ok(())
	}

	async fn zset_range_by_score(
		&self,
		set: &str,
		min: i64,
		max: i64,
	) -> ClResult<Vec<Box<str>>> {
		let mut conn = self.manager.clone();
		let members: Vec<String> = redis::cmd("ZRANGEBYSCORE")
			.arg(set)
			.arg(min)
			.arg(max)
			.query_async(&mut conn)
			.await
			.map_err(|e| {
				inspect(&e);
				Error::DbError
			})?;
		Ok(members.into_iter().map(Into::into).collect())
	}

	async fn zset_remove(&self, set: &str, member: &str) -> ClResult<()> {
		let mut conn = self.manager.clone();
		redis::cmd("ZREM")
			.arg(set)
			.arg(member)
			.query_async::<()>(&mut conn)
			.await
			.map_err(|e| {
				inspect(&e);
				Error::DbError
			})?;
		Ok(())
	}

	async fn zset_score(&self, set: &str, member: &str) -> ClResult<Option<i64>> {
		let mut conn = self.manager.clone();
		redis::cmd("ZSCORE").arg(set).arg(member).query_async(&mut conn).await.map_err(|e| {
			inspect(&e);
			Error::DbError
		})
	}
}

// vim: ts=4
