//! Adapter trait for the ephemeral store: string values with per-key TTL
//! plus one sorted set scored by milliseconds. The production
//! implementation lives in `store-adapter-redis`; a process-local
//! implementation is provided here for tests and single-node setups.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::sync::Mutex;
use tokio::time::Instant;

use crate::lock;
use crate::prelude::*;

/// TTL sentinel for a missing key, matching the backend convention.
pub const TTL_NO_KEY: i64 = -2;
/// TTL sentinel for a key without expiry.
pub const TTL_NO_EXPIRY: i64 = -1;

#[async_trait]
pub trait StoreAdapter: Send + Sync + Debug {
	/// Write every entry with the same TTL in one pipelined batch, so the
	/// expiry windows of keys written together stay aligned.
	async fn put_values(&self, entries: &[(String, String)], ttl_seconds: u64) -> ClResult<()>;

	/// Multi-key read; one `None` per missing/expired key, in input order.
	async fn get_values(&self, keys: &[String]) -> ClResult<Vec<Option<String>>>;

	/// Delete every listed key. Missing keys are ignored.
	async fn delete_values(&self, keys: &[String]) -> ClResult<()>;

	/// Remaining TTL in seconds; `TTL_NO_KEY` when absent, `TTL_NO_EXPIRY`
	/// when the key has no expiry.
	async fn ttl(&self, key: &str) -> ClResult<i64>;

	/// Insert or overwrite a member's score.
	async fn zset_put(&self, set: &str, member: &str, score: i64) -> ClResult<()>;

	/// All members with `min <= score <= max`, ascending by score.
	async fn zset_range_by_score(&self, set: &str, min: i64, max: i64)
	-> ClResult<Vec<Box<str>>>;

	async fn zset_remove(&self, set: &str, member: &str) -> ClResult<()>;

	async fn zset_score(&self, set: &str, member: &str) -> ClResult<Option<i64>>;
}

// MemoryStoreAdapter
//********************

#[derive(Debug)]
struct MemoryEntry {
	value: String,
	expires_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct MemoryState {
	values: HashMap<String, MemoryEntry>,
	zsets: HashMap<String, BTreeMap<Box<str>, i64>>,
}

/// In-process ephemeral store. Expiry is driven by the tokio clock, which
/// test code may pause and advance.
#[derive(Debug, Default)]
pub struct MemoryStoreAdapter {
	state: Mutex<MemoryState>,
}

impl MemoryStoreAdapter {
	pub fn new() -> Self {
		Self::default()
	}

	fn live<'a>(entry: &'a MemoryEntry, now: Instant) -> Option<&'a str> {
		match entry.expires_at {
			Some(deadline) if deadline <= now => None,
			_ => Some(&entry.value),
		}
	}
}

#[async_trait]
impl StoreAdapter for MemoryStoreAdapter {
	async fn put_values(&self, entries: &[(String, String)], ttl_seconds: u64) -> ClResult<()> {
		let deadline = Instant::now() + std::time::Duration::from_secs(ttl_seconds);
		let mut state = lock!(self.state, "memory store")?;
		for (key, value) in entries {
			state.values.insert(
				key.clone(),
				MemoryEntry { value: value.clone(), expires_at: Some(deadline) },
			);
		}
		Ok(())
	}

	async fn get_values(&self, keys: &[String]) -> ClResult<Vec<Option<String>>> {
		let now = Instant::now();
		let state = lock!(self.state, "memory store")?;
		Ok(keys
			.iter()
			.map(|key| {
				state.values.get(key).and_then(|e| Self::live(e, now)).map(str::to_owned)
			})
			.collect())
	}

	async fn delete_values(&self, keys: &[String]) -> ClResult<()> {
		let mut state = lock!(self.state, "memory store")?;
		for key in keys {
			state.values.remove(key);
		}
		Ok(())
	}

	async fn ttl(&self, key: &str) -> ClResult<i64> {
		let now = Instant::now();
		let state = lock!(self.state, "memory store")?;
		let Some(entry) = state.values.get(key) else {
			return Ok(TTL_NO_KEY);
		};
		match entry.expires_at {
			None => Ok(TTL_NO_EXPIRY),
			Some(deadline) if deadline <= now => Ok(TTL_NO_KEY),
			Some(deadline) => {
				let remaining = deadline.duration_since(now);
				// Round up, matching how the backend reports partial seconds
				Ok(remaining.as_secs_f64().ceil() as i64)
			}
		}
	}

	async fn zset_put(&self, set: &str, member: &str, score: i64) -> ClResult<()> {
		let mut state = lock!(self.state, "memory store")?;
		state.zsets.entry(set.into()).or_default().insert(member.into(), score);
		Ok(())
	}

	async fn zset_range_by_score(
		&self,
		set: &str,
		min: i64,
		max: i64,
	) -> ClResult<Vec<Box<str>>> {
		let state = lock!(self.state, "memory store")?;
		let Some(zset) = state.zsets.get(set) else {
			return Ok(Vec::new());
		};
		let mut members: Vec<(&Box<str>, i64)> =
			zset.iter().filter(|(_, s)| (min..=max).contains(*s)).map(|(m, s)| (m, *s)).collect();
		members.sort_by_key(|(_, s)| *s);
		Ok(members.into_iter().map(|(m, _)| m.clone()).collect())
	}

	async fn zset_remove(&self, set: &str, member: &str) -> ClResult<()> {
		let mut state = lock!(self.state, "memory store")?;
		if let Some(zset) = state.zsets.get_mut(set) {
			zset.remove(member);
		}
		Ok(())
	}

	async fn zset_score(&self, set: &str, member: &str) -> ClResult<Option<i64>> {
		let state = lock!(self.state, "memory store")?;
		Ok(state.zsets.get(set).and_then(|z| z.get(member).copied()))
	}
}


// vim: ts=4
