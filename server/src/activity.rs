//! Activity tracker. Thin facade over the ephemeral store's sorted set,
//! scored by millisecond timestamps and keyed by user id.

use std::sync::Arc;

use crate::prelude::*;
use crate::store_adapter::StoreAdapter;

/// Sorted set holding the last registration activity per user.
pub const ACTIVITY_SET: &str = "domains:activity";

const MILLIS_PER_DAY: i64 = 86_400_000;

#[derive(Debug, Clone)]
pub struct ActivityTracker {
	store: Arc<dyn StoreAdapter>,
}

impl ActivityTracker {
	pub fn new(store: Arc<dyn StoreAdapter>) -> Self {
		Self { store }
	}

	/// Overwrite the user's activity score with the current time.
	pub async fn update(&self, user_id: &str) -> ClResult<()> {
		self.store.zset_put(ACTIVITY_SET, user_id, Timestamp::now_millis()).await
	}

	/// All users whose last activity is at least `days` days ago.
	pub async fn get_inactive_since(&self, days: u32) -> ClResult<Vec<Box<str>>> {
		let cutoff = Timestamp::now_millis() - i64::from(days) * MILLIS_PER_DAY;
		self.store.zset_range_by_score(ACTIVITY_SET, 0, cutoff).await
	}

	/// All users active within the last `days` days.
	pub async fn get_active_since(&self, days: u32) -> ClResult<Vec<Box<str>>> {
		let cutoff = Timestamp::now_millis() - i64::from(days) * MILLIS_PER_DAY;
		self.store.zset_range_by_score(ACTIVITY_SET, cutoff + 1, i64::MAX).await
	}

	pub async fn remove(&self, user_id: &str) -> ClResult<()> {
		self.store.zset_remove(ACTIVITY_SET, user_id).await
	}

	pub async fn get_timestamp(&self, user_id: &str) -> ClResult<Option<i64>> {
		self.store.zset_score(ACTIVITY_SET, user_id).await
	}
}


// vim: ts=4
