//! Cleanup controller. Releases subdomain labels whose owners have gone
//! silent past the configured threshold. Runs on the cron schedule and on
//! demand from the admin endpoint.

use async_trait::async_trait;
use axum::{
	Extension,
	extract::{Json, State},
	http::StatusCode,
};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::token::AuthUser;
use crate::domain::registry;
use crate::identity_adapter::IdentityAdapter;
use crate::prelude::*;
use crate::scheduler::Task;

const MILLIS_PER_DAY: i64 = 86_400_000;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
	pub released_count: usize,
	pub domains: Vec<Box<str>>,
}

/// One cleanup pass. Each user's pipeline is isolated: a failure is
/// logged and the remaining users are still processed. Re-running the
/// pass releases nothing new, so it is idempotent.
pub async fn run_cleanup(app: &App) -> ClResult<CleanupReport> {
	let threshold_days = app.opts.inactive_domain_days;
	let ids = app.activity.get_inactive_since(threshold_days).await?;
	debug!("Cleanup scanning {} inactive users", ids.len());

	let mut domains = Vec::new();
	for user_id in &ids {
		match release_user(app, user_id, threshold_days).await {
			Ok(Some(label)) => domains.push(label),
			Ok(None) => {}
			Err(e) => warn!("cleanup for {} failed: {}", user_id, e),
		}
	}

	if !domains.is_empty() {
		info!("Cleanup released {} domains", domains.len());
	}
	Ok(CleanupReport { released_count: domains.len(), domains })
}

/// Release one user's label. Returns the label when one was released.
async fn release_user(
	app: &App,
	user_id: &str,
	threshold_days: u32,
) -> ClResult<Option<Box<str>>> {
	let record = app.identity_adapter.read_identity(user_id).await?;
	let label = record.and_then(|r| r.domain_name).filter(|l| !l.is_empty());
	let Some(label) = label else {
		// Nothing to release, just drop the stale activity entry
		app.activity.remove(user_id).await?;
		return Ok(None);
	};

	let inactive_days = match app.activity.get_timestamp(user_id).await? {
		Some(last_ms) => {
			u64::try_from((Timestamp::now_millis() - last_ms) / MILLIS_PER_DAY).unwrap_or(0)
		}
		None => u64::from(threshold_days),
	};

	app.audit
		.append_best_effort(&format!(
			"RELEASED {} from {} (inactive {} days)",
			label, user_id, inactive_days
		))
		.await;
	registry::clear_domain_assignment(app, user_id).await?;
	app.activity.remove(user_id).await?;

	Ok(Some(label))
}

/// Recurring cleanup task for the scheduler.
#[derive(Debug)]
pub struct DomainCleanupTask;

impl DomainCleanupTask {
	pub fn new() -> Arc<Self> {
		Arc::new(Self)
	}
}

#[async_trait]
impl Task<App> for DomainCleanupTask {
	fn kind(&self) -> &'static str {
		"domain.cleanup"
	}

	async fn run(&self, app: &App) -> ClResult<()> {
		let report = run_cleanup(app).await?;
		info!("Scheduled cleanup released {} domains", report.released_count);
		Ok(())
	}
}

/// POST /admin/cleanup (token-authenticated) - run a pass now
#[axum::debug_handler]
pub async fn post_admin_cleanup(
	State(app): State<App>,
	Extension(AuthUser(admin)): Extension<AuthUser>,
) -> ClResult<(StatusCode, Json<CleanupReport>)> {
	info!("Manual cleanup requested by {}", admin);
	let report = run_cleanup(&app).await?;
	Ok((StatusCode::OK, Json(report)))
}

// vim: ts=4
