//! Scheduler subsystem. Runs recurring maintenance tasks on cron
//! schedules evaluated in the process's local timezone.

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use croner::Cron;
use std::fmt::Debug;
use std::str::FromStr;
use std::sync::Arc;

use crate::prelude::*;

/// Cron schedule wrapper using the croner crate.
/// Stores the expression string for diagnostics.
#[derive(Debug, Clone)]
pub struct CronSchedule {
	/// The original cron expression string
	expr: Box<str>,
	/// Parsed cron object
	cron: Cron,
}

impl CronSchedule {
	/// Parse a cron expression (5 fields: minute hour day month weekday)
	pub fn parse(expr: &str) -> ClResult<Self> {
		let cron = Cron::from_str(expr)
			.map_err(|e| Error::ValidationError(format!("invalid cron expression: {}", e)))?;
		Ok(Self { expr: expr.into(), cron })
	}

	/// Calculate the next execution time after the given timestamp,
	/// evaluated against local time.
	pub fn next_execution(&self, after: Timestamp) -> ClResult<Timestamp> {
		let dt: DateTime<Local> =
			Local.timestamp_opt(after.0, 0).single().unwrap_or_else(Local::now);

		self.cron
			.find_next_occurrence(&dt, false)
			.map(|next| Timestamp(next.timestamp()))
			.map_err(|e| {
				error!("Failed to find next cron occurrence for '{}': {}", self.expr, e);
				Error::Internal(format!("cron next_execution failed: {}", e))
			})
	}

	pub fn as_str(&self) -> &str {
		&self.expr
	}
}

impl PartialEq for CronSchedule {
	fn eq(&self, other: &Self) -> bool {
		self.expr == other.expr
	}
}

impl Eq for CronSchedule {}

#[async_trait]
pub trait Task<S>: Send + Sync + Debug {
	fn kind(&self) -> &'static str;
	async fn run(&self, state: &S) -> ClResult<()>;
}

/// Minimal recurring-task runner. Each registered task gets its own loop
/// that sleeps until the next cron occurrence and runs the task; a failed
/// run is logged and never stops the schedule.
pub struct Scheduler<S> {
	tasks: Vec<(CronSchedule, Arc<dyn Task<S>>)>,
}

impl<S: Clone + Send + Sync + 'static> Scheduler<S> {
	pub fn new() -> Self {
		Self { tasks: Vec::new() }
	}

	pub fn register(&mut self, schedule: CronSchedule, task: Arc<dyn Task<S>>) -> &mut Self {
		info!("Registering task {} with schedule '{}'", task.kind(), schedule.as_str());
		self.tasks.push((schedule, task));
		self
	}

	pub fn start(self, state: S) {
		for (schedule, task) in self.tasks {
			let state = state.clone();
			tokio::spawn(async move {
				loop {
					let next = match schedule.next_execution(Timestamp::now()) {
						Ok(next) => next,
						Err(e) => {
							error!(
								"Task {} can no longer be scheduled: {}",
								task.kind(),
								e
							);
							break;
						}
					};
					let wait = (next.0 - Timestamp::now().0).max(0) as u64;
					debug!("Task {} sleeping {}s until next run", task.kind(), wait);
					tokio::time::sleep(std::time::Duration::from_secs(wait)).await;

					if let Err(e) = task.run(&state).await {
						warn!("Task {} failed: {}", task.kind(), e);
					}
				}
			});
		}
	}
}

impl<S: Clone + Send + Sync + 'static> Default for Scheduler<S> {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_default_schedule() {
		let schedule = CronSchedule::parse("0 3 * * *").unwrap();
		assert_eq!(schedule.as_str(), "0 3 * * *");
	}

	#[test]
	fn test_parse_rejects_garbage() {
		assert!(CronSchedule::parse("not a cron line").is_err());
	}

	#[test]
	fn test_next_execution_advances() {
		let schedule = CronSchedule::parse("*/5 * * * *").unwrap();
		let now = Timestamp::now();
		let next = schedule.next_execution(now).unwrap();
		assert!(next > now);
		assert!(next.0 - now.0 <= 300);
	}
}

// vim: ts=4
