//! Append-only audit log of domain assignment events, one human-readable
//! line per event.

use chrono::{SecondsFormat, Utc};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use crate::prelude::*;

#[derive(Debug, Clone)]
pub struct AuditLog {
	path: PathBuf,
}

impl AuditLog {
	pub fn new(path: PathBuf) -> Self {
		Self { path }
	}

	/// Append one event line, prefixed with an ISO-8601 UTC timestamp.
	/// The containing directory is created on first use.
	pub async fn append(&self, event: &str) -> ClResult<()> {
		if let Some(parent) = self.path.parent() {
			if !parent.as_os_str().is_empty() {
				tokio::fs::create_dir_all(parent).await?;
			}
		}
		let line = format!(
			"{} {}\n",
			Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
			event
		);
		let mut file = tokio::fs::OpenOptions::new()
			.create(true)
			.append(true)
			.open(&self.path)
			.await?;
		file.write_all(line.as_bytes()).await?;
		Ok(())
	}

	/// Append, but only log on failure. Used where the triggering write
	/// has already committed and must not be rolled back for a log line.
	pub async fn append_best_effort(&self, event: &str) {
		if let Err(e) = self.append(event).await {
			warn!("audit log append failed: {} (event: {})", e, event);
		}
	}
}


// vim: ts=4
