//! Identity registry rules layered on top of the identity adapter:
//! label syntax, reserved names, domain ownership, release, heartbeats.

use crate::identity_adapter::{IdentityAdapter, IdentityPatch, IdentityRecord};
use crate::prelude::*;
use crate::settings::ONLINE_THRESHOLD_SECONDS;

/// Labels that can never be allocated.
pub const RESERVED_LABELS: [&str; 3] = ["root", "app", "www"];

pub const MSG_AVAILABLE: &str = "Domain name is available.";
pub const MSG_NOT_AVAILABLE: &str = "Domain name is not available.";
pub const MSG_INVALID: &str = "Domain name is invalid.";

/// Lowercase letters and digits only, 1..=63 characters. Callers
/// lowercase at the HTTP boundary; this check is strict.
pub fn is_valid_label(label: &str) -> bool {
	!label.is_empty()
		&& label.len() <= 63
		&& label.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

pub fn is_reserved_label(label: &str) -> bool {
	RESERVED_LABELS.contains(&label)
}

#[derive(Debug, Clone)]
pub struct Availability {
	pub available: bool,
	pub message: &'static str,
}

/// Availability check, in order: syntax, reserved set, existing owner.
pub async fn check_availability(app: &App, label: &str) -> ClResult<Availability> {
	if !is_valid_label(label) {
		return Ok(Availability { available: false, message: MSG_INVALID });
	}
	if is_reserved_label(label) {
		return Ok(Availability { available: false, message: MSG_NOT_AVAILABLE });
	}
	if app.identity_adapter.find_by_domain(label).await?.is_some() {
		return Ok(Availability { available: false, message: MSG_NOT_AVAILABLE });
	}
	Ok(Availability { available: true, message: MSG_AVAILABLE })
}

/// Merge-write an identity record. When the patch assigns a domain label,
/// the label must be syntactically valid, not reserved, and either
/// unowned or already owned by this same user id.
pub async fn upsert_identity(app: &App, user_id: &str, patch: &IdentityPatch) -> ClResult<()> {
	if patch.is_empty() {
		return Err(Error::ValidationError("empty identity update".into()));
	}

	if let Patch::Value(label) = &patch.domain_name {
		if !is_valid_label(label) {
			return Err(Error::ValidationError(format!("invalid domain label '{}'", label)));
		}
		if is_reserved_label(label) {
			return Err(Error::ValidationError(format!("domain label '{}' is reserved", label)));
		}
		if let Some((owner, _)) = app.identity_adapter.find_by_domain(label).await? {
			if owner.as_ref() != user_id {
				return Err(Error::DomainNotOwned(format!(
					"Domain '{}' is not owned by user '{}'",
					label, user_id
				)));
			}
		}
	}

	app.identity_adapter.merge_identity(user_id, patch).await
}

/// Registration payload for the token-authenticated domain endpoint.
#[derive(Debug, Clone)]
pub struct DomainRegistration {
	pub domain_name: Box<str>,
	pub public_key: Box<str>,
	pub server_domain: Option<Box<str>>,
}

/// Assign (or re-assign) a label to a user and record the assignment in
/// the audit log when the label actually changes hands.
pub async fn register_domain(
	app: &App,
	user_id: &str,
	registration: DomainRegistration,
) -> ClResult<()> {
	let previous = app.identity_adapter.read_identity(user_id).await?;
	let newly_assigned = previous
		.as_ref()
		.and_then(|r| r.domain_name.as_deref())
		.map(|current| current != registration.domain_name.as_ref())
		.unwrap_or(true);

	let patch = IdentityPatch {
		domain_name: Patch::Value(registration.domain_name.clone()),
		public_key: Patch::Value(registration.public_key),
		server_domain: match registration.server_domain {
			Some(server_domain) => Patch::Value(server_domain),
			None => Patch::Undefined,
		},
		..Default::default()
	};
	upsert_identity(app, user_id, &patch).await?;

	if newly_assigned {
		app.audit
			.append_best_effort(&format!(
				"ASSIGNED {} to {}",
				registration.domain_name, user_id
			))
			.await;
	}
	Ok(())
}

/// Unset the domain label and public key, leaving the record otherwise
/// intact. Used by cleanup when an owner has gone silent.
pub async fn clear_domain_assignment(app: &App, user_id: &str) -> ClResult<()> {
	let patch = IdentityPatch {
		domain_name: Patch::Null,
		public_key: Patch::Null,
		..Default::default()
	};
	app.identity_adapter.merge_identity(user_id, &patch).await
}

/// Write the current timestamp to `lastSeenOnline`. Fails with NotFound
/// when the record does not exist.
pub async fn touch_heartbeat(app: &App, user_id: &str) -> ClResult<Timestamp> {
	if app.identity_adapter.read_identity(user_id).await?.is_none() {
		return Err(Error::NotFound);
	}
	let now = Timestamp::now();
	let patch = IdentityPatch { last_seen_online: Patch::Value(now), ..Default::default() };
	app.identity_adapter.merge_identity(user_id, &patch).await?;
	Ok(now)
}

/// Write the current timestamp to `lastRouteRegistration`.
pub async fn touch_route_registration(app: &App, user_id: &str) -> ClResult<Timestamp> {
	let now = Timestamp::now();
	let patch =
		IdentityPatch { last_route_registration: Patch::Value(now), ..Default::default() };
	app.identity_adapter.merge_identity(user_id, &patch).await?;
	Ok(now)
}

/// A user is online when the last heartbeat is within the threshold.
/// Missing timestamp means offline.
pub fn is_online(record: &IdentityRecord) -> bool {
	record
		.last_seen_online
		.map(|seen| Timestamp::now().0 - seen.0 <= ONLINE_THRESHOLD_SECONDS)
		.unwrap_or(false)
}


// vim: ts=4
