//! Adapter trait for the identity document store. One document per user id,
//! with an equality lookup on the owned domain label.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fmt::Debug;

use crate::prelude::*;

/// One identity document. The user id is the document key and is carried
/// separately by every adapter call.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
	/// Subdomain label owned by this user. Unique across all records.
	pub domain_name: Option<Box<str>>,
	/// Informational only; never interpreted on reads.
	pub server_domain: Option<Box<str>>,
	/// Ed25519 verifying key, base64 of the raw 32 bytes.
	pub public_key: Option<Box<str>>,
	pub last_seen_online: Option<Timestamp>,
	pub last_route_registration: Option<Timestamp>,
}

/// Merge-write for an identity document. `Undefined` fields are left
/// untouched, `Null` clears the stored value.
#[derive(Debug, Clone, Default)]
pub struct IdentityPatch {
	pub domain_name: Patch<Box<str>>,
	pub server_domain: Patch<Box<str>>,
	pub public_key: Patch<Box<str>>,
	pub last_seen_online: Patch<Timestamp>,
	pub last_route_registration: Patch<Timestamp>,
}

impl IdentityPatch {
	pub fn is_empty(&self) -> bool {
		self.domain_name.is_undefined()
			&& self.server_domain.is_undefined()
			&& self.public_key.is_undefined()
			&& self.last_seen_online.is_undefined()
			&& self.last_route_registration.is_undefined()
	}
}

#[async_trait]
pub trait IdentityAdapter: Send + Sync + Debug {
	/// Read one identity document by user id.
	async fn read_identity(&self, user_id: &str) -> ClResult<Option<IdentityRecord>>;

	/// Exact-match lookup on `domain_name`. Returns the owning user id
	/// together with the record.
	async fn find_by_domain(&self, domain: &str) -> ClResult<Option<(Box<str>, IdentityRecord)>>;

	/// Merge-write a document, creating it when absent. Rejects an
	/// all-`Undefined` patch with a validation error. Domain ownership
	/// rules live above this call, in the registry.
	async fn merge_identity(&self, user_id: &str, patch: &IdentityPatch) -> ClResult<()>;

	/// Hard delete of the document. Deleting a missing document is not
	/// an error.
	async fn delete_identity(&self, user_id: &str) -> ClResult<()>;
}

// vim: ts=4
