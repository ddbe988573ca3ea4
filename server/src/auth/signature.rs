//! Signature authenticator. Verifies that a caller holds the private key
//! whose public counterpart is bound to a user id. The signed message is
//! the user id string itself, bytes as received.

use axum::http::HeaderMap;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use ed25519_dalek::{Signature, VerifyingKey};
use std::net::SocketAddr;

use crate::identity_adapter::{IdentityAdapter, IdentityRecord};
use crate::prelude::*;

/// Outcome of a signature check. `BadFormat` and `Mismatch` must be
/// indistinguishable on the wire; only logs may tell them apart.
#[derive(Debug)]
pub enum AuthOutcome {
	Authenticated(IdentityRecord),
	BadFormat,
	Mismatch,
	UnknownUser,
}

impl AuthOutcome {
	pub fn is_denied(&self) -> bool {
		matches!(self, AuthOutcome::BadFormat | AuthOutcome::Mismatch)
	}
}

/// Check `signature` (URL-safe unpadded base64, 64 bytes) against the
/// Ed25519 key stored for `user_id` (base64, 32 bytes). Never creates
/// identity records.
pub async fn authenticate(app: &App, user_id: &str, signature: &str) -> ClResult<AuthOutcome> {
	let Some(record) = app.identity_adapter.read_identity(user_id).await? else {
		return Ok(AuthOutcome::UnknownUser);
	};
	// A released identity has no key left to verify against
	let Some(key_text) = record.public_key.as_deref() else {
		return Ok(AuthOutcome::UnknownUser);
	};

	let Ok(key_bytes) = STANDARD.decode(key_text) else {
		warn!("stored public key for {} is not valid base64", user_id);
		return Ok(AuthOutcome::BadFormat);
	};
	let Ok(key_array) = <[u8; 32]>::try_from(key_bytes.as_slice()) else {
		warn!("stored public key for {} has wrong length", user_id);
		return Ok(AuthOutcome::BadFormat);
	};
	let Ok(verifying_key) = VerifyingKey::from_bytes(&key_array) else {
		warn!("stored public key for {} is not a valid Ed25519 point", user_id);
		return Ok(AuthOutcome::BadFormat);
	};

	let Ok(sig_bytes) = URL_SAFE_NO_PAD.decode(signature) else {
		return Ok(AuthOutcome::BadFormat);
	};
	let Ok(sig_array) = <[u8; 64]>::try_from(sig_bytes.as_slice()) else {
		return Ok(AuthOutcome::BadFormat);
	};
	let sig = Signature::from_bytes(&sig_array);

	match verifying_key.verify_strict(user_id.as_bytes(), &sig) {
		Ok(()) => Ok(AuthOutcome::Authenticated(record)),
		Err(_) => Ok(AuthOutcome::Mismatch),
	}
}

/// Forensic log line for a denied signature. The response stays generic.
pub fn log_denied(
	endpoint: &str,
	user_id: &str,
	outcome: &AuthOutcome,
	addr: Option<SocketAddr>,
	headers: &HeaderMap,
) {
	let client = addr.map(|a| a.to_string()).unwrap_or_else(|| "unknown".into());
	let user_agent = headers
		.get(axum::http::header::USER_AGENT)
		.and_then(|v| v.to_str().ok())
		.unwrap_or("-");
	warn!(
		endpoint = endpoint,
		user_id = user_id,
		client = %client,
		user_agent = user_agent,
		outcome = ?outcome,
		"signature authentication denied"
	);
}

#[cfg(test)]
mod tests {
	use super::*;
	use ed25519_dalek::{Signer, SigningKey};

	pub fn test_keypair() -> (SigningKey, String) {
		let signing_key = SigningKey::generate(&mut rand::thread_rng());
		let public_b64 = STANDARD.encode(signing_key.verifying_key().to_bytes());
		(signing_key, public_b64)
	}

	pub fn sign_user_id(signing_key: &SigningKey, user_id: &str) -> String {
		URL_SAFE_NO_PAD.encode(signing_key.sign(user_id.as_bytes()).to_bytes())
	}

	#[test]
	fn test_signature_roundtrip_encoding() {
		let (signing_key, public_b64) = test_keypair();
		let sig = sign_user_id(&signing_key, "user-1");

		let key_bytes = STANDARD.decode(&public_b64).unwrap();
		let key = VerifyingKey::from_bytes(&key_bytes.as_slice().try_into().unwrap()).unwrap();
		let sig_bytes = URL_SAFE_NO_PAD.decode(&sig).unwrap();
		let sig = Signature::from_bytes(&sig_bytes.as_slice().try_into().unwrap());

		assert!(key.verify_strict(b"user-1", &sig).is_ok());
		assert!(key.verify_strict(b"user-2", &sig).is_err());
	}
}

// vim: ts=4
