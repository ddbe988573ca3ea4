//! Bearer-token authentication for the administrative endpoints. A token
//! is either `<service key>;<user id>` with the preshared service key, or
//! an identity-provider token checked by an injected verifier.

use async_trait::async_trait;
use axum::{
	extract::{Request, State},
	http::header,
	middleware::Next,
	response::Response,
};
use std::fmt::Debug;
use std::sync::Arc;

use crate::prelude::*;

/// Verifier for identity-provider tokens. External collaborator; the
/// default deployment runs without one and accepts only the service key.
#[async_trait]
pub trait IdentityTokenVerifier: Send + Sync + Debug {
	/// Returns the authenticated user id for a valid token.
	async fn verify(&self, token: &str) -> ClResult<Box<str>>;
}

/// Authenticated principal, inserted into request extensions by
/// [`require_token_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser(pub Arc<str>);

pub async fn require_token_auth(
	State(app): State<App>,
	mut req: Request,
	next: Next,
) -> ClResult<Response> {
	let token = req
		.headers()
		.get(header::AUTHORIZATION)
		.and_then(|v| v.to_str().ok())
		.and_then(|v| v.strip_prefix("Bearer "))
		.ok_or(Error::Unauthorized)?;

	let user_id: Box<str> = match token.split_once(';') {
		Some((key, user_id)) if !user_id.is_empty() => {
			let service_key =
				app.opts.service_api_key.as_deref().ok_or(Error::Unauthorized)?;
			if key != service_key {
				warn!("token auth denied: bad service key");
				return Err(Error::Unauthorized);
			}
			user_id.into()
		}
		_ => match &app.token_verifier {
			Some(verifier) => verifier.verify(token).await.map_err(|e| {
				warn!("token auth denied: identity token rejected: {}", e);
				Error::Unauthorized
			})?,
			None => {
				warn!("token auth denied: no identity token verifier configured");
				return Err(Error::Unauthorized);
			}
		},
	};

	req.extensions_mut().insert(AuthUser(Arc::from(user_id)));
	Ok(next.run(req).await)
}

// vim: ts=4
