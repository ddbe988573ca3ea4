//! Directory REST endpoints: availability, identity lookups, signature
//! verification, online status, heartbeat, and the token-authenticated
//! domain registration pair.

use axum::{
	Extension,
	extract::{ConnectInfo, Json, Path, State},
	http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::net::SocketAddr;

use crate::auth::signature::{self, AuthOutcome};
use crate::auth::token::AuthUser;
use crate::domain::registry::{self, DomainRegistration};
use crate::identity_adapter::IdentityAdapter;
use crate::prelude::*;

/// Out-of-band availability sentinel kept for wire compatibility.
fn status_unavailable() -> StatusCode {
	StatusCode::from_u16(209).unwrap_or(StatusCode::OK)
}

/// Out-of-band user-not-found sentinel kept for wire compatibility.
fn status_user_not_found() -> StatusCode {
	StatusCode::from_u16(280).unwrap_or(StatusCode::OK)
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
	pub available: bool,
	pub message: &'static str,
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainResponse {
	pub domain_name: Option<Box<str>>,
	pub server_domain: Option<Box<str>>,
	pub public_key: Option<Box<str>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum VerifyResponse {
	#[serde(rename_all = "camelCase")]
	Valid { server_domain: Option<Box<str>>, domain_name: Option<Box<str>> },
	Invalid { valid: bool },
	Unknown { error: &'static str },
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
	pub online: bool,
	pub last_seen_online: Option<Timestamp>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDomainRequest {
	/// Legacy field; the authenticated principal is authoritative.
	pub user_id: Option<Box<str>>,
	pub domain_name: Box<str>,
	pub public_key: Box<str>,
	pub server_domain: Option<Box<str>>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDomainResponse {
	pub message: Box<str>,
	pub domain_name: Box<str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
	pub message: Box<str>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatResponse {
	pub message: Box<str>,
	pub last_seen_online: Timestamp,
}

#[derive(Debug, Serialize)]
pub struct UserNotFoundResponse {
	pub error: &'static str,
}

/// GET /available/{label} - 200 when free, 209 otherwise
#[axum::debug_handler]
pub async fn get_available(
	State(app): State<App>,
	Path(label): Path<String>,
) -> ClResult<(StatusCode, Json<AvailabilityResponse>)> {
	let label = label.to_lowercase();
	let availability = registry::check_availability(&app, &label).await?;
	let status = if availability.available { StatusCode::OK } else { status_unavailable() };
	Ok((
		status,
		Json(AvailabilityResponse {
			available: availability.available,
			message: availability.message,
		}),
	))
}

/// GET /domain/{userId} - public identity fields, 280 when unknown
#[axum::debug_handler]
pub async fn get_domain(
	State(app): State<App>,
	Path(user_id): Path<String>,
) -> ClResult<axum::response::Response> {
	use axum::response::IntoResponse;

	match app.identity_adapter.read_identity(&user_id).await? {
		Some(record) => Ok((
			StatusCode::OK,
			Json(DomainResponse {
				domain_name: record.domain_name,
				server_domain: record.server_domain,
				public_key: record.public_key,
			}),
		)
			.into_response()),
		None => Ok((
			status_user_not_found(),
			Json(UserNotFoundResponse { error: "User not found." }),
		)
			.into_response()),
	}
}

/// GET /verify/{userId}/{sig} - always 200, body reports the outcome
#[axum::debug_handler]
pub async fn get_verify(
	State(app): State<App>,
	Path((user_id, sig)): Path<(String, String)>,
) -> ClResult<(StatusCode, Json<VerifyResponse>)> {
	let body = match signature::authenticate(&app, &user_id, &sig).await? {
		AuthOutcome::Authenticated(record) => VerifyResponse::Valid {
			server_domain: record.server_domain,
			domain_name: record.domain_name,
		},
		AuthOutcome::UnknownUser => VerifyResponse::Unknown { error: "unknown user" },
		// bad format and mismatch are indistinguishable on the wire
		_ => VerifyResponse::Invalid { valid: false },
	};
	Ok((StatusCode::OK, Json(body)))
}

/// GET /status/{userId} - heartbeat-derived online flag
#[axum::debug_handler]
pub async fn get_status(
	State(app): State<App>,
	Path(user_id): Path<String>,
) -> ClResult<(StatusCode, Json<StatusResponse>)> {
	let record = app.identity_adapter.read_identity(&user_id).await?.ok_or(Error::NotFound)?;
	Ok((
		StatusCode::OK,
		Json(StatusResponse {
			online: registry::is_online(&record),
			last_seen_online: record.last_seen_online,
		}),
	))
}

/// POST /heartbeat/{userId}/{sig}
#[axum::debug_handler]
pub async fn post_heartbeat(
	State(app): State<App>,
	Path((user_id, sig)): Path<(String, String)>,
	ConnectInfo(addr): ConnectInfo<SocketAddr>,
	headers: HeaderMap,
) -> ClResult<(StatusCode, Json<HeartbeatResponse>)> {
	match signature::authenticate(&app, &user_id, &sig).await? {
		AuthOutcome::Authenticated(_) => {}
		AuthOutcome::UnknownUser => return Err(Error::NotFound),
		outcome => {
			signature::log_denied("heartbeat", &user_id, &outcome, Some(addr), &headers);
			return Err(Error::Unauthorized);
		}
	}

	let last_seen_online = registry::touch_heartbeat(&app, &user_id).await?;
	Ok((
		StatusCode::OK,
		Json(HeartbeatResponse { message: "Heartbeat recorded.".into(), last_seen_online }),
	))
}

/// POST /domain (token-authenticated) - assign a label to the caller
#[axum::debug_handler]
pub async fn post_domain(
	State(app): State<App>,
	Extension(AuthUser(user_id)): Extension<AuthUser>,
	Json(body): Json<RegisterDomainRequest>,
) -> ClResult<(StatusCode, Json<RegisterDomainResponse>)> {
	let domain_name: Box<str> = body.domain_name.to_lowercase().into();
	registry::register_domain(
		&app,
		&user_id,
		DomainRegistration {
			domain_name: domain_name.clone(),
			public_key: body.public_key,
			server_domain: body.server_domain,
		},
	)
	.await?;
	info!("Registered domain {} for {}", domain_name, user_id);

	Ok((
		StatusCode::OK,
		Json(RegisterDomainResponse { message: "Domain registered.".into(), domain_name }),
	))
}

/// DELETE /domain (token-authenticated) - remove the caller's identity,
/// routes and activity entry
#[axum::debug_handler]
pub async fn delete_domain(
	State(app): State<App>,
	Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> ClResult<(StatusCode, Json<MessageResponse>)> {
	app.routes.delete_routes(&user_id).await?;
	app.activity.remove(&user_id).await?;
	app.identity_adapter.delete_identity(&user_id).await?;
	info!("Deleted identity {}", user_id);

	Ok((StatusCode::OK, Json(MessageResponse { message: "Domain deleted.".into() })))
}

// vim: ts=4
