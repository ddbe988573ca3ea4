//! Route REST endpoints: lease registration, lookup, deletion, and the
//! resolve path used by edge proxies.

use axum::{
	extract::{ConnectInfo, Json, Path, State},
	http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::net::SocketAddr;

use crate::auth::signature::{self, AuthOutcome};
use crate::domain::registry;
use crate::identity_adapter::IdentityAdapter;
use crate::prelude::*;
use crate::route::store::Route;

#[derive(Debug, Deserialize)]
pub struct RegisterRoutesRequest {
	pub routes: Option<Vec<Route>>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRoutesResponse {
	pub message: Box<str>,
	pub routes: Vec<Route>,
	pub domain: Option<Box<str>>,
}

#[derive(Debug, Serialize)]
pub struct RoutesResponse {
	pub routes: Vec<Route>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
	pub message: Box<str>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
	pub user_id: Box<str>,
	pub domain_name: Option<Box<str>>,
	pub server_domain: Option<Box<str>>,
	pub routes: Vec<Route>,
	pub routes_ttl: i64,
	pub last_seen_online: Option<Timestamp>,
}

/// POST /routes/{userId}/{sig} - replace the caller's leases per source
#[axum::debug_handler]
pub async fn post_routes(
	State(app): State<App>,
	Path((user_id, sig)): Path<(String, String)>,
	ConnectInfo(addr): ConnectInfo<SocketAddr>,
	headers: HeaderMap,
	Json(body): Json<RegisterRoutesRequest>,
) -> ClResult<(StatusCode, Json<RegisterRoutesResponse>)> {
	let record = match signature::authenticate(&app, &user_id, &sig).await? {
		AuthOutcome::Authenticated(record) => record,
		AuthOutcome::UnknownUser => return Err(Error::NotFound),
		outcome => {
			signature::log_denied("routes.register", &user_id, &outcome, Some(addr), &headers);
			return Err(Error::Unauthorized);
		}
	};

	let routes = match body.routes {
		Some(routes) if !routes.is_empty() => routes,
		_ => {
			return Err(Error::ValidationError("routes must be a non-empty array".into()));
		}
	};

	let registered = app.routes.register(&user_id, routes).await?;
	registry::touch_route_registration(&app, &user_id).await?;
	info!("Registered {} routes for {}", registered.len(), user_id);

	Ok((
		StatusCode::OK,
		Json(RegisterRoutesResponse {
			message: "Routes registered.".into(),
			routes: registered,
			domain: record.domain_name,
		}),
	))
}

/// GET /routes/{userId} - current route list
#[axum::debug_handler]
pub async fn get_routes(
	State(app): State<App>,
	Path(user_id): Path<String>,
) -> ClResult<(StatusCode, Json<RoutesResponse>)> {
	let routes = app.routes.get_routes(&user_id).await?.ok_or(Error::NotFound)?;
	Ok((StatusCode::OK, Json(RoutesResponse { routes })))
}

/// DELETE /routes/{userId}/{sig} - drop every lease of the caller
#[axum::debug_handler]
pub async fn delete_routes(
	State(app): State<App>,
	Path((user_id, sig)): Path<(String, String)>,
	ConnectInfo(addr): ConnectInfo<SocketAddr>,
	headers: HeaderMap,
) -> ClResult<(StatusCode, Json<MessageResponse>)> {
	match signature::authenticate(&app, &user_id, &sig).await? {
		AuthOutcome::Authenticated(_) => {}
		AuthOutcome::UnknownUser => return Err(Error::NotFound),
		outcome => {
			signature::log_denied("routes.delete", &user_id, &outcome, Some(addr), &headers);
			return Err(Error::Unauthorized);
		}
	}

	app.routes.delete_routes(&user_id).await?;
	info!("Deleted routes for {}", user_id);
	Ok((StatusCode::OK, Json(MessageResponse { message: "Routes deleted.".into() })))
}

/// GET /resolve/v2/{label} - resolve a label to its owner and live routes
#[axum::debug_handler]
pub async fn get_resolve(
	State(app): State<App>,
	Path(label): Path<String>,
) -> ClResult<(StatusCode, Json<ResolveResponse>)> {
	let label = label.to_lowercase();
	let (user_id, record) =
		app.identity_adapter.find_by_domain(&label).await?.ok_or(Error::NotFound)?;

	let routes = app.routes.get_routes(&user_id).await?.unwrap_or_default();
	let routes_ttl = app.routes.get_routes_ttl(&user_id).await?;

	Ok((
		StatusCode::OK,
		Json(ResolveResponse {
			user_id,
			domain_name: record.domain_name,
			server_domain: record.server_domain,
			routes,
			routes_ttl,
			last_seen_online: record.last_seen_online,
		}),
	))
}

// vim: ts=4
