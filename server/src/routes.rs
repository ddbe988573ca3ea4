//! API routes

use axum::{
	Router, middleware,
	routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::ca;
use crate::cleanup;
use crate::domain;
use crate::prelude::*;
use crate::route;

async fn api_not_found() -> Error {
	Error::NotFound
}

// Public, unauthenticated lookups used by agents and edge proxies
fn init_public_routes() -> Router<App> {
	Router::new()
		.route("/health", get(async || "OK\n"))
		.route("/available/{label}", get(domain::handler::get_available))
		.route("/domain/{user_id}", get(domain::handler::get_domain))
		.route("/verify/{user_id}/{sig}", get(domain::handler::get_verify))
		.route("/status/{user_id}", get(domain::handler::get_status))
		.route("/resolve/v2/{label}", get(route::handler::get_resolve))
		.route("/routes/{user_id}", get(route::handler::get_routes))
		.route("/ca-cert", get(ca::handler::get_ca_cert))
}

// Mutations authenticated by the path-embedded Ed25519 signature; each
// handler checks the signature itself because the outcome mapping differs
// per endpoint
fn init_signature_routes() -> Router<App> {
	Router::new()
		.route("/routes/{user_id}/{sig}", post(route::handler::post_routes))
		.route("/routes/{user_id}/{sig}", delete(route::handler::delete_routes))
		.route("/heartbeat/{user_id}/{sig}", post(domain::handler::post_heartbeat))
		.route("/cert/{user_id}/{sig}", post(ca::handler::post_cert))
}

// Administrative endpoints behind bearer-token auth
fn init_token_routes(app: App) -> Router<App> {
	Router::new()
		.route("/domain", post(domain::handler::post_domain))
		.route("/domain", delete(domain::handler::delete_domain))
		.route("/admin/cleanup", post(cleanup::post_admin_cleanup))
		.route_layer(middleware::from_fn_with_state(app, auth::token::require_token_auth))
}

pub fn init(app: App) -> Router {
	let cors_layer = tower_http::cors::CorsLayer::very_permissive();

	init_public_routes()
		.merge(init_signature_routes())
		.merge(init_token_routes(app.clone()))
		.fallback(api_not_found)
		.layer(cors_layer)
		.layer(TraceLayer::new_for_http())
		.with_state(app)
}

// vim: ts=4
