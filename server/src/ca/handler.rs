//! Certificate REST endpoints: root download and CSR signing.

use axum::{
	extract::{ConnectInfo, Json, Path, State},
	http::{HeaderMap, StatusCode, header},
	response::{IntoResponse, Response},
};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::auth::signature::{self, AuthOutcome};
use crate::prelude::*;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignCertRequest {
	pub csr: Option<String>,
	pub public_ip: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignCertResponse {
	pub certificate: String,
	pub expires_at: String,
	pub ca_certificate: String,
}

/// GET /ca-cert - the root certificate as text/plain PEM
#[axum::debug_handler]
pub async fn get_ca_cert(State(app): State<App>) -> ClResult<Response> {
	let ca = app
		.ca
		.as_ref()
		.ok_or_else(|| Error::ServiceUnavailable("Certificate authority not initialized".into()))?;
	Ok((
		StatusCode::OK,
		[(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
		ca.ca_certificate_pem().to_owned(),
	)
		.into_response())
}

/// POST /cert/{userId}/{sig} - sign a leaf certificate from a CSR
#[axum::debug_handler]
pub async fn post_cert(
	State(app): State<App>,
	Path((user_id, sig)): Path<(String, String)>,
	ConnectInfo(addr): ConnectInfo<SocketAddr>,
	headers: HeaderMap,
	Json(body): Json<SignCertRequest>,
) -> ClResult<(StatusCode, Json<SignCertResponse>)> {
	match signature::authenticate(&app, &user_id, &sig).await? {
		AuthOutcome::Authenticated(_) => {}
		AuthOutcome::UnknownUser => return Err(Error::NotFound),
		outcome => {
			signature::log_denied("cert.sign", &user_id, &outcome, Some(addr), &headers);
			return Err(Error::Unauthorized);
		}
	}

	let ca = app
		.ca
		.as_ref()
		.ok_or_else(|| Error::ServiceUnavailable("Certificate authority not initialized".into()))?;

	let csr = match body.csr.as_deref() {
		Some(csr) if !csr.trim().is_empty() => csr,
		_ => return Err(Error::ValidationError("csr is required".into())),
	};

	let issued = ca.sign_csr(csr, &user_id, body.public_ip.as_deref())?;
	let expires_at = DateTime::from_timestamp(issued.not_after, 0)
		.ok_or_else(|| Error::Internal("issued certificate expiry out of range".into()))?
		.to_rfc3339();
	info!("Issued leaf certificate for {} (expires {})", user_id, expires_at);

	Ok((
		StatusCode::OK,
		Json(SignCertResponse {
			certificate: issued.certificate_pem,
			expires_at,
			ca_certificate: ca.ca_certificate_pem().to_owned(),
		}),
	))
}

// vim: ts=4
