//! Common test utilities: an app over in-memory adapters, request
//! helpers, and key fixtures.

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{Request, StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use ed25519_dalek::{Signer, SigningKey};
use http_body_util::BodyExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tower::ServiceExt;

use identity_adapter_sqlite::IdentityAdapterSqlite;
use nsl_router::identity_adapter::{IdentityAdapter, IdentityPatch};
use nsl_router::settings::Opts;
use nsl_router::store_adapter::MemoryStoreAdapter;
use nsl_router::types::Patch;
use nsl_router::{App, Builder, routes};

pub const SERVICE_KEY: &str = "service-key-1";

static TEST_SEQ: AtomicU32 = AtomicU32::new(0);

/// Per-test scratch directory for audit logs and CA material.
pub fn scratch_dir() -> std::path::PathBuf {
	let dir = std::env::temp_dir().join(format!(
		"nsl-router-test-{}-{}",
		std::process::id(),
		TEST_SEQ.fetch_add(1, Ordering::Relaxed)
	));
	std::fs::create_dir_all(&dir).unwrap();
	dir
}

pub fn test_opts(scratch: &std::path::Path) -> Opts {
	Opts {
		server_domain: "mesh.example.com".into(),
		service_api_key: Some(SERVICE_KEY.into()),
		domain_log_path: scratch.join("domain-events.log"),
		ca_cert_path: scratch.join("ca-cert.pem"),
		ca_key_path: scratch.join("ca-key.pem"),
		..Default::default()
	}
}

pub struct TestServer {
	pub app: App,
	pub router: Router,
	pub scratch: std::path::PathBuf,
}

pub async fn build_server(with_ca: bool) -> TestServer {
	let scratch = scratch_dir();
	build_server_with_opts(test_opts(&scratch), scratch, with_ca).await
}

pub async fn build_server_with_opts(
	opts: Opts,
	scratch: std::path::PathBuf,
	with_ca: bool,
) -> TestServer {
	let identity_adapter = Arc::new(IdentityAdapterSqlite::new_in_memory().await.unwrap());
	let store_adapter = Arc::new(MemoryStoreAdapter::new());

	let mut builder = Builder::new(opts)
		.identity_adapter(identity_adapter)
		.store_adapter(store_adapter);
	if !with_ca {
		builder = builder.without_ca();
	}
	let app = builder.build().await.unwrap();

	let router = routes::init(app.clone())
		.layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
	TestServer { app, router, scratch }
}

impl TestServer {
	pub async fn request(
		&self,
		method: &str,
		uri: &str,
		body: Option<serde_json::Value>,
		bearer: Option<&str>,
	) -> (StatusCode, serde_json::Value) {
		let mut builder = Request::builder().method(method).uri(uri);
		if let Some(token) = bearer {
			builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
		}
		let request = match body {
			Some(json) => builder
				.header(header::CONTENT_TYPE, "application/json")
				.body(Body::from(serde_json::to_vec(&json).unwrap()))
				.unwrap(),
			None => builder.body(Body::empty()).unwrap(),
		};

		let response = self.router.clone().oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = response.into_body().collect().await.unwrap().to_bytes();
		let json = if bytes.is_empty() {
			serde_json::Value::Null
		} else {
			serde_json::from_slice(&bytes)
				.unwrap_or_else(|_| serde_json::Value::String(
					String::from_utf8_lossy(&bytes).into_owned(),
				))
		};
		(status, json)
	}

	pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
		self.request("GET", uri, None, None).await
	}

	/// Seed an identity record directly through the adapter.
	pub async fn seed_identity(&self, user_id: &str, domain: Option<&str>, public_key: &str) {
		let patch = IdentityPatch {
			domain_name: match domain {
				Some(d) => Patch::Value(d.into()),
				None => Patch::Undefined,
			},
			public_key: Patch::Value(public_key.into()),
			server_domain: Patch::Value("mesh.example.com".into()),
			..Default::default()
		};
		self.app.identity_adapter.merge_identity(user_id, &patch).await.unwrap();
	}
}

/// Fresh Ed25519 key pair; the public half in the stored text form.
pub fn keypair() -> (SigningKey, String) {
	let signing_key = SigningKey::generate(&mut rand::thread_rng());
	let public_b64 = STANDARD.encode(signing_key.verifying_key().to_bytes());
	(signing_key, public_b64)
}

/// Sign a user id the way agents do: URL-safe unpadded base64.
pub fn sign(signing_key: &SigningKey, user_id: &str) -> String {
	URL_SAFE_NO_PAD.encode(signing_key.sign(user_id.as_bytes()).to_bytes())
}

pub fn service_bearer(user_id: &str) -> String {
	format!("{};{}", SERVICE_KEY, user_id)
}

// vim: ts=4
