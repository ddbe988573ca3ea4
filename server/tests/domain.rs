//! Directory endpoint tests: availability, identity lookups, signature
//! verification, status, and the token-authenticated registration pair.

mod common;

use common::{build_server, keypair, service_bearer, sign};
use serde_json::json;

#[tokio::test]
async fn test_available_reserved_labels() {
	let server = build_server(false).await;

	for label in ["root", "app", "www"] {
		let (status, body) = server.get(&format!("/available/{}", label)).await;
		assert_eq!(status.as_u16(), 209);
		assert_eq!(body["available"], false);
		assert_eq!(body["message"], "Domain name is not available.");
	}
}

#[tokio::test]
async fn test_available_free_label() {
	let server = build_server(false).await;

	let (status, body) = server.get("/available/alice").await;
	assert_eq!(status.as_u16(), 200);
	assert_eq!(body["available"], true);
}

#[tokio::test]
async fn test_available_label_syntax() {
	let server = build_server(false).await;

	// 63 characters pass, 64 fail, dashes fail
	let (status, _) = server.get(&format!("/available/{}", "a".repeat(63))).await;
	assert_eq!(status.as_u16(), 200);
	let (status, _) = server.get(&format!("/available/{}", "a".repeat(64))).await;
	assert_eq!(status.as_u16(), 209);
	let (status, body) = server.get("/available/with-dash").await;
	assert_eq!(status.as_u16(), 209);
	assert_eq!(body["available"], false);
}

#[tokio::test]
async fn test_available_taken_label() {
	let server = build_server(false).await;
	let (_, public_key) = keypair();
	server.seed_identity("u1", Some("alice"), &public_key).await;

	let (status, body) = server.get("/available/alice").await;
	assert_eq!(status.as_u16(), 209);
	assert_eq!(body["message"], "Domain name is not available.");

	// labels are lowercased at the boundary, so case does not dodge the check
	let (status, _) = server.get("/available/ALICE").await;
	assert_eq!(status.as_u16(), 209);
	let (status, body) = server.get("/available/Bob").await;
	assert_eq!(status.as_u16(), 200);
	assert_eq!(body["available"], true);
}

#[tokio::test]
async fn test_get_domain_known_and_unknown() {
	let server = build_server(false).await;
	let (_, public_key) = keypair();
	server.seed_identity("u1", Some("alice"), &public_key).await;

	let (status, body) = server.get("/domain/u1").await;
	assert_eq!(status.as_u16(), 200);
	assert_eq!(body["domainName"], "alice");
	assert_eq!(body["serverDomain"], "mesh.example.com");
	assert_eq!(body["publicKey"], public_key);

	// deliberate out-of-band sentinel
	let (status, body) = server.get("/domain/stranger").await;
	assert_eq!(status.as_u16(), 280);
	assert_eq!(body["error"], "User not found.");
}

#[tokio::test]
async fn test_verify_outcomes() {
	let server = build_server(false).await;
	let (signing_key, public_key) = keypair();
	server.seed_identity("u1", Some("alice"), &public_key).await;

	// valid signature
	let (status, body) = server.get(&format!("/verify/u1/{}", sign(&signing_key, "u1"))).await;
	assert_eq!(status.as_u16(), 200);
	assert_eq!(body["domainName"], "alice");
	assert_eq!(body["serverDomain"], "mesh.example.com");

	// wrong key signs: cryptographically valid but mismatched
	let (other_key, _) = keypair();
	let (status, body) = server.get(&format!("/verify/u1/{}", sign(&other_key, "u1"))).await;
	assert_eq!(status.as_u16(), 200);
	assert_eq!(body["valid"], false);

	// malformed signature text is indistinguishable from a mismatch
	let (status, body) = server.get("/verify/u1/%21%21%21").await;
	assert_eq!(status.as_u16(), 200);
	assert_eq!(body["valid"], false);

	// unknown user
	let (status, body) =
		server.get(&format!("/verify/stranger/{}", sign(&signing_key, "stranger"))).await;
	assert_eq!(status.as_u16(), 200);
	assert_eq!(body["error"], "unknown user");
}

#[tokio::test]
async fn test_status_online_transitions() {
	let server = build_server(false).await;
	let (signing_key, public_key) = keypair();
	server.seed_identity("u1", Some("alice"), &public_key).await;

	let (status, _) = server.get("/status/stranger").await;
	assert_eq!(status.as_u16(), 404);

	// no heartbeat yet: offline
	let (status, body) = server.get("/status/u1").await;
	assert_eq!(status.as_u16(), 200);
	assert_eq!(body["online"], false);

	let (status, body) = server
		.request(
			"POST",
			&format!("/heartbeat/u1/{}", sign(&signing_key, "u1")),
			None,
			None,
		)
		.await;
	assert_eq!(status.as_u16(), 200);
	assert!(body["lastSeenOnline"].is_i64());

	let (status, body) = server.get("/status/u1").await;
	assert_eq!(status.as_u16(), 200);
	assert_eq!(body["online"], true);
}

#[tokio::test]
async fn test_heartbeat_auth_failures() {
	let server = build_server(false).await;
	let (signing_key, public_key) = keypair();
	server.seed_identity("u1", Some("alice"), &public_key).await;

	let (other_key, _) = keypair();
	let (status, _) = server
		.request("POST", &format!("/heartbeat/u1/{}", sign(&other_key, "u1")), None, None)
		.await;
	assert_eq!(status.as_u16(), 401);

	let (status, _) = server
		.request(
			"POST",
			&format!("/heartbeat/stranger/{}", sign(&signing_key, "stranger")),
			None,
			None,
		)
		.await;
	assert_eq!(status.as_u16(), 404);
}

#[tokio::test]
async fn test_register_domain_and_conflict() {
	let server = build_server(false).await;
	let (_, key1) = keypair();
	let (_, key2) = keypair();

	let (status, body) = server
		.request(
			"POST",
			"/domain",
			Some(json!({"domainName": "alice", "publicKey": key1})),
			Some(&service_bearer("u1")),
		)
		.await;
	assert_eq!(status.as_u16(), 200);
	assert_eq!(body["domainName"], "alice");

	// same user re-registering its own label is fine
	let (status, _) = server
		.request(
			"POST",
			"/domain",
			Some(json!({"domainName": "alice", "publicKey": key1})),
			Some(&service_bearer("u1")),
		)
		.await;
	assert_eq!(status.as_u16(), 200);

	// someone else claiming it is a conflict, surfaced as 500
	let (status, body) = server
		.request(
			"POST",
			"/domain",
			Some(json!({"domainName": "alice", "publicKey": key2})),
			Some(&service_bearer("u2")),
		)
		.await;
	assert_eq!(status.as_u16(), 500);
	assert!(body["error"].as_str().unwrap().contains("not owned"));
}

#[tokio::test]
async fn test_register_domain_writes_audit_line() {
	let server = build_server(false).await;
	let (_, key) = keypair();

	server
		.request(
			"POST",
			"/domain",
			Some(json!({"domainName": "alice", "publicKey": key})),
			Some(&service_bearer("u1")),
		)
		.await;

	let content =
		tokio::fs::read_to_string(server.scratch.join("domain-events.log")).await.unwrap();
	assert!(content.contains("ASSIGNED alice to u1"));
}

#[tokio::test]
async fn test_register_domain_rejects_reserved_and_invalid() {
	let server = build_server(false).await;
	let (_, key) = keypair();

	let (status, _) = server
		.request(
			"POST",
			"/domain",
			Some(json!({"domainName": "www", "publicKey": key})),
			Some(&service_bearer("u1")),
		)
		.await;
	assert_eq!(status.as_u16(), 400);

	let (status, _) = server
		.request(
			"POST",
			"/domain",
			Some(json!({"domainName": "no_underscores", "publicKey": key})),
			Some(&service_bearer("u1")),
		)
		.await;
	assert_eq!(status.as_u16(), 400);
}

#[tokio::test]
async fn test_token_auth_rejections() {
	let server = build_server(false).await;
	let (_, key) = keypair();
	let body = json!({"domainName": "alice", "publicKey": key});

	// no token at all
	let (status, _) = server.request("POST", "/domain", Some(body.clone()), None).await;
	assert_eq!(status.as_u16(), 401);

	// wrong service key
	let (status, _) = server
		.request("POST", "/domain", Some(body.clone()), Some("wrong-key;u1"))
		.await;
	assert_eq!(status.as_u16(), 401);

	// identity token without a configured verifier
	let (status, _) =
		server.request("POST", "/domain", Some(body), Some("some-opaque-token")).await;
	assert_eq!(status.as_u16(), 401);
}

#[tokio::test]
async fn test_delete_domain_removes_everything() {
	let server = build_server(false).await;
	let (signing_key, public_key) = keypair();
	server.seed_identity("u1", Some("alice"), &public_key).await;

	let sig = sign(&signing_key, "u1");
	let (status, _) = server
		.request(
			"POST",
			&format!("/routes/u1/{}", sig),
			Some(json!({"routes": [
				{"ip": "10.0.0.1", "port": 443, "priority": 1, "source": "agent"}
			]})),
			None,
		)
		.await;
	assert_eq!(status.as_u16(), 200);

	let (status, _) = server
		.request("DELETE", "/domain", None, Some(&service_bearer("u1")))
		.await;
	assert_eq!(status.as_u16(), 200);

	let (status, body) = server.get("/domain/u1").await;
	assert_eq!(status.as_u16(), 280);
	assert_eq!(body["error"], "User not found.");

	let (status, _) = server.get("/routes/u1").await;
	assert_eq!(status.as_u16(), 404);
	assert_eq!(server.app.activity.get_timestamp("u1").await.unwrap(), None);
}

// vim: ts=4
