//! Route store. Each `(user, source)` pair is one replaceable lease in
//! the ephemeral store under `routes:{userId}:{source}`, expiring on its
//! own TTL; sources refresh every TTL/2 by convention.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::{BTreeSet, HashMap};
use std::net::IpAddr;
use std::sync::{Arc, RwLock};

use crate::activity::ActivityTracker;
use crate::prelude::*;
use crate::store_adapter::{StoreAdapter, TTL_NO_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteScheme {
	#[serde(rename = "http")]
	Http,
	#[serde(rename = "https")]
	Https,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteType {
	#[default]
	#[serde(rename = "ip")]
	Ip,
	#[serde(rename = "domain")]
	Domain,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
	#[serde(default)]
	pub path: Box<str>,
	pub host: Option<Box<str>>,
}

/// One reachable endpoint within a lease. The wire shape is the flat
/// JSON object agents have always sent; required-ness is enforced by the
/// validator, not by deserialization, so that rejects surface through the
/// route-validation path.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
	#[serde(default)]
	pub ip: Box<str>,
	#[serde(default)]
	pub port: u32,
	#[serde(default)]
	pub priority: i32,
	/// Defaults to https when absent.
	pub scheme: Option<RouteScheme>,
	/// Origin tag; routes sharing `(user, source)` form one lease.
	pub source: Option<Box<str>>,
	pub health_check: Option<HealthCheck>,
	#[serde(rename = "type", default)]
	pub typ: RouteType,
	pub domain: Option<Box<str>>,
}

impl Route {
	pub fn effective_scheme(&self) -> RouteScheme {
		self.scheme.unwrap_or(RouteScheme::Https)
	}

	/// Uniqueness key within one lease.
	fn dedup_key(&self) -> (Box<str>, u32, RouteScheme, RouteType, Option<Box<str>>) {
		(
			self.ip.clone(),
			self.port,
			self.effective_scheme(),
			self.typ,
			self.domain.clone(),
		)
	}
}

fn validate_route(route: &Route) -> ClResult<()> {
	match route.source.as_deref() {
		None | Some("") => {
			return Err(Error::RouteValidation("route is missing a source tag".into()));
		}
		Some(_) => {}
	}
	if route.ip.is_empty() {
		return Err(Error::RouteValidation("route is missing an ip".into()));
	}
	if route.ip.parse::<IpAddr>().is_err() {
		return Err(Error::RouteValidation(format!("invalid ip address '{}'", route.ip)));
	}
	if !(1..=65535).contains(&route.port) {
		return Err(Error::RouteValidation(format!("port {} out of range", route.port)));
	}
	if route.typ == RouteType::Domain && route.domain.as_deref().unwrap_or("").is_empty() {
		return Err(Error::RouteValidation("domain route is missing its hostname".into()));
	}
	if let Some(health_check) = &route.health_check {
		if health_check.path.is_empty() {
			return Err(Error::RouteValidation("health check path must not be empty".into()));
		}
	}
	Ok(())
}

fn lease_key(user_id: &str, source: &str) -> String {
	format!("routes:{}:{}", user_id, source)
}

/// Lease registry. Constructed once at boot; the known-sources set is
/// populated lazily as sources register, never by scanning the backend.
#[derive(Debug)]
pub struct RouteStore {
	store: Arc<dyn StoreAdapter>,
	activity: ActivityTracker,
	ttl_seconds: u64,
	known_sources: RwLock<BTreeSet<Box<str>>>,
}

impl RouteStore {
	pub fn new(store: Arc<dyn StoreAdapter>, activity: ActivityTracker, ttl_seconds: u64) -> Self {
		Self { store, activity, ttl_seconds, known_sources: RwLock::new(BTreeSet::new()) }
	}

	/// Snapshot of every source tag seen by this process.
	fn sources_snapshot(&self) -> ClResult<Vec<Box<str>>> {
		let sources = self
			.known_sources
			.read()
			.map_err(|_| Error::Internal("known_sources lock poisoned".into()))?;
		Ok(sources.iter().cloned().collect())
	}

	fn remember_sources<'a>(&self, sources: impl Iterator<Item = &'a str>) -> ClResult<()> {
		let mut known = self
			.known_sources
			.write()
			.map_err(|_| Error::Internal("known_sources lock poisoned".into()))?;
		for source in sources {
			if !known.contains(source) {
				known.insert(source.into());
			}
		}
		Ok(())
	}

	/// Validate and store a batch of routes. Each source group wholly
	/// replaces that source's previous lease and restarts its TTL; other
	/// sources are untouched. Returns the deduplicated batch.
	pub async fn register(&self, user_id: &str, routes: Vec<Route>) -> ClResult<Vec<Route>> {
		for route in &routes {
			validate_route(route)?;
		}

		// Group by source, preserving first-appearance order of groups;
		// within a group, dedup on the endpoint key keeping the last
		// occurrence at the first occurrence's position.
		let mut groups: Vec<(Box<str>, Vec<Route>)> = Vec::new();
		let mut group_index: HashMap<Box<str>, usize> = HashMap::new();
		for route in routes {
			let source = route.source.clone().unwrap_or_default();
			let gi = *group_index.entry(source.clone()).or_insert_with(|| {
				groups.push((source, Vec::new()));
				groups.len() - 1
			});
			let group = &mut groups[gi].1;
			if let Some(existing) =
				group.iter_mut().find(|r| r.dedup_key() == route.dedup_key())
			{
				*existing = route;
			} else {
				group.push(route);
			}
		}

		let mut entries = Vec::with_capacity(groups.len());
		for (source, group) in &groups {
			entries.push((lease_key(user_id, source), serde_json::to_string(group)?));
		}
		// One pipelined write keeps expiry aligned across this call's sources
		self.store.put_values(&entries, self.ttl_seconds).await?;
		self.remember_sources(groups.iter().map(|(s, _)| s.as_ref()))?;

		self.activity.update(user_id).await?;

		Ok(groups.into_iter().flat_map(|(_, group)| group).collect())
	}

	/// All live routes for a user across known sources, in store response
	/// order. `None` when every lease is absent or expired.
	pub async fn get_routes(&self, user_id: &str) -> ClResult<Option<Vec<Route>>> {
		let sources = self.sources_snapshot()?;
		if sources.is_empty() {
			return Ok(None);
		}
		let keys: Vec<String> = sources.iter().map(|s| lease_key(user_id, s)).collect();
		let values = self.store.get_values(&keys).await?;

		let mut routes = Vec::new();
		let mut any = false;
		for (key, value) in keys.iter().zip(values) {
			let Some(value) = value else { continue };
			any = true;
			match serde_json::from_str::<Vec<Route>>(&value) {
				Ok(parsed) => routes.extend(parsed),
				Err(e) => warn!("discarding unparseable lease {}: {}", key, e),
			}
		}
		Ok(any.then_some(routes))
	}

	/// Drop every lease of this user.
	pub async fn delete_routes(&self, user_id: &str) -> ClResult<()> {
		let sources = self.sources_snapshot()?;
		if sources.is_empty() {
			return Ok(());
		}
		let keys: Vec<String> = sources.iter().map(|s| lease_key(user_id, s)).collect();
		self.store.delete_values(&keys).await
	}

	/// Minimum positive TTL across this user's leases, or `TTL_NO_KEY`
	/// when none exist.
	pub async fn get_routes_ttl(&self, user_id: &str) -> ClResult<i64> {
		let sources = self.sources_snapshot()?;
		let mut min_ttl: Option<i64> = None;
		for source in &sources {
			let ttl = self.store.ttl(&lease_key(user_id, source)).await?;
			if ttl > 0 {
				min_ttl = Some(min_ttl.map_or(ttl, |m| m.min(ttl)));
			}
		}
		Ok(min_ttl.unwrap_or(TTL_NO_KEY))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store_adapter::MemoryStoreAdapter;

	fn test_store(ttl: u64) -> RouteStore {
		let store = Arc::new(MemoryStoreAdapter::new());
		let activity = ActivityTracker::new(store.clone());
		RouteStore::new(store, activity, ttl)
	}

	fn route(ip: &str, port: u32, source: &str) -> Route {
		Route {
			ip: ip.into(),
			port,
			priority: 1,
			scheme: None,
			source: Some(source.into()),
			health_check: None,
			typ: RouteType::Ip,
			domain: None,
		}
	}

	#[test]
	fn test_validate_ip_literals() {
		assert!(validate_route(&route("10.77.0.100", 443, "agent")).is_ok());
		assert!(validate_route(&route("::1", 443, "agent")).is_ok());
		assert!(validate_route(&route("2001:db8::1", 443, "agent")).is_ok());
		// at most one '::'
		assert!(validate_route(&route("2001::db8::1", 443, "agent")).is_err());
		assert!(validate_route(&route("not-an-ip", 443, "agent")).is_err());
		assert!(validate_route(&route("10.77.0.256", 443, "agent")).is_err());
	}

	#[test]
	fn test_validate_port_bounds() {
		assert!(validate_route(&route("1.2.3.4", 0, "agent")).is_err());
		assert!(validate_route(&route("1.2.3.4", 1, "agent")).is_ok());
		assert!(validate_route(&route("1.2.3.4", 65535, "agent")).is_ok());
		assert!(validate_route(&route("1.2.3.4", 65536, "agent")).is_err());
	}

	#[test]
	fn test_validate_source_required() {
		let mut r = route("1.2.3.4", 443, "agent");
		r.source = None;
		assert!(validate_route(&r).is_err());
		r.source = Some("".into());
		assert!(validate_route(&r).is_err());
	}

	#[test]
	fn test_validate_domain_route_needs_hostname() {
		let mut r = route("1.2.3.4", 443, "agent");
		r.typ = RouteType::Domain;
		assert!(validate_route(&r).is_err());
		r.domain = Some("edge.example.com".into());
		assert!(validate_route(&r).is_ok());
	}

	#[tokio::test]
	async fn test_register_rejects_whole_batch() {
		let store = test_store(600);
		let routes = vec![route("1.2.3.4", 443, "agent"), route("bad", 443, "agent")];
		assert!(store.register("u1", routes).await.is_err());
		assert_eq!(store.get_routes("u1").await.unwrap(), None);
	}

	#[tokio::test]
	async fn test_same_source_replaces() {
		let store = test_store(600);
		store.register("u1", vec![route("10.77.0.100", 443, "agent")]).await.unwrap();
		store.register("u1", vec![route("2.2.2.2", 443, "agent")]).await.unwrap();

		let routes = store.get_routes("u1").await.unwrap().unwrap();
		assert_eq!(routes.len(), 1);
		assert_eq!(routes[0].ip.as_ref(), "2.2.2.2");
	}

	#[tokio::test]
	async fn test_other_sources_untouched() {
		let store = test_store(600);
		store
			.register("u1", vec![route("1.1.1.1", 443, "agent"), route("2.2.2.2", 443, "tunnel")])
			.await
			.unwrap();
		store.register("u1", vec![route("3.3.3.3", 443, "agent")]).await.unwrap();

		let mut ips: Vec<&str> = Vec::new();
		let routes = store.get_routes("u1").await.unwrap().unwrap();
		for r in &routes {
			ips.push(&r.ip);
		}
		ips.sort_unstable();
		assert_eq!(ips, vec!["2.2.2.2", "3.3.3.3"]);
	}

	#[tokio::test]
	async fn test_dedup_keeps_last_occurrence() {
		let store = test_store(600);
		let mut first = route("1.1.1.1", 443, "agent");
		first.priority = 1;
		let second = route("9.9.9.9", 443, "agent");
		let mut third = route("1.1.1.1", 443, "agent");
		third.priority = 7;

		let registered =
			store.register("u1", vec![first, second, third]).await.unwrap();
		assert_eq!(registered.len(), 2);
		// last occurrence won, at the first occurrence's position
		assert_eq!(registered[0].ip.as_ref(), "1.1.1.1");
		assert_eq!(registered[0].priority, 7);
		assert_eq!(registered[1].ip.as_ref(), "9.9.9.9");
	}

	#[tokio::test]
	async fn test_scheme_distinguishes_routes() {
		let store = test_store(600);
		let mut http = route("1.1.1.1", 443, "agent");
		http.scheme = Some(RouteScheme::Http);
		let https = route("1.1.1.1", 443, "agent");

		let registered = store.register("u1", vec![http, https]).await.unwrap();
		assert_eq!(registered.len(), 2);
	}

	#[tokio::test]
	async fn test_register_refreshes_activity() {
		let store = test_store(600);
		store.register("u1", vec![route("1.1.1.1", 443, "agent")]).await.unwrap();
		assert!(store.activity.get_timestamp("u1").await.unwrap().is_some());
	}

	#[tokio::test]
	async fn test_delete_routes_idempotent() {
		let store = test_store(600);
		store.register("u1", vec![route("1.1.1.1", 443, "agent")]).await.unwrap();
		store.delete_routes("u1").await.unwrap();
		store.delete_routes("u1").await.unwrap();
		assert_eq!(store.get_routes("u1").await.unwrap(), None);
	}

	#[tokio::test(start_paused = true)]
	async fn test_reregister_refreshes_ttl() {
		let store = test_store(600);
		store.register("u1", vec![route("1.1.1.1", 443, "agent")]).await.unwrap();

		tokio::time::advance(std::time::Duration::from_secs(400)).await;
		assert!(store.get_routes_ttl("u1").await.unwrap() <= 200);

		// identical payload, but the lease window restarts in full
		store.register("u1", vec![route("1.1.1.1", 443, "agent")]).await.unwrap();
		assert!(store.get_routes_ttl("u1").await.unwrap() > 590);

		let routes = store.get_routes("u1").await.unwrap().unwrap();
		assert_eq!(routes.len(), 1);
		assert_eq!(routes[0].ip.as_ref(), "1.1.1.1");
	}

	#[tokio::test(start_paused = true)]
	async fn test_register_does_not_shorten_other_leases() {
		let store = test_store(600);
		store.register("u1", vec![route("1.1.1.1", 443, "agent")]).await.unwrap();

		tokio::time::advance(std::time::Duration::from_secs(300)).await;
		store.register("u1", vec![route("2.2.2.2", 443, "tunnel")]).await.unwrap();

		// agent keeps its older window, tunnel starts a fresh one, and the
		// reported TTL is the minimum across both
		let min_ttl = store.get_routes_ttl("u1").await.unwrap();
		assert!(min_ttl > 0 && min_ttl <= 300, "unexpected min ttl {}", min_ttl);

		tokio::time::advance(std::time::Duration::from_secs(350)).await;
		let routes = store.get_routes("u1").await.unwrap().unwrap();
		assert_eq!(routes.len(), 1);
		assert_eq!(routes[0].ip.as_ref(), "2.2.2.2");
	}

	#[test]
	fn test_unknown_wire_fields_are_tolerated() {
		let parsed: Route = serde_json::from_str(
			r#"{"ip":"10.0.0.1","port":443,"priority":1,"source":"agent","extra":"ignored"}"#,
		)
		.unwrap();
		assert!(validate_route(&parsed).is_ok());
	}

	#[tokio::test(start_paused = true)]
	async fn test_ttl_expiry_and_sentinel() {
		let store = test_store(2);
		store.register("u1", vec![route("1.1.1.1", 443, "agent")]).await.unwrap();
		assert!(store.get_routes_ttl("u1").await.unwrap() > 0);

		tokio::time::advance(std::time::Duration::from_secs(3)).await;

		assert_eq!(store.get_routes("u1").await.unwrap(), None);
		assert_eq!(store.get_routes_ttl("u1").await.unwrap(), TTL_NO_KEY);
	}

	#[tokio::test]
	async fn test_unknown_user_has_no_routes() {
		let store = test_store(600);
		store.register("u1", vec![route("1.1.1.1", 443, "agent")]).await.unwrap();
		assert_eq!(store.get_routes("stranger").await.unwrap(), None);
		assert_eq!(store.get_routes_ttl("stranger").await.unwrap(), TTL_NO_KEY);
	}

	#[test]
	fn test_route_wire_shape() {
		let parsed: Route = serde_json::from_str(
			r#"{"ip":"10.0.0.1","port":8443,"priority":2,"source":"agent",
			    "healthCheck":{"path":"/healthz","host":"edge"},"type":"ip"}"#,
		)
		.unwrap();
		assert_eq!(parsed.port, 8443);
		assert_eq!(parsed.effective_scheme(), RouteScheme::Https);

		let json = serde_json::to_value(&parsed).unwrap();
		// absent optionals stay absent on the wire
		assert!(json.get("scheme").is_none());
		assert!(json.get("domain").is_none());
		assert_eq!(json["healthCheck"]["path"], "/healthz");
	}
}

// vim: ts=4
