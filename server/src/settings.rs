//! Process configuration. All knobs come from the environment; invalid
//! values fail startup instead of being silently defaulted.

use std::env;
use std::path::PathBuf;

use crate::prelude::*;

pub const DEFAULT_LISTEN: &str = "0.0.0.0:8192";
pub const DEFAULT_ROUTES_TTL_SECONDS: u64 = 600;
pub const DEFAULT_INACTIVE_DOMAIN_DAYS: u32 = 30;
pub const DEFAULT_DOMAIN_LOG_PATH: &str = "logs/domain-events.log";
pub const DEFAULT_CLEANUP_CRON_SCHEDULE: &str = "0 3 * * *";
pub const DEFAULT_CA_CERT_PATH: &str = "ca-cert.pem";
pub const DEFAULT_CA_KEY_PATH: &str = "ca-key.pem";
pub const DEFAULT_CERT_VALIDITY_HOURS: u32 = 72;
/// A user counts as online when the last heartbeat is at most this old.
pub const ONLINE_THRESHOLD_SECONDS: i64 = 120;

#[derive(Debug, Clone)]
pub struct Opts {
	pub listen: Box<str>,
	/// Apex domain the router serves; also the wildcard SAN base.
	pub server_domain: Box<str>,
	pub routes_ttl_seconds: u64,
	pub inactive_domain_days: u32,
	pub domain_log_path: PathBuf,
	pub cleanup_cron_schedule: Box<str>,
	pub ca_cert_path: PathBuf,
	pub ca_key_path: PathBuf,
	pub cert_validity_hours: u32,
	pub service_api_key: Option<Box<str>>,
}

impl Opts {
	/// Build options from the environment. `SERVER_DOMAIN` is the only
	/// hard requirement; everything else has a documented default.
	pub fn from_env() -> ClResult<Self> {
		let server_domain = env::var("SERVER_DOMAIN")
			.map_err(|_| Error::ConfigError("SERVER_DOMAIN must be set".into()))?;
		if server_domain.trim().is_empty() {
			return Err(Error::ConfigError("SERVER_DOMAIN must not be empty".into()));
		}

		let routes_ttl_seconds = match env::var("ROUTES_TTL_SECONDS") {
			Ok(raw) => match raw.parse::<u64>() {
				Ok(ttl) if ttl > 0 => ttl,
				_ => {
					return Err(Error::ConfigError(format!(
						"ROUTES_TTL_SECONDS must be a positive integer, got '{}'",
						raw
					)));
				}
			},
			Err(_) => DEFAULT_ROUTES_TTL_SECONDS,
		};

		let inactive_domain_days = match env::var("INACTIVE_DOMAIN_DAYS") {
			Ok(raw) => raw.parse::<u32>().map_err(|_| {
				Error::ConfigError(format!(
					"INACTIVE_DOMAIN_DAYS must be an integer, got '{}'",
					raw
				))
			})?,
			Err(_) => DEFAULT_INACTIVE_DOMAIN_DAYS,
		};

		let cert_validity_hours = match env::var("CERT_VALIDITY_HOURS") {
			Ok(raw) => match raw.parse::<u32>() {
				Ok(hours) if hours > 0 => hours,
				_ => {
					return Err(Error::ConfigError(format!(
						"CERT_VALIDITY_HOURS must be a positive integer, got '{}'",
						raw
					)));
				}
			},
			Err(_) => DEFAULT_CERT_VALIDITY_HOURS,
		};

		Ok(Opts {
			listen: env::var("LISTEN").unwrap_or_else(|_| DEFAULT_LISTEN.into()).into(),
			server_domain: server_domain.into(),
			routes_ttl_seconds,
			inactive_domain_days,
			domain_log_path: env::var("DOMAIN_LOG_PATH")
				.unwrap_or_else(|_| DEFAULT_DOMAIN_LOG_PATH.into())
				.into(),
			cleanup_cron_schedule: env::var("CLEANUP_CRON_SCHEDULE")
				.unwrap_or_else(|_| DEFAULT_CLEANUP_CRON_SCHEDULE.into())
				.into(),
			ca_cert_path: env::var("CA_CERT_PATH")
				.unwrap_or_else(|_| DEFAULT_CA_CERT_PATH.into())
				.into(),
			ca_key_path: env::var("CA_KEY_PATH")
				.unwrap_or_else(|_| DEFAULT_CA_KEY_PATH.into())
				.into(),
			cert_validity_hours,
			service_api_key: env::var("SERVICE_API_KEY").ok().map(Into::into),
		})
	}
}

impl Default for Opts {
	fn default() -> Self {
		Opts {
			listen: DEFAULT_LISTEN.into(),
			server_domain: "".into(),
			routes_ttl_seconds: DEFAULT_ROUTES_TTL_SECONDS,
			inactive_domain_days: DEFAULT_INACTIVE_DOMAIN_DAYS,
			domain_log_path: DEFAULT_DOMAIN_LOG_PATH.into(),
			cleanup_cron_schedule: DEFAULT_CLEANUP_CRON_SCHEDULE.into(),
			ca_cert_path: DEFAULT_CA_CERT_PATH.into(),
			ca_key_path: DEFAULT_CA_KEY_PATH.into(),
			cert_validity_hours: DEFAULT_CERT_VALIDITY_HOURS,
			service_api_key: None,
		}
	}
}

// vim: ts=4
