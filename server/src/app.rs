//! App state type and server builder.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::activity::ActivityTracker;
use crate::audit::AuditLog;
use crate::auth::token::IdentityTokenVerifier;
use crate::ca::CertificateAuthority;
use crate::cleanup::DomainCleanupTask;
use crate::identity_adapter::IdentityAdapter;
use crate::prelude::*;
use crate::route::RouteStore;
use crate::routes;
use crate::scheduler::{CronSchedule, Scheduler};
use crate::settings::Opts;
use crate::store_adapter::StoreAdapter;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug)]
pub struct AppState {
	pub opts: Opts,

	pub identity_adapter: Arc<dyn IdentityAdapter>,
	pub store_adapter: Arc<dyn StoreAdapter>,

	pub routes: RouteStore,
	pub activity: ActivityTracker,
	pub audit: AuditLog,
	/// Written once before the server accepts requests; None only when a
	/// build explicitly skips CA initialization.
	pub ca: Option<Arc<CertificateAuthority>>,
	pub token_verifier: Option<Arc<dyn IdentityTokenVerifier>>,
}

pub type App = Arc<AppState>;

pub struct Adapters {
	pub identity_adapter: Option<Arc<dyn IdentityAdapter>>,
	pub store_adapter: Option<Arc<dyn StoreAdapter>>,
}

pub struct Builder {
	opts: Opts,
	adapters: Adapters,
	token_verifier: Option<Arc<dyn IdentityTokenVerifier>>,
	init_ca: bool,
}

impl Builder {
	pub fn new(opts: Opts) -> Self {
		Builder {
			opts,
			adapters: Adapters { identity_adapter: None, store_adapter: None },
			token_verifier: None,
			init_ca: true,
		}
	}

	/// Builder with options read from the environment.
	pub fn from_env() -> ClResult<Self> {
		Ok(Self::new(Opts::from_env()?))
	}

	// Adapters
	pub fn identity_adapter(mut self, adapter: Arc<dyn IdentityAdapter>) -> Self {
		self.adapters.identity_adapter = Some(adapter);
		self
	}
	pub fn store_adapter(mut self, adapter: Arc<dyn StoreAdapter>) -> Self {
		self.adapters.store_adapter = Some(adapter);
		self
	}
	pub fn token_verifier(mut self, verifier: Arc<dyn IdentityTokenVerifier>) -> Self {
		self.token_verifier = Some(verifier);
		self
	}
	/// Skip CA bootstrap. Certificate endpoints answer 503.
	pub fn without_ca(mut self) -> Self {
		self.init_ca = false;
		self
	}

	/// Assemble the shared application state. CA bootstrap happens here,
	/// before any request can be served.
	pub async fn build(self) -> ClResult<App> {
		let identity_adapter = self
			.adapters
			.identity_adapter
			.ok_or(Error::ConfigError("no identity adapter configured".into()))?;
		let store_adapter = self
			.adapters
			.store_adapter
			.ok_or(Error::ConfigError("no store adapter configured".into()))?;

		let ca = if self.init_ca {
			Some(Arc::new(CertificateAuthority::init(&self.opts).await?))
		} else {
			None
		};

		let activity = ActivityTracker::new(store_adapter.clone());
		let routes = RouteStore::new(
			store_adapter.clone(),
			activity.clone(),
			self.opts.routes_ttl_seconds,
		);
		let audit = AuditLog::new(self.opts.domain_log_path.clone());

		Ok(Arc::new(AppState {
			opts: self.opts,
			identity_adapter,
			store_adapter,
			routes,
			activity,
			audit,
			ca,
			token_verifier: self.token_verifier,
		}))
	}

	pub async fn run(self) -> ClResult<()> {
		tracing_subscriber::fmt()
			.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
			.with_target(false)
			.init();

		let app = self.build().await?;
		info!("nsl-router {} starting", VERSION);

		let mut scheduler = Scheduler::new();
		scheduler.register(
			CronSchedule::parse(&app.opts.cleanup_cron_schedule)?,
			DomainCleanupTask::new(),
		);
		scheduler.start(app.clone());

		let router = routes::init(app.clone());
		let listener = tokio::net::TcpListener::bind(app.opts.listen.as_ref()).await?;
		info!("Listening on {}", app.opts.listen);
		axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
			.await?;

		Ok(())
	}
}

// vim: ts=4
