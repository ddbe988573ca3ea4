use std::env;
use std::sync::Arc;

use identity_adapter_sqlite::IdentityAdapterSqlite;
use store_adapter_redis::StoreAdapterRedis;

#[tokio::main]
async fn main() {
	if let Err(e) = run().await {
		eprintln!("FATAL: {}", e);
		std::process::exit(1);
	}
}

async fn run() -> nsl_router::ClResult<()> {
	let store_url = env::var("STORE_URL")
		.map_err(|_| nsl_router::Error::ConfigError("STORE_URL must be set".into()))?;
	let identity_db_path =
		env::var("IDENTITY_DB_PATH").unwrap_or_else(|_| "./data/identity.db".to_string());
	if let Some(parent) = std::path::Path::new(&identity_db_path).parent() {
		std::fs::create_dir_all(parent)?;
	}

	let identity_adapter = Arc::new(IdentityAdapterSqlite::new(&identity_db_path).await?);
	let store_adapter = Arc::new(StoreAdapterRedis::new(&store_url).await?);

	nsl_router::Builder::from_env()?
		.identity_adapter(identity_adapter)
		.store_adapter(store_adapter)
		.run()
		.await
}

// vim: ts=4
