//! SQLite-backed identity adapter. One row per user id in the
//! `nsl_router` table, with an index on the owned domain label.

use async_trait::async_trait;
use sqlx::{
	Row,
	sqlite::{self, SqlitePool, SqliteRow},
};
use std::path::Path;

use nsl_router::identity_adapter::{IdentityAdapter, IdentityPatch, IdentityRecord};
use nsl_router::prelude::*;

fn inspect(err: &sqlx::Error) {
	warn!("DB: {:#?}", err);
}

fn map_record(row: &SqliteRow) -> IdentityRecord {
	IdentityRecord {
		domain_name: row.get("domain_name"),
		server_domain: row.get("server_domain"),
		public_key: row.get("public_key"),
		last_seen_online: row.get::<Option<i64>, _>("last_seen_online").map(Timestamp),
		last_route_registration: row
			.get::<Option<i64>, _>("last_route_registration")
			.map(Timestamp),
	}
}

/// Append one patched column to a dynamic UPDATE. Returns whether a
/// fragment was written.
fn push_patch<'a>(
	query: &mut sqlx::QueryBuilder<'a, sqlx::Sqlite>,
	has_updates: bool,
	field: &str,
	patch: &'a Patch<Box<str>>,
) -> bool {
	match patch {
		Patch::Undefined => has_updates,
		Patch::Null => {
			if has_updates {
				query.push(", ");
			}
			query.push(field).push("=NULL");
			true
		}
		Patch::Value(v) => {
			if has_updates {
				query.push(", ");
			}
			query.push(field).push("=").push_bind(v.as_ref());
			true
		}
	}
}

fn push_patch_ts(
	query: &mut sqlx::QueryBuilder<'_, sqlx::Sqlite>,
	has_updates: bool,
	field: &str,
	patch: &Patch<Timestamp>,
) -> bool {
	match patch {
		Patch::Undefined => has_updates,
		Patch::Null => {
			if has_updates {
				query.push(", ");
			}
			query.push(field).push("=NULL");
			true
		}
		Patch::Value(ts) => {
			if has_updates {
				query.push(", ");
			}
			query.push(field).push("=").push_bind(ts.0);
			true
		}
	}
}

#[derive(Debug)]
pub struct IdentityAdapterSqlite {
	db: SqlitePool,
}

impl IdentityAdapterSqlite {
	pub async fn new(path: impl AsRef<Path>) -> ClResult<Self> {
		let opts = sqlite::SqliteConnectOptions::new()
			.filename(path.as_ref())
			.create_if_missing(true)
			.journal_mode(sqlite::SqliteJournalMode::Wal);
		let db = sqlite::SqlitePoolOptions::new()
			.max_connections(5)
			.connect_with(opts)
			.await
			.inspect_err(inspect)
			.or(Err(Error::DbError))?;

		init_db(&db).await.inspect_err(inspect).or(Err(Error::DbError))?;
		Ok(Self { db })
	}

	/// Private in-memory database, mainly for tests. A single connection
	/// keeps the database alive and consistent.
	pub async fn new_in_memory() -> ClResult<Self> {
		let opts = sqlite::SqliteConnectOptions::new().in_memory(true);
		let db = sqlite::SqlitePoolOptions::new()
			.max_connections(1)
			.idle_timeout(None)
			.max_lifetime(None)
			.connect_with(opts)
			.await
			.inspect_err(inspect)
			.or(Err(Error::DbError))?;

		init_db(&db).await.inspect_err(inspect).or(Err(Error::DbError))?;
		Ok(Self { db })
	}
}

#[async_trait]
impl IdentityAdapter for IdentityAdapterSqlite {
	async fn read_identity(&self, user_id: &str) -> ClResult<Option<IdentityRecord>> {
		let row = sqlx::query(
			"SELECT domain_name, server_domain, public_key, last_seen_online,
				last_route_registration
			FROM nsl_router WHERE user_id = ?",
		)
		.bind(user_id)
		.fetch_optional(&self.db)
		.await
		.inspect_err(inspect)
		.or(Err(Error::DbError))?;

		Ok(row.as_ref().map(map_record))
	}

	async fn find_by_domain(
		&self,
		domain: &str,
	) -> ClResult<Option<(Box<str>, IdentityRecord)>> {
		let row = sqlx::query(
			"SELECT user_id, domain_name, server_domain, public_key, last_seen_online,
				last_route_registration
			FROM nsl_router WHERE domain_name = ?",
		)
		.bind(domain)
		.fetch_optional(&self.db)
		.await
		.inspect_err(inspect)
		.or(Err(Error::DbError))?;

		Ok(row.as_ref().map(|row| (row.get::<String, _>("user_id").into(), map_record(row))))
	}

	async fn merge_identity(&self, user_id: &str, patch: &IdentityPatch) -> ClResult<()> {
		if patch.is_empty() {
			return Err(Error::ValidationError("empty identity update".into()));
		}

		// Ensure the row exists, then apply the merge as a dynamic UPDATE
		sqlx::query("INSERT OR IGNORE INTO nsl_router (user_id) VALUES (?)")
			.bind(user_id)
			.execute(&self.db)
			.await
			.inspect_err(inspect)
			.or(Err(Error::DbError))?;

		let mut query = sqlx::QueryBuilder::new("UPDATE nsl_router SET ");
		let mut has_updates = false;
		has_updates = push_patch(&mut query, has_updates, "domain_name", &patch.domain_name);
		has_updates =
			push_patch(&mut query, has_updates, "server_domain", &patch.server_domain);
		has_updates = push_patch(&mut query, has_updates, "public_key", &patch.public_key);
		has_updates =
			push_patch_ts(&mut query, has_updates, "last_seen_online", &patch.last_seen_online);
		has_updates = push_patch_ts(
			&mut query,
			has_updates,
			"last_route_registration",
			&patch.last_route_registration,
		);
		debug_assert!(has_updates);

		query.push(" WHERE user_id = ").push_bind(user_id);
		query
			.build()
			.execute(&self.db)
			.await
			.inspect_err(inspect)
			.or(Err(Error::DbError))?;
		Ok(())
	}

	async fn delete_identity(&self, user_id: &str) -> ClResult<()> {
		sqlx::query("DELETE FROM nsl_router WHERE user_id = ?")
			.bind(user_id)
			.execute(&self.db)
			.await
			.inspect_err(inspect)
			.or(Err(Error::DbError))?;
		Ok(())
	}
}

async fn init_db(db: &SqlitePool) -> Result<(), sqlx::Error> {
	let mut tx = db.begin().await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS nsl_router (
		user_id text NOT NULL,
		domain_name text,
		server_domain text,
		public_key text,
		last_seen_online integer,
		last_route_registration integer,
		PRIMARY KEY(user_id)
	)",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query("CREATE INDEX IF NOT EXISTS idx_nsl_router_domain ON nsl_router (domain_name)")
		.execute(&mut *tx)
		.await?;

	tx.commit().await?;
	Ok(())
}


// vim: ts=4
