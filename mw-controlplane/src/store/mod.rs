//! The durable inventory: resources, services, middlewares, attachments, and
//! the mTLS/security singletons, behind a transactional SQLite connection.
//!
//! Modeled on the reference storage layer's `Database` wrapper: a single
//! connection, idempotent `CREATE TABLE IF NOT EXISTS` migrations run at
//! open time, and a `with_transaction` primitive that rolls back on error
//! or on a recovered panic rather than silently swallowing either.

use std::panic::{self, AssertUnwindSafe};

use rusqlite::Connection;
use thiserror::Error;
use tracing::info;

mod attachments;
mod datasource_config;
mod middlewares;
mod mtls;
mod resources;
mod schema;
mod security;
mod services;

pub use attachments::AttachmentsRepo;
pub use datasource_config::DataSourceConfigRepo;
pub use middlewares::MiddlewaresRepo;
pub use mtls::MtlsRepo;
pub use resources::{ResourceFilter, ResourcesRepo};
pub use security::SecurityRepo;
pub use services::ServicesRepo;

#[derive(Debug, Error)]
pub enum StoreError {
	#[error("not found: {0}")]
	NotFound(String),
	#[error("conflict: {0}")]
	Conflict(String),
	#[error("invalid data: {0}")]
	InvalidData(String),
	#[error("database connection error: {0}")]
	Connection(#[from] rusqlite::Error),
	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
	#[error("operation panicked: {0}")]
	Panicked(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub struct Store {
	conn: Connection,
}

impl Store {
	pub fn open(path: &std::path::Path) -> StoreResult<Self> {
		let conn = Connection::open(path)?;
		let store = Store { conn };
		schema::init(&store.conn)?;
		info!(path = %path.display(), "opened inventory store");
		Ok(store)
	}

	pub fn open_in_memory() -> StoreResult<Self> {
		let conn = Connection::open_in_memory()?;
		let store = Store { conn };
		schema::init(&store.conn)?;
		Ok(store)
	}

	pub fn conn(&self) -> &Connection {
		&self.conn
	}

	/// Runs `f` inside a transaction. Commits on `Ok`, rolls back on `Err`,
	/// and rolls back (then re-raises as `Panicked`) on a recovered panic —
	/// never swallows a failure.
	pub fn with_transaction<F, R>(&mut self, f: F) -> StoreResult<R>
	where
		F: FnOnce(&rusqlite::Transaction) -> StoreResult<R>,
	{
		let tx = self.conn.transaction()?;
		let result = panic::catch_unwind(AssertUnwindSafe(|| f(&tx)));
		match result {
			Ok(Ok(value)) => {
				tx.commit()?;
				Ok(value)
			}
			Ok(Err(e)) => {
				tx.rollback()?;
				Err(e)
			}
			Err(panic_payload) => {
				tx.rollback()?;
				let msg = panic_payload
					.downcast_ref::<&str>()
					.map(|s| s.to_string())
					.or_else(|| panic_payload.downcast_ref::<String>().cloned())
					.unwrap_or_else(|| "unknown panic".to_string());
				Err(StoreError::Panicked(msg))
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn open_in_memory_creates_schema() {
		let store = Store::open_in_memory().unwrap();
		let count: i64 = store
			.conn()
			.query_row("SELECT COUNT(*) FROM sqlite_master WHERE type='table'", [], |row| row.get(0))
			.unwrap();
		assert!(count >= 9);
	}

	#[test]
	fn with_transaction_rolls_back_on_error() {
		let mut store = Store::open_in_memory().unwrap();
		let result: StoreResult<()> = store.with_transaction(|tx| {
			tx.execute(
				"INSERT INTO middlewares (id, name, type, config) VALUES ('m1', 'm1', 'headers', '{}')",
				[],
			)?;
			Err(StoreError::InvalidData("simulated".into()))
		});
		assert!(result.is_err());
		let count: i64 = store.conn().query_row("SELECT COUNT(*) FROM middlewares", [], |row| row.get(0)).unwrap();
		assert_eq!(count, 0);
	}

	#[test]
	fn with_transaction_rolls_back_on_panic() {
		let mut store = Store::open_in_memory().unwrap();
		let result: StoreResult<()> = store.with_transaction(|tx| {
			tx.execute(
				"INSERT INTO middlewares (id, name, type, config) VALUES ('m1', 'm1', 'headers', '{}')",
				[],
			)?;
			panic!("boom");
		});
		assert!(matches!(result, Err(StoreError::Panicked(_))));
		let count: i64 = store.conn().query_row("SELECT COUNT(*) FROM middlewares", [], |row| row.get(0)).unwrap();
		assert_eq!(count, 0);
	}
}
