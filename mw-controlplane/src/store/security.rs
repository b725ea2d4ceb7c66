use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::model::{SecurityConfig, SecurityHeaders};

use super::StoreResult;

pub struct SecurityRepo;

fn row_to_config(row: &Row) -> rusqlite::Result<SecurityConfig> {
	let headers_str: String = row.get("headers")?;
	let headers: SecurityHeaders = serde_json::from_str(&headers_str)
		.map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?;
	Ok(SecurityConfig {
		tls_hardening_enabled: row.get::<_, i64>("tls_hardening_enabled")? != 0,
		secure_headers_enabled: row.get::<_, i64>("secure_headers_enabled")? != 0,
		headers,
	})
}

impl SecurityRepo {
	/// Loads the singleton config, seeding the default posture on first read.
	pub fn get(conn: &Connection) -> StoreResult<SecurityConfig> {
		let existing = conn
			.query_row(
				"SELECT tls_hardening_enabled, secure_headers_enabled, headers FROM security_config WHERE id = 1",
				[],
				row_to_config,
			)
			.optional()?;
		if let Some(cfg) = existing {
			return Ok(cfg);
		}
		let default = SecurityConfig::default();
		Self::save(conn, &default)?;
		Ok(default)
	}

	pub fn save(conn: &Connection, cfg: &SecurityConfig) -> StoreResult<()> {
		conn.execute(
			"INSERT INTO security_config (id, tls_hardening_enabled, secure_headers_enabled, headers) \
			 VALUES (1, ?1, ?2, ?3) \
			 ON CONFLICT(id) DO UPDATE SET tls_hardening_enabled=excluded.tls_hardening_enabled, \
			 secure_headers_enabled=excluded.secure_headers_enabled, headers=excluded.headers",
			params![
				cfg.tls_hardening_enabled as i64,
				cfg.secure_headers_enabled as i64,
				serde_json::to_string(&cfg.headers)?,
			],
		)?;
		Ok(())
	}
}
