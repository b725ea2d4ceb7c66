use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::model::{MtlsClient, MtlsConfig, MtlsOverlay};

use super::{StoreError, StoreResult};

pub struct MtlsRepo;

fn row_to_config(row: &Row) -> rusqlite::Result<MtlsConfig> {
	let overlay_str: Option<String> = row.get("overlay_template")?;
	let overlay_template = overlay_str
		.map(|s| serde_json::from_str::<MtlsOverlay>(&s))
		.transpose()
		.map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?
		.unwrap_or_default();
	let ca_expiry: Option<String> = row.get("ca_expiry")?;
	Ok(MtlsConfig {
		enabled: row.get::<_, i64>("enabled")? != 0,
		has_ca: row.get::<_, i64>("has_ca")? != 0,
		ca_subject: row.get("ca_subject")?,
		ca_expiry: ca_expiry.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|d| d.with_timezone(&Utc)),
		ca_cert_path: row.get("ca_cert_path")?,
		certs_base_path: row.get("certs_base_path")?,
		overlay_template,
	})
}

fn row_to_client(row: &Row) -> rusqlite::Result<MtlsClient> {
	let expiry_str: String = row.get("expiry")?;
	let revoked_at_str: Option<String> = row.get("revoked_at")?;
	Ok(MtlsClient {
		id: row.get("id")?,
		name: row.get("name")?,
		subject: row.get("subject")?,
		expiry: DateTime::parse_from_rfc3339(&expiry_str)
			.map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?
			.with_timezone(&Utc),
		revoked: row.get::<_, i64>("revoked")? != 0,
		revoked_at: revoked_at_str.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|d| d.with_timezone(&Utc)),
		cert_pem: row.get("cert_pem")?,
		encrypted_key_pem: row.get("encrypted_key_pem")?,
		p12_bundle: row.get("p12_bundle")?,
		p12_password_hash: row.get("p12_password_hash")?,
	})
}

impl MtlsRepo {
	/// Loads the singleton config, seeding a default row if this is a fresh database.
	pub fn get_config(conn: &Connection) -> StoreResult<MtlsConfig> {
		let existing = conn
			.query_row(
				"SELECT enabled, has_ca, ca_subject, ca_expiry, ca_cert_path, certs_base_path, overlay_template \
				 FROM mtls_config WHERE id = 1",
				[],
				row_to_config,
			)
			.optional()?;
		if let Some(cfg) = existing {
			return Ok(cfg);
		}
		let default = MtlsConfig::default();
		Self::save_config(conn, &default)?;
		Ok(default)
	}

	pub fn save_config(conn: &Connection, cfg: &MtlsConfig) -> StoreResult<()> {
		conn.execute(
			"INSERT INTO mtls_config (id, enabled, has_ca, ca_subject, ca_expiry, ca_cert_path, certs_base_path, overlay_template) \
			 VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7) \
			 ON CONFLICT(id) DO UPDATE SET enabled=excluded.enabled, has_ca=excluded.has_ca, ca_subject=excluded.ca_subject, \
			 ca_expiry=excluded.ca_expiry, ca_cert_path=excluded.ca_cert_path, certs_base_path=excluded.certs_base_path, \
			 overlay_template=excluded.overlay_template",
			params![
				cfg.enabled as i64,
				cfg.has_ca as i64,
				cfg.ca_subject,
				cfg.ca_expiry.map(|d| d.to_rfc3339()),
				cfg.ca_cert_path,
				cfg.certs_base_path,
				serde_json::to_string(&cfg.overlay_template)?,
			],
		)?;
		Ok(())
	}

	pub fn list_clients(conn: &Connection) -> StoreResult<Vec<MtlsClient>> {
		let mut stmt = conn.prepare(
			"SELECT id, name, subject, expiry, revoked, revoked_at, cert_pem, encrypted_key_pem, p12_bundle, p12_password_hash \
			 FROM mtls_clients ORDER BY name",
		)?;
		let rows = stmt.query_map([], row_to_client)?;
		let mut out = Vec::new();
		for r in rows {
			out.push(r?);
		}
		Ok(out)
	}

	pub fn get_client(conn: &Connection, id: &str) -> StoreResult<MtlsClient> {
		conn.query_row(
			"SELECT id, name, subject, expiry, revoked, revoked_at, cert_pem, encrypted_key_pem, p12_bundle, p12_password_hash \
			 FROM mtls_clients WHERE id = ?1",
			params![id],
			row_to_client,
		)
		.optional()?
		.ok_or_else(|| StoreError::NotFound(format!("mTLS client {id}")))
	}

	pub fn name_exists(conn: &Connection, name: &str) -> StoreResult<bool> {
		Ok(conn
			.query_row("SELECT 1 FROM mtls_clients WHERE name = ?1", params![name], |_| Ok(()))
			.optional()?
			.is_some())
	}

	pub fn insert_client(conn: &Connection, c: &MtlsClient) -> StoreResult<()> {
		conn.execute(
			"INSERT INTO mtls_clients (id, name, subject, expiry, revoked, revoked_at, cert_pem, encrypted_key_pem, p12_bundle, p12_password_hash) \
			 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
			params![
				c.id,
				c.name,
				c.subject,
				c.expiry.to_rfc3339(),
				c.revoked as i64,
				c.revoked_at.map(|d| d.to_rfc3339()),
				c.cert_pem,
				c.encrypted_key_pem,
				c.p12_bundle,
				c.p12_password_hash,
			],
		)?;
		Ok(())
	}

	/// Idempotent: a revoke against an already-revoked client succeeds as a no-op.
	pub fn revoke_client(conn: &Connection, id: &str, at: DateTime<Utc>) -> StoreResult<()> {
		let changed = conn.execute(
			"UPDATE mtls_clients SET revoked = 1, revoked_at = COALESCE(revoked_at, ?2) WHERE id = ?1",
			params![id, at.to_rfc3339()],
		)?;
		if changed == 0 {
			return Err(StoreError::NotFound(format!("mTLS client {id}")));
		}
		Ok(())
	}

	pub fn delete_client(conn: &Connection, id: &str) -> StoreResult<()> {
		let changed = conn.execute("DELETE FROM mtls_clients WHERE id = ?1", params![id])?;
		if changed == 0 {
			return Err(StoreError::NotFound(format!("mTLS client {id}")));
		}
		Ok(())
	}

	/// Removes every client row. Used by `DeleteCA`, which cascades in the
	/// same transaction as clearing `has_ca`.
	pub fn delete_all_clients(conn: &Connection) -> StoreResult<()> {
		conn.execute("DELETE FROM mtls_clients", [])?;
		Ok(())
	}
}
