use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::model::{DataSourceConfig, DataSourceType};

use super::{StoreError, StoreResult};

pub struct DataSourceConfigRepo;

fn row_to_config(row: &Row) -> rusqlite::Result<DataSourceConfig> {
	let type_str: String = row.get("type")?;
	Ok(DataSourceConfig {
		name: row.get("name")?,
		type_: DataSourceType::parse(&type_str).unwrap_or(DataSourceType::RouterCentric),
		url: row.get("url")?,
		basic_auth_user: row.get("basic_auth_user")?,
		basic_auth_password: row.get("basic_auth_password")?,
		active: row.get::<_, i64>("active")? != 0,
	})
}

impl DataSourceConfigRepo {
	pub fn list(conn: &Connection) -> StoreResult<Vec<DataSourceConfig>> {
		let mut stmt = conn.prepare("SELECT name, type, url, basic_auth_user, basic_auth_password, active FROM datasource_configs ORDER BY name")?;
		let rows = stmt.query_map([], row_to_config)?;
		let mut out = Vec::new();
		for r in rows {
			out.push(r?);
		}
		Ok(out)
	}

	pub fn get(conn: &Connection, name: &str) -> StoreResult<DataSourceConfig> {
		conn.query_row(
			"SELECT name, type, url, basic_auth_user, basic_auth_password, active FROM datasource_configs WHERE name = ?1",
			params![name],
			row_to_config,
		)
		.optional()?
		.ok_or_else(|| StoreError::NotFound(format!("data source {name}")))
	}

	/// Returns the one config with `active = true`, if any exists yet.
	pub fn active(conn: &Connection) -> StoreResult<Option<DataSourceConfig>> {
		Ok(conn
			.query_row(
				"SELECT name, type, url, basic_auth_user, basic_auth_password, active FROM datasource_configs WHERE active = 1",
				[],
				row_to_config,
			)
			.optional()?)
	}

	pub fn upsert(conn: &Connection, cfg: &DataSourceConfig) -> StoreResult<()> {
		conn.execute(
			"INSERT INTO datasource_configs (name, type, url, basic_auth_user, basic_auth_password, active) \
			 VALUES (?1,?2,?3,?4,?5,?6) \
			 ON CONFLICT(name) DO UPDATE SET type=excluded.type, url=excluded.url, \
			 basic_auth_user=excluded.basic_auth_user, basic_auth_password=excluded.basic_auth_password, \
			 active=excluded.active",
			params![
				cfg.name,
				cfg.type_.as_str(),
				cfg.url,
				cfg.basic_auth_user,
				cfg.basic_auth_password,
				cfg.active as i64,
			],
		)?;
		Ok(())
	}

	/// Marks `name` as the sole active data source; every other row is demoted
	/// in the same statement so exactly one `active=1` row ever exists.
	pub fn set_active(conn: &Connection, name: &str) -> StoreResult<()> {
		let exists = conn
			.query_row("SELECT 1 FROM datasource_configs WHERE name = ?1", params![name], |_| Ok(()))
			.optional()?
			.is_some();
		if !exists {
			return Err(StoreError::NotFound(format!("data source {name}")));
		}
		conn.execute("UPDATE datasource_configs SET active = (name = ?1)", params![name])?;
		Ok(())
	}
}
