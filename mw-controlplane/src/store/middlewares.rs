use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::Value;

use crate::model::{DeletedTemplate, Middleware, TemplateKind};

use super::{StoreError, StoreResult};

pub struct MiddlewaresRepo;

fn row_to_middleware(row: &Row) -> rusqlite::Result<Middleware> {
	let config_str: String = row.get("config")?;
	let config: Value = serde_json::from_str(&config_str)
		.map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?;
	Ok(Middleware {
		id: row.get("id")?,
		name: row.get("name")?,
		type_: row.get("type")?,
		config,
	})
}

impl MiddlewaresRepo {
	pub fn list(conn: &Connection) -> StoreResult<Vec<Middleware>> {
		let mut stmt = conn.prepare("SELECT id, name, type, config FROM middlewares ORDER BY name")?;
		let rows = stmt.query_map([], row_to_middleware)?;
		let mut out = Vec::new();
		for r in rows {
			out.push(r?);
		}
		Ok(out)
	}

	pub fn get(conn: &Connection, id: &str) -> StoreResult<Middleware> {
		conn.query_row("SELECT id, name, type, config FROM middlewares WHERE id = ?1", params![id], row_to_middleware)
			.optional()?
			.ok_or_else(|| StoreError::NotFound(format!("middleware {id}")))
	}

	pub fn get_by_name(conn: &Connection, name: &str) -> StoreResult<Option<Middleware>> {
		Ok(conn
			.query_row("SELECT id, name, type, config FROM middlewares WHERE name = ?1", params![name], row_to_middleware)
			.optional()?)
	}

	/// Batched lookup keyed by id, for the merge engine's attachment resolution.
	pub fn get_many(conn: &Connection, ids: &[String]) -> StoreResult<std::collections::HashMap<String, Middleware>> {
		let mut out = std::collections::HashMap::new();
		for id in ids {
			if let Some(m) = conn
				.query_row("SELECT id, name, type, config FROM middlewares WHERE id = ?1", params![id], row_to_middleware)
				.optional()?
			{
				out.insert(id.clone(), m);
			}
		}
		Ok(out)
	}

	pub fn insert(conn: &Connection, m: &Middleware) -> StoreResult<()> {
		let existing = conn
			.query_row("SELECT 1 FROM middlewares WHERE name = ?1", params![m.name], |_| Ok(()))
			.optional()?;
		if existing.is_some() {
			return Err(StoreError::Conflict(format!("middleware name {} already exists", m.name)));
		}
		conn.execute(
			"INSERT INTO middlewares (id, name, type, config) VALUES (?1,?2,?3,?4)",
			params![m.id, m.name, m.type_, serde_json::to_string(&m.config)?],
		)?;
		Ok(())
	}

	pub fn update(conn: &Connection, m: &Middleware) -> StoreResult<()> {
		let changed = conn.execute(
			"UPDATE middlewares SET name=?2, type=?3, config=?4 WHERE id=?1",
			params![m.id, m.name, m.type_, serde_json::to_string(&m.config)?],
		)?;
		if changed == 0 {
			return Err(StoreError::NotFound(format!("middleware {}", m.id)));
		}
		Ok(())
	}

	/// Deletes the middleware and writes a tombstone in the same call so a
	/// subsequent reconciler cycle does not resurrect the concept.
	pub fn delete(conn: &Connection, id: &str) -> StoreResult<()> {
		let changed = conn.execute("DELETE FROM middlewares WHERE id = ?1", params![id])?;
		if changed == 0 {
			return Err(StoreError::NotFound(format!("middleware {id}")));
		}
		conn.execute(
			"INSERT OR IGNORE INTO deleted_templates (id, type) VALUES (?1, ?2)",
			params![id, TemplateKind::Middleware.as_str()],
		)?;
		Ok(())
	}

	pub fn is_tombstoned(conn: &Connection, id: &str, kind: TemplateKind) -> StoreResult<bool> {
		Ok(conn
			.query_row(
				"SELECT 1 FROM deleted_templates WHERE id = ?1 AND type = ?2",
				params![id, kind.as_str()],
				|_| Ok(()),
			)
			.optional()?
			.is_some())
	}

	pub fn list_tombstones(conn: &Connection) -> StoreResult<Vec<DeletedTemplate>> {
		let mut stmt = conn.prepare("SELECT id, type FROM deleted_templates")?;
		let rows = stmt.query_map([], |row| {
			let kind_str: String = row.get("type")?;
			Ok(DeletedTemplate {
				id: row.get("id")?,
				kind: match kind_str.as_str() {
					"service" => TemplateKind::Service,
					"resource" => TemplateKind::Resource,
					_ => TemplateKind::Middleware,
				},
			})
		})?;
		let mut out = Vec::new();
		for r in rows {
			out.push(r?);
		}
		Ok(out)
	}
}
