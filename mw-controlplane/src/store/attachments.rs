use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::model::{ResourceExternalMiddleware, ResourceMiddleware, ResourceService};

use super::{StoreError, StoreResult};

pub struct AttachmentsRepo;

fn row_to_internal(row: &Row) -> rusqlite::Result<ResourceMiddleware> {
	Ok(ResourceMiddleware {
		id: row.get("id")?,
		resource_id: row.get("resource_id")?,
		middleware_id: row.get("middleware_id")?,
		priority: row.get("priority")?,
	})
}

fn row_to_external(row: &Row) -> rusqlite::Result<ResourceExternalMiddleware> {
	Ok(ResourceExternalMiddleware {
		id: row.get("id")?,
		resource_id: row.get("resource_id")?,
		middleware_name: row.get("middleware_name")?,
		provider: row.get("provider")?,
		priority: row.get("priority")?,
	})
}

impl AttachmentsRepo {
	/// Internal attachments for one resource, ordered by priority descending
	/// with ties broken by attachment id ascending — the merge engine's total order.
	pub fn list_internal(conn: &Connection, resource_id: &str) -> StoreResult<Vec<ResourceMiddleware>> {
		let mut stmt = conn.prepare(
			"SELECT id, resource_id, middleware_id, priority FROM resource_middlewares \
			 WHERE resource_id = ?1 ORDER BY priority DESC, id ASC",
		)?;
		let rows = stmt.query_map(params![resource_id], row_to_internal)?;
		let mut out = Vec::new();
		for r in rows {
			out.push(r?);
		}
		Ok(out)
	}

	pub fn list_external(conn: &Connection, resource_id: &str) -> StoreResult<Vec<ResourceExternalMiddleware>> {
		let mut stmt = conn.prepare(
			"SELECT id, resource_id, middleware_name, provider, priority FROM resource_external_middlewares \
			 WHERE resource_id = ?1 ORDER BY priority DESC, id ASC",
		)?;
		let rows = stmt.query_map(params![resource_id], row_to_external)?;
		let mut out = Vec::new();
		for r in rows {
			out.push(r?);
		}
		Ok(out)
	}

	/// Batched internal-attachment loading keyed by resource id, for the merge
	/// engine's per-cycle resolution of every active resource at once.
	pub fn list_internal_for_many(
		conn: &Connection,
		resource_ids: &[String],
	) -> StoreResult<HashMap<String, Vec<ResourceMiddleware>>> {
		let mut out: HashMap<String, Vec<ResourceMiddleware>> = HashMap::new();
		for id in resource_ids {
			out.insert(id.clone(), Self::list_internal(conn, id)?);
		}
		Ok(out)
	}

	pub fn list_external_for_many(
		conn: &Connection,
		resource_ids: &[String],
	) -> StoreResult<HashMap<String, Vec<ResourceExternalMiddleware>>> {
		let mut out: HashMap<String, Vec<ResourceExternalMiddleware>> = HashMap::new();
		for id in resource_ids {
			out.insert(id.clone(), Self::list_external(conn, id)?);
		}
		Ok(out)
	}

	pub fn attach_internal(conn: &Connection, resource_id: &str, middleware_id: &str, priority: i64) -> StoreResult<()> {
		let priority = crate::model::clamp_priority(priority);
		conn.execute(
			"INSERT INTO resource_middlewares (resource_id, middleware_id, priority) VALUES (?1,?2,?3) \
			 ON CONFLICT(resource_id, middleware_id) DO UPDATE SET priority=excluded.priority",
			params![resource_id, middleware_id, priority],
		)?;
		Ok(())
	}

	pub fn detach_internal(conn: &Connection, resource_id: &str, middleware_id: &str) -> StoreResult<()> {
		let changed = conn.execute(
			"DELETE FROM resource_middlewares WHERE resource_id = ?1 AND middleware_id = ?2",
			params![resource_id, middleware_id],
		)?;
		if changed == 0 {
			return Err(StoreError::NotFound(format!("attachment {resource_id}/{middleware_id}")));
		}
		Ok(())
	}

	pub fn attach_external(
		conn: &Connection,
		resource_id: &str,
		middleware_name: &str,
		provider: &str,
		priority: i64,
	) -> StoreResult<()> {
		let priority = crate::model::clamp_priority(priority);
		conn.execute(
			"INSERT INTO resource_external_middlewares (resource_id, middleware_name, provider, priority) VALUES (?1,?2,?3,?4) \
			 ON CONFLICT(resource_id, middleware_name, provider) DO UPDATE SET priority=excluded.priority",
			params![resource_id, middleware_name, provider, priority],
		)?;
		Ok(())
	}

	pub fn detach_external(conn: &Connection, resource_id: &str, middleware_name: &str, provider: &str) -> StoreResult<()> {
		let changed = conn.execute(
			"DELETE FROM resource_external_middlewares WHERE resource_id = ?1 AND middleware_name = ?2 AND provider = ?3",
			params![resource_id, middleware_name, provider],
		)?;
		if changed == 0 {
			return Err(StoreError::NotFound(format!("external attachment {resource_id}/{middleware_name}@{provider}")));
		}
		Ok(())
	}

	pub fn get_service_override(conn: &Connection, resource_id: &str) -> StoreResult<Option<ResourceService>> {
		Ok(conn
			.query_row(
				"SELECT resource_id, service_id FROM resource_services WHERE resource_id = ?1",
				params![resource_id],
				|row| {
					Ok(ResourceService {
						resource_id: row.get("resource_id")?,
						service_id: row.get("service_id")?,
					})
				},
			)
			.optional()?)
	}

	pub fn list_service_overrides_for_many(
		conn: &Connection,
		resource_ids: &[String],
	) -> StoreResult<HashMap<String, String>> {
		let mut out = HashMap::new();
		for id in resource_ids {
			if let Some(ov) = Self::get_service_override(conn, id)? {
				out.insert(ov.resource_id, ov.service_id);
			}
		}
		Ok(out)
	}

	pub fn set_service_override(conn: &Connection, resource_id: &str, service_id: &str) -> StoreResult<()> {
		conn.execute(
			"INSERT INTO resource_services (resource_id, service_id) VALUES (?1, ?2) \
			 ON CONFLICT(resource_id) DO UPDATE SET service_id=excluded.service_id",
			params![resource_id, service_id],
		)?;
		Ok(())
	}

	pub fn clear_service_override(conn: &Connection, resource_id: &str) -> StoreResult<()> {
		conn.execute("DELETE FROM resource_services WHERE resource_id = ?1", params![resource_id])?;
		Ok(())
	}
}
