use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::Value;

use crate::model::{ResourceStatus, Service, ServiceType, SourceType, TemplateKind};

use super::{StoreError, StoreResult};

pub struct ServicesRepo;

fn row_to_service(row: &Row) -> rusqlite::Result<Service> {
	let config_str: String = row.get("config")?;
	let config: Value = serde_json::from_str(&config_str)
		.map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?;
	let type_str: String = row.get("type")?;
	let status_str: String = row.get("status")?;
	let source_type_str: String = row.get("source_type")?;
	Ok(Service {
		id: row.get("id")?,
		name: row.get("name")?,
		type_: ServiceType::parse(&type_str).unwrap_or(ServiceType::LoadBalancer),
		config,
		status: ResourceStatus::parse(&status_str).unwrap_or(ResourceStatus::Active),
		source_type: SourceType::parse(&source_type_str).unwrap_or(SourceType::Manual),
	})
}

const SELECT_COLUMNS: &str = "id, name, type, config, status, source_type";

impl ServicesRepo {
	pub fn list(conn: &Connection) -> StoreResult<Vec<Service>> {
		let sql = format!("SELECT {SELECT_COLUMNS} FROM services ORDER BY name");
		let mut stmt = conn.prepare(&sql)?;
		let rows = stmt.query_map([], row_to_service)?;
		let mut out = Vec::new();
		for r in rows {
			out.push(r?);
		}
		Ok(out)
	}

	pub fn get(conn: &Connection, id: &str) -> StoreResult<Service> {
		let sql = format!("SELECT {SELECT_COLUMNS} FROM services WHERE id = ?1");
		conn.query_row(&sql, params![id], row_to_service)
			.optional()?
			.ok_or_else(|| StoreError::NotFound(format!("service {id}")))
	}

	pub fn try_get(conn: &Connection, id: &str) -> StoreResult<Option<Service>> {
		let sql = format!("SELECT {SELECT_COLUMNS} FROM services WHERE id = ?1");
		Ok(conn.query_row(&sql, params![id], row_to_service).optional()?)
	}

	pub fn get_many(conn: &Connection, ids: &[String]) -> StoreResult<HashMap<String, Service>> {
		let mut out = HashMap::new();
		for id in ids {
			if let Some(s) = Self::try_get(conn, id)? {
				out.insert(id.clone(), s);
			}
		}
		Ok(out)
	}

	pub fn list_by_source_type(conn: &Connection, source_type: &str) -> StoreResult<Vec<Service>> {
		let sql = format!("SELECT {SELECT_COLUMNS} FROM services WHERE source_type = ?1");
		let mut stmt = conn.prepare(&sql)?;
		let rows = stmt.query_map(params![source_type], row_to_service)?;
		let mut out = Vec::new();
		for r in rows {
			out.push(r?);
		}
		Ok(out)
	}

	pub fn insert(conn: &Connection, s: &Service) -> StoreResult<()> {
		conn.execute(
			"INSERT INTO services (id, name, type, config, status, source_type) VALUES (?1,?2,?3,?4,?5,?6)",
			params![s.id, s.name, s.type_.as_str(), serde_json::to_string(&s.config)?, s.status.as_str(), s.source_type.as_str()],
		)?;
		Ok(())
	}

	pub fn update(conn: &Connection, s: &Service) -> StoreResult<()> {
		let changed = conn.execute(
			"UPDATE services SET name=?2, type=?3, config=?4, status=?5, source_type=?6 WHERE id=?1",
			params![s.id, s.name, s.type_.as_str(), serde_json::to_string(&s.config)?, s.status.as_str(), s.source_type.as_str()],
		)?;
		if changed == 0 {
			return Err(StoreError::NotFound(format!("service {}", s.id)));
		}
		Ok(())
	}

	pub fn delete(conn: &Connection, id: &str) -> StoreResult<()> {
		let changed = conn.execute("DELETE FROM services WHERE id = ?1", params![id])?;
		if changed == 0 {
			return Err(StoreError::NotFound(format!("service {id}")));
		}
		conn.execute(
			"INSERT OR IGNORE INTO deleted_templates (id, type) VALUES (?1, ?2)",
			params![id, TemplateKind::Service.as_str()],
		)?;
		Ok(())
	}
}
