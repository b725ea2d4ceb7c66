use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::Value;

use crate::model::{MtlsOverlay, Resource, ResourceStatus, SourceType, TcpBlock, TemplateKind};

use super::{StoreError, StoreResult};

/// Status filter for resource listing; mirrors the REST surface's
/// `status ∈ {active, disabled, all}` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceFilter {
	Active,
	Disabled,
	All,
}

pub struct ResourcesRepo;

fn row_to_resource(row: &Row) -> rusqlite::Result<Resource> {
	let status_str: String = row.get("status")?;
	let source_type_str: String = row.get("source_type")?;
	let custom_headers_str: Option<String> = row.get("custom_headers")?;
	let mtls_overlay_str: Option<String> = row.get("mtls_overlay")?;

	let custom_headers = custom_headers_str
		.map(|s| serde_json::from_str::<Value>(&s))
		.transpose()
		.map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?;
	let mtls_overlay = mtls_overlay_str
		.map(|s| serde_json::from_str::<MtlsOverlay>(&s))
		.transpose()
		.map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?
		.unwrap_or_default();

	Ok(Resource {
		id: row.get("id")?,
		upstream_router_id: row.get("upstream_router_id")?,
		host: row.get("host")?,
		service_id: row.get("service_id")?,
		org: row.get("org")?,
		site: row.get("site")?,
		status: ResourceStatus::parse(&status_str).unwrap_or(ResourceStatus::Active),
		source_type: SourceType::parse(&source_type_str).unwrap_or(SourceType::Manual),
		router_priority: row.get("router_priority")?,
		priority_manual: row.get::<_, i64>("priority_manual")? != 0,
		http_entrypoints: row.get("http_entrypoints")?,
		tls_sans: row.get("tls_sans")?,
		tcp: TcpBlock {
			enabled: row.get::<_, i64>("tcp_enabled")? != 0,
			entrypoints: row.get("tcp_entrypoints")?,
			sni_rule: row.get("tcp_sni_rule")?,
		},
		custom_headers,
		mtls_enabled: row.get::<_, i64>("mtls_enabled")? != 0,
		tls_hardening_enabled: row.get::<_, i64>("tls_hardening_enabled")? != 0,
		secure_headers_enabled: row.get::<_, i64>("secure_headers_enabled")? != 0,
		mtls_overlay,
		upstream_fingerprint: row.get("upstream_fingerprint")?,
	})
}

const SELECT_COLUMNS: &str = "id, upstream_router_id, host, service_id, org, site, status, source_type, \
	router_priority, priority_manual, http_entrypoints, tls_sans, tcp_enabled, tcp_entrypoints, tcp_sni_rule, \
	custom_headers, mtls_enabled, tls_hardening_enabled, secure_headers_enabled, mtls_overlay, upstream_fingerprint";

impl ResourcesRepo {
	pub fn get(conn: &Connection, id: &str) -> StoreResult<Resource> {
		let sql = format!("SELECT {SELECT_COLUMNS} FROM resources WHERE id = ?1");
		conn.query_row(&sql, params![id], row_to_resource)
			.optional()?
			.ok_or_else(|| StoreError::NotFound(format!("resource {id}")))
	}

	pub fn try_get(conn: &Connection, id: &str) -> StoreResult<Option<Resource>> {
		let sql = format!("SELECT {SELECT_COLUMNS} FROM resources WHERE id = ?1");
		Ok(conn.query_row(&sql, params![id], row_to_resource).optional()?)
	}

	/// Lists resources matching `filter` and optional `source_type`, newest
	/// host first for deterministic pagination; returns `(page, total)`.
	pub fn list(
		conn: &Connection,
		filter: ResourceFilter,
		source_type: Option<&str>,
		page: u32,
		page_size: u32,
	) -> StoreResult<(Vec<Resource>, u64)> {
		let mut clauses = Vec::new();
		let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
		match filter {
			ResourceFilter::Active => clauses.push("status = 'active'".to_string()),
			ResourceFilter::Disabled => clauses.push("status = 'disabled'".to_string()),
			ResourceFilter::All => {}
		}
		if let Some(st) = source_type {
			clauses.push("source_type = ?".to_string());
			args.push(Box::new(st.to_string()));
		}
		let where_clause = if clauses.is_empty() { String::new() } else { format!("WHERE {}", clauses.join(" AND ")) };

		let count_sql = format!("SELECT COUNT(*) FROM resources {where_clause}");
		let total: i64 = conn.query_row(
			&count_sql,
			rusqlite::params_from_iter(args.iter().map(|b| b.as_ref())),
			|r| r.get(0),
		)?;

		let offset = (page.saturating_sub(1)) as i64 * page_size as i64;
		let list_sql = format!("SELECT {SELECT_COLUMNS} FROM resources {where_clause} ORDER BY id ASC LIMIT ? OFFSET ?");
		let mut stmt = conn.prepare(&list_sql)?;
		let limit = page_size as i64;
		let mut all_args: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
		all_args.push(&limit);
		all_args.push(&offset);
		let rows = stmt.query_map(rusqlite::params_from_iter(all_args), row_to_resource)?;
		let mut out = Vec::new();
		for r in rows {
			out.push(r?);
		}
		Ok((out, total as u64))
	}

	/// All resources whose `source_type` matches `source_type` — the set the
	/// reconciler compares a fresh upstream pull against.
	pub fn list_by_source_type(conn: &Connection, source_type: &str) -> StoreResult<Vec<Resource>> {
		let sql = format!("SELECT {SELECT_COLUMNS} FROM resources WHERE source_type = ?1");
		let mut stmt = conn.prepare(&sql)?;
		let rows = stmt.query_map(params![source_type], row_to_resource)?;
		let mut out = Vec::new();
		for r in rows {
			out.push(r?);
		}
		Ok(out)
	}

	pub fn list_active(conn: &Connection) -> StoreResult<Vec<Resource>> {
		let sql = format!("SELECT {SELECT_COLUMNS} FROM resources WHERE status = 'active'");
		let mut stmt = conn.prepare(&sql)?;
		let rows = stmt.query_map([], row_to_resource)?;
		let mut out = Vec::new();
		for r in rows {
			out.push(r?);
		}
		Ok(out)
	}

	pub fn insert(conn: &Connection, r: &Resource) -> StoreResult<()> {
		let custom_headers = r.custom_headers.as_ref().map(serde_json::to_string).transpose()?;
		let mtls_overlay = serde_json::to_string(&r.mtls_overlay)?;
		conn.execute(
			"INSERT INTO resources (id, upstream_router_id, host, service_id, org, site, status, source_type, \
			 router_priority, priority_manual, http_entrypoints, tls_sans, tcp_enabled, tcp_entrypoints, tcp_sni_rule, \
			 custom_headers, mtls_enabled, tls_hardening_enabled, secure_headers_enabled, mtls_overlay, upstream_fingerprint) \
			 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21)",
			params![
				r.id,
				r.upstream_router_id,
				r.host,
				r.service_id,
				r.org,
				r.site,
				r.status.as_str(),
				r.source_type.as_str(),
				r.router_priority,
				r.priority_manual as i64,
				r.http_entrypoints,
				r.tls_sans,
				r.tcp.enabled as i64,
				r.tcp.entrypoints,
				r.tcp.sni_rule,
				custom_headers,
				r.mtls_enabled as i64,
				r.tls_hardening_enabled as i64,
				r.secure_headers_enabled as i64,
				mtls_overlay,
				r.upstream_fingerprint,
			],
		)?;
		Ok(())
	}

	pub fn update(conn: &Connection, r: &Resource) -> StoreResult<()> {
		let custom_headers = r.custom_headers.as_ref().map(serde_json::to_string).transpose()?;
		let mtls_overlay = serde_json::to_string(&r.mtls_overlay)?;
		let changed = conn.execute(
			"UPDATE resources SET upstream_router_id=?2, host=?3, service_id=?4, org=?5, site=?6, status=?7, \
			 source_type=?8, router_priority=?9, priority_manual=?10, http_entrypoints=?11, tls_sans=?12, \
			 tcp_enabled=?13, tcp_entrypoints=?14, tcp_sni_rule=?15, custom_headers=?16, mtls_enabled=?17, \
			 tls_hardening_enabled=?18, secure_headers_enabled=?19, mtls_overlay=?20, upstream_fingerprint=?21 WHERE id=?1",
			params![
				r.id,
				r.upstream_router_id,
				r.host,
				r.service_id,
				r.org,
				r.site,
				r.status.as_str(),
				r.source_type.as_str(),
				r.router_priority,
				r.priority_manual as i64,
				r.http_entrypoints,
				r.tls_sans,
				r.tcp.enabled as i64,
				r.tcp.entrypoints,
				r.tcp.sni_rule,
				custom_headers,
				r.mtls_enabled as i64,
				r.tls_hardening_enabled as i64,
				r.secure_headers_enabled as i64,
				mtls_overlay,
				r.upstream_fingerprint,
			],
		)?;
		if changed == 0 {
			return Err(StoreError::NotFound(format!("resource {}", r.id)));
		}
		Ok(())
	}

	/// Physically removes a resource and records a tombstone so a reconciler
	/// cycle that later sees the same upstream id again does not resurrect
	/// it. Only `disabled` resources may be deleted (see `Resource::deletable`);
	/// callers enforce that invariant before calling this.
	pub fn delete(conn: &Connection, id: &str) -> StoreResult<()> {
		let changed = conn.execute("DELETE FROM resources WHERE id = ?1", params![id])?;
		if changed == 0 {
			return Err(StoreError::NotFound(format!("resource {id}")));
		}
		conn.execute(
			"INSERT OR IGNORE INTO deleted_templates (id, type) VALUES (?1, ?2)",
			params![id, TemplateKind::Resource.as_str()],
		)?;
		Ok(())
	}

	pub fn exists(conn: &Connection, id: &str) -> StoreResult<bool> {
		Ok(conn.query_row("SELECT 1 FROM resources WHERE id = ?1", params![id], |_| Ok(())).optional()?.is_some())
	}

	/// Batched lookup for the merge engine: resources keyed by id, for the
	/// given set of ids, in one round trip.
	pub fn get_many(conn: &Connection, ids: &[String]) -> StoreResult<HashMap<String, Resource>> {
		let mut out = HashMap::new();
		for id in ids {
			if let Some(r) = Self::try_get(conn, id)? {
				out.insert(id.clone(), r);
			}
		}
		Ok(out)
	}
}
