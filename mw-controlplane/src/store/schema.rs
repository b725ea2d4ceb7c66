use rusqlite::Connection;

use super::StoreResult;

/// Creates every table and index used by the control plane. Safe to call on
/// every startup: every statement is `IF NOT EXISTS`.
pub fn init(conn: &Connection) -> StoreResult<()> {
	conn.execute_batch(
		r#"
		PRAGMA foreign_keys = ON;
		PRAGMA journal_mode = WAL;

		CREATE TABLE IF NOT EXISTS datasource_configs (
			name TEXT PRIMARY KEY,
			type TEXT NOT NULL,
			url TEXT NOT NULL,
			basic_auth_user TEXT,
			basic_auth_password TEXT,
			active INTEGER NOT NULL DEFAULT 0
		);

		CREATE TABLE IF NOT EXISTS resources (
			id TEXT PRIMARY KEY,
			upstream_router_id TEXT,
			host TEXT NOT NULL,
			service_id TEXT NOT NULL,
			org TEXT,
			site TEXT,
			status TEXT NOT NULL,
			source_type TEXT NOT NULL,
			router_priority INTEGER NOT NULL DEFAULT 200,
			priority_manual INTEGER NOT NULL DEFAULT 0,
			http_entrypoints TEXT NOT NULL DEFAULT '',
			tls_sans TEXT NOT NULL DEFAULT '',
			tcp_enabled INTEGER NOT NULL DEFAULT 0,
			tcp_entrypoints TEXT NOT NULL DEFAULT '',
			tcp_sni_rule TEXT NOT NULL DEFAULT '',
			custom_headers TEXT,
			mtls_enabled INTEGER NOT NULL DEFAULT 0,
			tls_hardening_enabled INTEGER NOT NULL DEFAULT 0,
			secure_headers_enabled INTEGER NOT NULL DEFAULT 0,
			mtls_overlay TEXT,
			upstream_fingerprint TEXT
		);
		CREATE INDEX IF NOT EXISTS idx_resources_source_type ON resources(source_type);
		CREATE INDEX IF NOT EXISTS idx_resources_status ON resources(status);

		CREATE TABLE IF NOT EXISTS middlewares (
			id TEXT PRIMARY KEY,
			name TEXT NOT NULL UNIQUE,
			type TEXT NOT NULL,
			config TEXT NOT NULL
		);

		CREATE TABLE IF NOT EXISTS services (
			id TEXT PRIMARY KEY,
			name TEXT NOT NULL,
			type TEXT NOT NULL,
			config TEXT NOT NULL,
			status TEXT NOT NULL,
			source_type TEXT NOT NULL
		);

		CREATE TABLE IF NOT EXISTS resource_middlewares (
			id INTEGER PRIMARY KEY AUTOINCREMENT,
			resource_id TEXT NOT NULL,
			middleware_id TEXT NOT NULL,
			priority INTEGER NOT NULL DEFAULT 200,
			UNIQUE(resource_id, middleware_id),
			FOREIGN KEY (resource_id) REFERENCES resources(id) ON DELETE CASCADE,
			FOREIGN KEY (middleware_id) REFERENCES middlewares(id) ON DELETE CASCADE
		);
		CREATE INDEX IF NOT EXISTS idx_resource_middlewares_resource_id ON resource_middlewares(resource_id);

		CREATE TABLE IF NOT EXISTS resource_external_middlewares (
			id INTEGER PRIMARY KEY AUTOINCREMENT,
			resource_id TEXT NOT NULL,
			middleware_name TEXT NOT NULL,
			provider TEXT NOT NULL,
			priority INTEGER NOT NULL DEFAULT 200,
			UNIQUE(resource_id, middleware_name, provider),
			FOREIGN KEY (resource_id) REFERENCES resources(id) ON DELETE CASCADE
		);
		CREATE INDEX IF NOT EXISTS idx_resource_external_middlewares_resource_id ON resource_external_middlewares(resource_id);

		CREATE TABLE IF NOT EXISTS resource_services (
			resource_id TEXT PRIMARY KEY,
			service_id TEXT NOT NULL,
			FOREIGN KEY (resource_id) REFERENCES resources(id) ON DELETE CASCADE,
			FOREIGN KEY (service_id) REFERENCES services(id) ON DELETE CASCADE
		);

		CREATE TABLE IF NOT EXISTS mtls_config (
			id INTEGER PRIMARY KEY CHECK (id = 1),
			enabled INTEGER NOT NULL DEFAULT 0,
			has_ca INTEGER NOT NULL DEFAULT 0,
			ca_subject TEXT,
			ca_expiry TEXT,
			ca_cert_path TEXT,
			certs_base_path TEXT NOT NULL DEFAULT './certs',
			overlay_template TEXT
		);

		CREATE TABLE IF NOT EXISTS mtls_clients (
			id TEXT PRIMARY KEY,
			name TEXT NOT NULL UNIQUE,
			subject TEXT NOT NULL,
			expiry TEXT NOT NULL,
			revoked INTEGER NOT NULL DEFAULT 0,
			revoked_at TEXT,
			cert_pem TEXT NOT NULL,
			encrypted_key_pem TEXT NOT NULL,
			p12_bundle BLOB NOT NULL,
			p12_password_hash TEXT NOT NULL
		);

		CREATE TABLE IF NOT EXISTS security_config (
			id INTEGER PRIMARY KEY CHECK (id = 1),
			tls_hardening_enabled INTEGER NOT NULL DEFAULT 0,
			secure_headers_enabled INTEGER NOT NULL DEFAULT 0,
			headers TEXT NOT NULL
		);

		CREATE TABLE IF NOT EXISTS deleted_templates (
			id TEXT NOT NULL,
			type TEXT NOT NULL,
			PRIMARY KEY (id, type)
		);
		"#,
	)?;
	Ok(())
}
