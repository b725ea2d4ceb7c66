//! The "router-centric" dialect: a single upstream inventory service that
//! returns flat lists of routers already carrying their service and
//! middleware references, plus separate middleware/service catalogs.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::model::DataSourceConfig;

use super::{
	DataSource, DataSourceError, DataSourceResult, Inventory, InventoryMiddleware, InventoryRouter, InventoryService,
	MiddlewareRef, RouterProtocol, classify_reqwest_error, request,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMiddlewareRef {
	name: String,
	#[serde(default = "default_provider")]
	provider: String,
}

fn default_provider() -> String {
	"router-centric".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTcp {
	#[serde(default)]
	enabled: bool,
	#[serde(default)]
	entrypoints: String,
	#[serde(default)]
	sni_rule: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRouter {
	id: String,
	host: String,
	service_id: String,
	#[serde(default)]
	entrypoints: String,
	#[serde(default)]
	tls_enabled: bool,
	#[serde(default)]
	tls_sans: String,
	#[serde(default)]
	protocol: String,
	#[serde(default)]
	priority: Option<i64>,
	#[serde(default)]
	middlewares: Vec<WireMiddlewareRef>,
	#[serde(default)]
	tcp: Option<WireTcp>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMiddleware {
	name: String,
	#[serde(default = "default_provider")]
	provider: String,
	#[serde(rename = "type")]
	type_: String,
	#[serde(default)]
	config: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireService {
	id: String,
	#[serde(rename = "type")]
	type_: String,
	#[serde(default)]
	config: Value,
}

pub struct RouterCentricSource {
	http: reqwest::Client,
	base_url: String,
	user: Option<String>,
	password: Option<String>,
}

impl RouterCentricSource {
	pub fn new(cfg: &DataSourceConfig, http: reqwest::Client) -> Self {
		RouterCentricSource {
			http,
			base_url: cfg.url.trim_end_matches('/').to_string(),
			user: cfg.basic_auth_user.clone(),
			password: cfg.basic_auth_password.clone(),
		}
	}

	async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str, deadline: Duration) -> DataSourceResult<T> {
		let url = format!("{}{}", self.base_url, path);
		let resp = request(&self.http, &url, &self.user, &self.password, deadline)
			.send()
			.await
			.map_err(classify_reqwest_error)?;
		if resp.status() == reqwest::StatusCode::UNAUTHORIZED || resp.status() == reqwest::StatusCode::FORBIDDEN {
			return Err(DataSourceError::Unauthorized);
		}
		if !resp.status().is_success() {
			return Err(DataSourceError::Unreachable(format!("{} returned {}", url, resp.status())));
		}
		resp.json::<T>().await.map_err(|e| DataSourceError::Malformed(e.to_string()))
	}
}

#[async_trait::async_trait]
impl DataSource for RouterCentricSource {
	async fn fetch(&self, deadline: Duration) -> DataSourceResult<Inventory> {
		let routers: Vec<WireRouter> = self.get_json("/api/routers", deadline).await?;
		let middlewares: Vec<WireMiddleware> = self.get_json("/api/middlewares", deadline).await?;
		let services: Vec<WireService> = self.get_json("/api/services", deadline).await?;

		let mut inv = Inventory::default();
		for m in middlewares {
			inv.middlewares.insert(format!("{}@{}", m.name, m.provider), InventoryMiddleware {
				name: m.name,
				provider: m.provider,
				type_: m.type_,
				config: m.config,
			});
		}
		for s in services {
			inv.services.insert(s.id.clone(), InventoryService {
				id: s.id,
				type_: s.type_,
				config: s.config,
			});
		}
		for r in routers {
			let protocol = match r.protocol.as_str() {
				"tcp" => RouterProtocol::Tcp,
				"udp" => RouterProtocol::Udp,
				_ => RouterProtocol::Http,
			};
			inv.routers.push(InventoryRouter {
				upstream_id: r.id,
				host: r.host,
				entrypoints: r.entrypoints.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
				tls_enabled: r.tls_enabled,
				tls_sans: r.tls_sans.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
				protocol,
				service_id: r.service_id,
				priority: r.priority,
				middlewares: r
					.middlewares
					.into_iter()
					.map(|mw| MiddlewareRef { name: mw.name, provider: mw.provider })
					.collect(),
				raw_spec: None,
			});
		}
		Ok(inv)
	}
}
