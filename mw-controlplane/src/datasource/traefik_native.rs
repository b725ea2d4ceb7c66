//! The "traefik-native" dialect: the proxy's own read API — separate
//! endpoints per router/service/middleware kind, plus an overview, version,
//! entrypoints, and the raw dynamic-config document it is currently serving.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::model::DataSourceConfig;

use super::{
	DataSource, DataSourceError, DataSourceResult, Inventory, InventoryMiddleware, InventoryRouter, InventoryService,
	MiddlewareRef, RouterProtocol, classify_reqwest_error, request,
};

static HOST_RULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Host\(`([^`]+)`\)").unwrap());

#[derive(Debug, Deserialize)]
struct WireRouter {
	name: String,
	#[serde(default)]
	rule: String,
	#[serde(default)]
	service: String,
	#[serde(default, rename = "entryPoints")]
	entry_points: Vec<String>,
	#[serde(default)]
	priority: Option<i64>,
	#[serde(default)]
	middlewares: Vec<String>,
	#[serde(default)]
	tls: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WireMiddleware {
	name: String,
	#[serde(rename = "type")]
	type_: Option<String>,
	#[serde(flatten)]
	rest: Value,
}

#[derive(Debug, Deserialize)]
struct WireService {
	name: String,
	#[serde(flatten)]
	rest: Value,
}

/// Splits a Traefik-qualified name like `foo@docker` into `(name, provider)`.
fn split_qualified(qualified: &str) -> (String, String) {
	match qualified.split_once('@') {
		Some((name, provider)) => (name.to_string(), provider.to_string()),
		None => (qualified.to_string(), "http".to_string()),
	}
}

pub struct TraefikNativeSource {
	http: reqwest::Client,
	base_url: String,
	user: Option<String>,
	password: Option<String>,
}

impl TraefikNativeSource {
	pub fn new(cfg: &DataSourceConfig, http: reqwest::Client) -> Self {
		TraefikNativeSource {
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

	fn ingest_routers(inv: &mut Inventory, routers: Vec<WireRouter>, protocol: RouterProtocol) {
		for r in routers {
			let (router_name, _router_provider) = split_qualified(&r.name);
			let host = HOST_RULE.captures(&r.rule).and_then(|c| c.get(1)).map(|m| m.as_str().to_string()).unwrap_or_default();
			let (service_id, _) = split_qualified(&r.service);
			let middlewares = r
				.middlewares
				.iter()
				.map(|m| {
					let (name, provider) = split_qualified(m);
					MiddlewareRef { name, provider }
				})
				.collect();
			inv.routers.push(InventoryRouter {
				upstream_id: router_name,
				host,
				entrypoints: r.entry_points,
				tls_enabled: r.tls.is_some(),
				tls_sans: Vec::new(),
				protocol,
				service_id,
				priority: r.priority,
				middlewares,
				raw_spec: Some(serde_json::json!({"rule": r.rule, "service": r.service, "tls": r.tls})),
			});
		}
	}
}

#[async_trait::async_trait]
impl DataSource for TraefikNativeSource {
	async fn fetch(&self, deadline: Duration) -> DataSourceResult<Inventory> {
		let http_routers: Vec<WireRouter> = self.get_json("/api/http/routers", deadline).await?;
		let tcp_routers: Vec<WireRouter> = self.get_json("/api/tcp/routers", deadline).await.unwrap_or_default();
		let udp_routers: Vec<WireRouter> = self.get_json("/api/udp/routers", deadline).await.unwrap_or_default();
		let http_middlewares: Vec<WireMiddleware> = self.get_json("/api/http/middlewares", deadline).await?;
		let tcp_middlewares: Vec<WireMiddleware> = self.get_json("/api/tcp/middlewares", deadline).await.unwrap_or_default();
		let http_services: Vec<WireService> = self.get_json("/api/http/services", deadline).await?;
		let raw_dynamic_config: Value = self.get_json("/api/rawdata", deadline).await.unwrap_or(Value::Null);

		let mut inv = Inventory::default();
		for m in http_middlewares.into_iter().chain(tcp_middlewares) {
			let (name, provider) = split_qualified(&m.name);
			let type_ = m.type_.clone().unwrap_or_else(|| "plugin".to_string());
			inv.middlewares.insert(format!("{name}@{provider}"), InventoryMiddleware {
				name,
				provider,
				type_,
				config: m.rest,
			});
		}
		for s in http_services {
			let (id, _) = split_qualified(&s.name);
			inv.services.insert(
				id.clone(),
				InventoryService {
					id,
					type_: "load-balancer".to_string(),
					config: s.rest,
				},
			);
		}
		Self::ingest_routers(&mut inv, http_routers, RouterProtocol::Http);
		Self::ingest_routers(&mut inv, tcp_routers, RouterProtocol::Tcp);
		Self::ingest_routers(&mut inv, udp_routers, RouterProtocol::Udp);
		inv.raw_dynamic_config = if raw_dynamic_config.is_null() { None } else { Some(raw_dynamic_config) };
		Ok(inv)
	}
}
