//! C1: the typed HTTP client that pulls router/service/middleware inventories
//! from a configured upstream, in one of two dialects.
//!
//! Selection is a small trait object resolved from `DataSourceConfig.type` at
//! call time, so an operator switching the active data source takes effect on
//! the very next reconciler cycle and merged-config recompute — no restart.

mod router_centric;
mod traefik_native;

pub use router_centric::RouterCentricSource;
pub use traefik_native::TraefikNativeSource;

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::model::{DataSourceConfig, DataSourceType};

#[derive(Debug, Error, Clone)]
pub enum DataSourceError {
	#[error("data source unreachable: {0}")]
	Unreachable(String),
	#[error("data source rejected credentials")]
	Unauthorized,
	#[error("data source response malformed: {0}")]
	Malformed(String),
	#[error("data source call timed out: {0}")]
	Timeout(String),
}

pub type DataSourceResult<T> = Result<T, DataSourceError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterProtocol {
	Http,
	Tcp,
	Udp,
}

/// A normalized router/service reference, `name@provider` — the key shape the
/// merge engine uses to de-duplicate and to address upstream-native middlewares.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MiddlewareRef {
	pub name: String,
	pub provider: String,
}

impl MiddlewareRef {
	pub fn canonical(&self) -> String {
		format!("{}@{}", self.name, self.provider)
	}
}

#[derive(Debug, Clone)]
pub struct InventoryRouter {
	pub upstream_id: String,
	pub host: String,
	pub entrypoints: Vec<String>,
	pub tls_enabled: bool,
	pub tls_sans: Vec<String>,
	pub protocol: RouterProtocol,
	pub service_id: String,
	/// Upstream-declared priority, when the dialect carries one. Inherited on
	/// first sight; absent, the store default (200) applies.
	pub priority: Option<i64>,
	pub middlewares: Vec<MiddlewareRef>,
	/// The router's own spec as the upstream returned it, when available —
	/// the starting point the merge engine composes from (§4.4 step 3).
	pub raw_spec: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct InventoryMiddleware {
	pub name: String,
	pub provider: String,
	pub type_: String,
	pub config: Value,
}

#[derive(Debug, Clone)]
pub struct InventoryService {
	pub id: String,
	pub type_: String,
	pub config: Value,
}

/// The normalized record set a `DataSource::fetch` call returns.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
	pub routers: Vec<InventoryRouter>,
	pub middlewares: HashMap<String, InventoryMiddleware>,
	pub services: HashMap<String, InventoryService>,
	/// The raw dynamic-config document, when the dialect exposes one directly
	/// (traefik-native). `None` for router-centric, which carries no such
	/// document and must have one synthesized by the merge engine.
	pub raw_dynamic_config: Option<Value>,
}

impl Inventory {
	/// Every upstream middleware name, HTTP and TCP, for the duplicate detector (C7).
	pub fn all_middleware_names(&self) -> Vec<String> {
		self.middlewares.values().map(|m| m.name.clone()).collect()
	}
}

/// Shared capability both dialects implement: pull the current upstream
/// inventory within a caller-supplied deadline.
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
	async fn fetch(&self, deadline: Duration) -> DataSourceResult<Inventory>;
}

/// Builds the dialect implementation for a configured data source. The
/// returned client never caches — caching belongs entirely to the config
/// proxy (C4).
pub fn build(cfg: &DataSourceConfig, http: reqwest::Client) -> Box<dyn DataSource> {
	match cfg.type_ {
		DataSourceType::RouterCentric => Box::new(RouterCentricSource::new(cfg, http)),
		DataSourceType::TraefikNative => Box::new(TraefikNativeSource::new(cfg, http)),
	}
}

/// Shared basic-auth + timeout request builder used by both dialects.
pub(crate) fn request(
	http: &reqwest::Client,
	url: &str,
	user: &Option<String>,
	password: &Option<String>,
	deadline: Duration,
) -> reqwest::RequestBuilder {
	let mut req = http.get(url).timeout(deadline);
	if let Some(user) = user {
		req = req.basic_auth(user, password.clone());
	}
	req
}

pub(crate) fn classify_reqwest_error(e: reqwest::Error) -> DataSourceError {
	if e.is_timeout() {
		DataSourceError::Timeout(e.to_string())
	} else if e.status().map(|s| s.as_u16()) == Some(401) || e.status().map(|s| s.as_u16()) == Some(403) {
		DataSourceError::Unauthorized
	} else if e.is_connect() {
		DataSourceError::Unreachable(e.to_string())
	} else {
		DataSourceError::Malformed(e.to_string())
	}
}
