//! C8: the HTTP surface. A thin `axum::Router` composed of per-resource-group
//! sub-routers, matching the endpoint table in the external-interfaces design.
//! Handlers only extract/validate arguments and delegate to C2–C7; business
//! logic never lives here. Every handler returns `ApiResult<T>`, so errors
//! converge on the single `IntoResponse` impl in `crate::error`.

mod attachments;
mod datasource;
mod middlewares;
mod mtls;
mod plugins;
mod proxy;
mod resource_config;
mod resources;
mod security;
mod services;

use std::sync::Arc;

use axum::Router;
use serde::Deserialize;
use tokio::sync::Mutex as AsyncMutex;

use crate::config::Config;
use crate::configproxy::ConfigProxy;
use crate::mtls::MtlsManager;
use crate::plugins::{DuplicateDetector, PluginCatalogue};
use crate::staticconfig::StaticConfigEditor;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
	pub store: Arc<AsyncMutex<Store>>,
	pub config_proxy: Arc<ConfigProxy>,
	pub mtls: Arc<MtlsManager>,
	pub static_config: Arc<StaticConfigEditor>,
	pub catalogue: Arc<PluginCatalogue>,
	pub duplicates: Arc<DuplicateDetector>,
	pub http: reqwest::Client,
	pub config: Arc<Config>,
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.merge(resources::router())
		.merge(attachments::router())
		.merge(middlewares::router())
		.merge(services::router())
		.merge(resource_config::router())
		.merge(datasource::router())
		.merge(proxy::router())
		.merge(mtls::router())
		.merge(plugins::router())
		.merge(security::router())
		.with_state(state)
}

/// Shared `?page=&page_size=` query extractor: defaults 1/50, clamped to a
/// maximum of 100 per page.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
	pub page: Option<u32>,
	pub page_size: Option<u32>,
}

impl PageQuery {
	pub fn page(&self) -> u32 {
		self.page.unwrap_or(1).max(1)
	}

	pub fn page_size(&self) -> u32 {
		self.page_size.unwrap_or(50).clamp(1, 100)
	}
}

#[derive(Debug, serde::Serialize)]
pub struct Page<T> {
	pub items: Vec<T>,
	pub page: u32,
	pub page_size: u32,
	pub total: u64,
}
