//! Remote Traefik plugin catalogue fetcher: a single process-wide TTL cache
//! (`moka::future::Cache`, keyed by a constant) around one upstream GET, per
//! the single-flight-per-key discipline `moka` already gives us for free.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const CACHE_KEY: &str = "catalogue";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CataloguePlugin {
	pub name: String,
	pub display_name: Option<String>,
	pub import_path: String,
	pub latest_version: Option<String>,
	#[serde(default)]
	pub summary: Option<String>,
	#[serde(default)]
	pub stars: Option<u64>,
}

#[derive(Debug, Error, Clone)]
pub enum CatalogueError {
	#[error("plugin catalogue unreachable: {0}")]
	Unreachable(String),
	#[error("plugin catalogue response malformed: {0}")]
	Malformed(String),
}

pub type CatalogueResult<T> = Result<T, CatalogueError>;

pub struct PluginCatalogue {
	http: reqwest::Client,
	url: String,
	deadline: Duration,
	cache: Cache<&'static str, Arc<Vec<CataloguePlugin>>>,
}

impl PluginCatalogue {
	pub fn new(http: reqwest::Client, url: String, deadline: Duration, ttl: Duration) -> Self {
		PluginCatalogue {
			http,
			url,
			deadline,
			cache: Cache::builder().time_to_live(ttl).max_capacity(1).build(),
		}
	}

	/// Returns the cached index, populating it on a miss. Concurrent callers
	/// during a miss share the same in-flight fetch via `moka`'s own
	/// per-key single-flight behavior.
	pub async fn list(&self) -> CatalogueResult<Arc<Vec<CataloguePlugin>>> {
		self.cache
			.try_get_with(CACHE_KEY, self.fetch())
			.await
			.map_err(|e: Arc<CatalogueError>| (*e).clone())
	}

	async fn fetch(&self) -> CatalogueResult<Arc<Vec<CataloguePlugin>>> {
		let resp = self
			.http
			.get(&self.url)
			.timeout(self.deadline)
			.send()
			.await
			.map_err(|e| CatalogueError::Unreachable(e.to_string()))?;
		if !resp.status().is_success() {
			return Err(CatalogueError::Unreachable(format!("{} returned {}", self.url, resp.status())));
		}
		let plugins: Vec<CataloguePlugin> = resp.json().await.map_err(|e| CatalogueError::Malformed(e.to_string()))?;
		Ok(Arc::new(plugins))
	}

	pub fn invalidate(&self) {
		self.cache.invalidate(&CACHE_KEY);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use wiremock::matchers::method;
	use wiremock::{Mock, MockServer, ResponseTemplate};

	#[tokio::test]
	async fn caches_across_calls_until_invalidated() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
				{"name": "headers-plugin", "importPath": "github.com/x/headers-plugin", "latestVersion": "v1.0.0"}
			])))
			.expect(1)
			.mount(&server)
			.await;

		let catalogue = PluginCatalogue::new(reqwest::Client::new(), server.uri(), Duration::from_secs(5), Duration::from_secs(60));
		let first = catalogue.list().await.unwrap();
		let second = catalogue.list().await.unwrap();
		assert_eq!(first.len(), 1);
		assert_eq!(first[0].name, second[0].name);
	}

	#[tokio::test]
	async fn invalidate_forces_a_refetch() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
			.expect(2)
			.mount(&server)
			.await;

		let catalogue = PluginCatalogue::new(reqwest::Client::new(), server.uri(), Duration::from_secs(5), Duration::from_secs(60));
		catalogue.list().await.unwrap();
		catalogue.invalidate();
		catalogue.list().await.unwrap();
	}
}
