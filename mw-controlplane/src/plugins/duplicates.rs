//! Duplicate-name detector: checks a proposed middleware (and optional
//! plugin) name against every upstream middleware name, HTTP and TCP.
//! Never fails the caller on an unreachable data source — it degrades to
//! `api_available: false` with a warning instead, since this check only
//! ever informs an operator before they create something, it never blocks.

use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use crate::datasource::{self, Inventory};
use crate::model::DataSourceConfig;

pub struct DuplicateDetector {
	http: reqwest::Client,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateCheckResult {
	pub has_duplicates: bool,
	pub duplicates: Vec<String>,
	pub api_available: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub warning: Option<String>,
}

impl DuplicateDetector {
	pub fn new(http: reqwest::Client) -> Self {
		DuplicateDetector { http }
	}

	/// Queries the active data source once and compares `proposed_name` (and
	/// `plugin_name`, when creating a `plugin`-typed middleware) against every
	/// name it returns, case-insensitively.
	pub async fn check(
		&self,
		active: Option<&DataSourceConfig>,
		deadline: Duration,
		proposed_name: &str,
		plugin_name: Option<&str>,
	) -> DuplicateCheckResult {
		let Some(active) = active else {
			return DuplicateCheckResult {
				has_duplicates: false,
				duplicates: Vec::new(),
				api_available: false,
				warning: Some("no active data source configured".to_string()),
			};
		};

		let client = datasource::build(active, self.http.clone());
		let inventory: Inventory = match client.fetch(deadline).await {
			Ok(inv) => inv,
			Err(e) => {
				warn!(error = %e, "duplicate check: data source unreachable, degrading to api_available=false");
				return DuplicateCheckResult {
					has_duplicates: false,
					duplicates: Vec::new(),
					api_available: false,
					warning: Some(format!("data source unreachable: {e}")),
				};
			}
		};

		let candidates: Vec<&str> = std::iter::once(proposed_name).chain(plugin_name).collect();
		let names = inventory.all_middleware_names();
		let duplicates: Vec<String> = names
			.into_iter()
			.filter(|n| candidates.iter().any(|c| c.eq_ignore_ascii_case(n)))
			.collect();

		DuplicateCheckResult {
			has_duplicates: !duplicates.is_empty(),
			duplicates,
			api_available: true,
			warning: None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::DataSourceType;
	use wiremock::matchers::{method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn cfg(url: String) -> DataSourceConfig {
		DataSourceConfig {
			name: "primary".into(),
			type_: DataSourceType::RouterCentric,
			url,
			basic_auth_user: None,
			basic_auth_password: None,
			active: true,
		}
	}

	#[tokio::test]
	async fn detects_case_insensitive_duplicate() {
		let server = MockServer::start().await;
		Mock::given(method("GET")).and(path("/api/routers")).respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([]))).mount(&server).await;
		Mock::given(method("GET"))
			.and(path("/api/middlewares"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
				{"name": "Rate-Limit", "type": "rateLimit", "config": {}}
			])))
			.mount(&server)
			.await;
		Mock::given(method("GET")).and(path("/api/services")).respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([]))).mount(&server).await;

		let detector = DuplicateDetector::new(reqwest::Client::new());
		let active = cfg(server.uri());
		let result = detector.check(Some(&active), Duration::from_secs(5), "rate-limit", None).await;
		assert!(result.api_available);
		assert!(result.has_duplicates);
		assert_eq!(result.duplicates, vec!["Rate-Limit".to_string()]);
	}

	#[tokio::test]
	async fn unreachable_data_source_degrades_instead_of_failing() {
		let server = MockServer::start().await;
		drop(server);
		let active = cfg("http://127.0.0.1:1".to_string());
		let detector = DuplicateDetector::new(reqwest::Client::new());
		let result = detector.check(Some(&active), Duration::from_millis(200), "anything", None).await;
		assert!(!result.api_available);
		assert!(result.warning.is_some());
		assert!(!result.has_duplicates);
	}

	#[tokio::test]
	async fn no_active_data_source_reports_unavailable() {
		let detector = DuplicateDetector::new(reqwest::Client::new());
		let result = detector.check(None, Duration::from_secs(5), "anything", None).await;
		assert!(!result.api_available);
	}
}
