//! Process configuration: listen address, database path, reconciliation interval,
//! cache TTLs, and the deadlines from the concurrency model.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_listen_addr() -> SocketAddr {
	"0.0.0.0:8080".parse().expect("valid default listen addr")
}

fn default_db_path() -> PathBuf {
	PathBuf::from("middleware-manager.db")
}

fn default_reconcile_interval_secs() -> u64 {
	30
}

fn default_merged_config_cache_ttl_secs() -> u64 {
	5
}

fn default_merged_config_grace_secs() -> u64 {
	60
}

fn default_ca_base_path() -> PathBuf {
	PathBuf::from("./certs")
}

fn default_static_config_path() -> PathBuf {
	PathBuf::from("./traefik-dynamic/traefik.yml")
}

fn default_datasource_deadline_secs() -> u64 {
	10
}

fn default_merged_config_deadline_secs() -> u64 {
	15
}

fn default_catalogue_deadline_secs() -> u64 {
	30
}

fn default_remote_catalogue_deadline_secs() -> u64 {
	60
}

fn default_plugin_catalogue_url() -> String {
	"https://plugins.traefik.io/api/plugins".to_string()
}

fn default_plugin_catalogue_cache_ttl_secs() -> u64 {
	300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
	#[serde(default = "default_listen_addr")]
	pub listen_addr: SocketAddr,
	#[serde(default = "default_db_path")]
	pub db_path: PathBuf,
	#[serde(default = "default_reconcile_interval_secs")]
	pub reconcile_interval_secs: u64,
	#[serde(default = "default_merged_config_cache_ttl_secs")]
	pub merged_config_cache_ttl_secs: u64,
	#[serde(default = "default_merged_config_grace_secs")]
	pub merged_config_grace_secs: u64,
	#[serde(default = "default_ca_base_path")]
	pub ca_base_path: PathBuf,
	#[serde(default = "default_static_config_path")]
	pub static_config_path: PathBuf,
	#[serde(default = "default_datasource_deadline_secs")]
	pub datasource_deadline_secs: u64,
	#[serde(default = "default_merged_config_deadline_secs")]
	pub merged_config_deadline_secs: u64,
	#[serde(default = "default_catalogue_deadline_secs")]
	pub catalogue_deadline_secs: u64,
	#[serde(default = "default_remote_catalogue_deadline_secs")]
	pub remote_catalogue_deadline_secs: u64,
	#[serde(default = "default_plugin_catalogue_url")]
	pub plugin_catalogue_url: String,
	#[serde(default = "default_plugin_catalogue_cache_ttl_secs")]
	pub plugin_catalogue_cache_ttl_secs: u64,
	#[serde(default)]
	pub log_filter: Option<String>,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			listen_addr: default_listen_addr(),
			db_path: default_db_path(),
			reconcile_interval_secs: default_reconcile_interval_secs(),
			merged_config_cache_ttl_secs: default_merged_config_cache_ttl_secs(),
			merged_config_grace_secs: default_merged_config_grace_secs(),
			ca_base_path: default_ca_base_path(),
			static_config_path: default_static_config_path(),
			datasource_deadline_secs: default_datasource_deadline_secs(),
			merged_config_deadline_secs: default_merged_config_deadline_secs(),
			catalogue_deadline_secs: default_catalogue_deadline_secs(),
			remote_catalogue_deadline_secs: default_remote_catalogue_deadline_secs(),
			plugin_catalogue_url: default_plugin_catalogue_url(),
			plugin_catalogue_cache_ttl_secs: default_plugin_catalogue_cache_ttl_secs(),
			log_filter: None,
		}
	}
}

impl Config {
	pub fn from_yaml_file(path: &std::path::Path) -> anyhow::Result<Self> {
		let raw = std::fs::read_to_string(path)?;
		let cfg: Config = serde_yaml::from_str(&raw)?;
		Ok(cfg)
	}

	pub fn reconcile_interval(&self) -> Duration {
		Duration::from_secs(self.reconcile_interval_secs)
	}

	pub fn merged_config_cache_ttl(&self) -> Duration {
		Duration::from_secs(self.merged_config_cache_ttl_secs)
	}

	pub fn merged_config_grace(&self) -> Duration {
		Duration::from_secs(self.merged_config_grace_secs)
	}

	pub fn datasource_deadline(&self) -> Duration {
		Duration::from_secs(self.datasource_deadline_secs)
	}

	pub fn merged_config_deadline(&self) -> Duration {
		Duration::from_secs(self.merged_config_deadline_secs)
	}

	pub fn catalogue_deadline(&self) -> Duration {
		Duration::from_secs(self.catalogue_deadline_secs)
	}

	pub fn remote_catalogue_deadline(&self) -> Duration {
		Duration::from_secs(self.remote_catalogue_deadline_secs)
	}

	pub fn plugin_catalogue_cache_ttl(&self) -> Duration {
		Duration::from_secs(self.plugin_catalogue_cache_ttl_secs)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_sane() {
		let cfg = Config::default();
		assert_eq!(cfg.reconcile_interval_secs, 30);
		assert_eq!(cfg.merged_config_cache_ttl_secs, 5);
	}

	#[test]
	fn parses_partial_yaml_with_defaults() {
		let cfg: Config = serde_yaml::from_str("dbPath: /tmp/x.db\n").unwrap();
		assert_eq!(cfg.db_path, std::path::PathBuf::from("/tmp/x.db"));
		assert_eq!(cfg.reconcile_interval_secs, 30);
	}
}
