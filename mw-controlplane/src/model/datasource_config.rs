use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataSourceType {
	RouterCentric,
	TraefikNative,
}

impl DataSourceType {
	pub fn as_str(&self) -> &'static str {
		match self {
			DataSourceType::RouterCentric => "router-centric",
			DataSourceType::TraefikNative => "traefik-native",
		}
	}

	pub fn parse(s: &str) -> Option<Self> {
		match s {
			"router-centric" => Some(DataSourceType::RouterCentric),
			"traefik-native" => Some(DataSourceType::TraefikNative),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceConfig {
	pub name: String,
	#[serde(rename = "type")]
	pub type_: DataSourceType,
	pub url: String,
	#[serde(default)]
	pub basic_auth_user: Option<String>,
	#[serde(default)]
	pub basic_auth_password: Option<String>,
	#[serde(default)]
	pub active: bool,
}
