use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
	Active,
	Disabled,
}

impl ResourceStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			ResourceStatus::Active => "active",
			ResourceStatus::Disabled => "disabled",
		}
	}

	pub fn parse(s: &str) -> Option<Self> {
		match s {
			"active" => Some(ResourceStatus::Active),
			"disabled" => Some(ResourceStatus::Disabled),
			_ => None,
		}
	}
}

/// Provenance tag controlling whether the reconciler may mutate a resource.
/// Anything other than `Manual` names a `DataSourceConfig.type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
	Manual,
	RouterCentric,
	TraefikNative,
}

impl SourceType {
	pub fn as_str(&self) -> &'static str {
		match self {
			SourceType::Manual => "manual",
			SourceType::RouterCentric => "router-centric",
			SourceType::TraefikNative => "traefik-native",
		}
	}

	pub fn parse(s: &str) -> Option<Self> {
		match s {
			"manual" => Some(SourceType::Manual),
			"router-centric" => Some(SourceType::RouterCentric),
			"traefik-native" => Some(SourceType::TraefikNative),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TcpBlock {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default)]
	pub entrypoints: String,
	/// SNI match rule. Defaults to `HostSNI(\`host\`)` when empty at merge time.
	#[serde(default)]
	pub sni_rule: String,
}

/// The per-resource mTLS overlay: rule set, header mapping, and reject behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MtlsOverlay {
	#[serde(default)]
	pub rules: Option<Value>,
	#[serde(default)]
	pub header_mapping: Option<Value>,
	#[serde(default)]
	pub reject_message: Option<String>,
	/// Unspecified renders as 403 at merge time — see `configproxy`.
	#[serde(default)]
	pub reject_code: Option<u16>,
	#[serde(default)]
	pub refresh_interval_secs: Option<u64>,
	#[serde(default)]
	pub external_data_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
	pub id: String,
	#[serde(default)]
	pub upstream_router_id: Option<String>,
	pub host: String,
	pub service_id: String,
	#[serde(default)]
	pub org: Option<String>,
	#[serde(default)]
	pub site: Option<String>,
	pub status: ResourceStatus,
	pub source_type: SourceType,
	pub router_priority: i64,
	#[serde(default)]
	pub priority_manual: bool,
	#[serde(default)]
	pub http_entrypoints: String,
	#[serde(default)]
	pub tls_sans: String,
	#[serde(default)]
	pub tcp: TcpBlock,
	#[serde(default)]
	pub custom_headers: Option<Value>,
	#[serde(default)]
	pub mtls_enabled: bool,
	#[serde(default)]
	pub tls_hardening_enabled: bool,
	#[serde(default)]
	pub secure_headers_enabled: bool,
	#[serde(default)]
	pub mtls_overlay: MtlsOverlay,
	/// Canonical hash of the upstream-derived fields as of the last reconciler
	/// write (see `reconciler::fingerprint_of_router`); `None` for resources
	/// that have never been touched by the reconciler (`source_type = manual`).
	#[serde(default)]
	pub upstream_fingerprint: Option<String>,
}

impl Resource {
	/// `true` if, per the invariant, this resource may be physically deleted.
	pub fn deletable(&self) -> bool {
		self.status == ResourceStatus::Disabled
	}
}
