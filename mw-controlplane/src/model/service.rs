use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::resource::{ResourceStatus, SourceType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceType {
	LoadBalancer,
	Weighted,
	Mirroring,
	Failover,
}

impl ServiceType {
	pub fn as_str(&self) -> &'static str {
		match self {
			ServiceType::LoadBalancer => "load-balancer",
			ServiceType::Weighted => "weighted",
			ServiceType::Mirroring => "mirroring",
			ServiceType::Failover => "failover",
		}
	}

	pub fn parse(s: &str) -> Option<Self> {
		match s {
			"load-balancer" => Some(ServiceType::LoadBalancer),
			"weighted" => Some(ServiceType::Weighted),
			"mirroring" => Some(ServiceType::Mirroring),
			"failover" => Some(ServiceType::Failover),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
	pub id: String,
	pub name: String,
	#[serde(rename = "type")]
	pub type_: ServiceType,
	pub config: Value,
	pub status: ResourceStatus,
	pub source_type: SourceType,
}
