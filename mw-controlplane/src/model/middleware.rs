use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed allow-list of canonical middleware kinds the proxy understands.
pub const CANONICAL_MIDDLEWARE_TYPES: &[&str] = &[
	"basicAuth",
	"digestAuth",
	"forwardAuth",
	"ipAllowList",
	"rateLimit",
	"headers",
	"stripPrefix",
	"stripPrefixRegex",
	"addPrefix",
	"redirectRegex",
	"redirectScheme",
	"replacePath",
	"replacePathRegex",
	"chain",
	"plugin",
	"buffering",
	"circuitBreaker",
	"compress",
	"contentType",
	"errors",
	"grpcWeb",
	"inFlightReq",
	"passTLSClientCert",
	"retry",
];

pub fn is_canonical_type(type_name: &str) -> bool {
	CANONICAL_MIDDLEWARE_TYPES.contains(&type_name)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Middleware {
	pub id: String,
	pub name: String,
	#[serde(rename = "type")]
	pub type_: String,
	pub config: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
	Middleware,
	Service,
	Resource,
}

impl TemplateKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			TemplateKind::Middleware => "middleware",
			TemplateKind::Service => "service",
			TemplateKind::Resource => "resource",
		}
	}
}

/// Tombstone recording a prior operator deletion, so the reconciler does not
/// resurrect the same concept when it reappears upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedTemplate {
	pub id: String,
	#[serde(rename = "type")]
	pub kind: TemplateKind,
}
