use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use super::resource::MtlsOverlay;

/// Singleton row (`id=1`) holding process-wide mTLS posture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MtlsConfig {
	pub enabled: bool,
	pub has_ca: bool,
	pub ca_subject: Option<String>,
	pub ca_expiry: Option<DateTime<Utc>>,
	pub ca_cert_path: Option<String>,
	pub certs_base_path: String,
	pub overlay_template: MtlsOverlay,
}

impl Default for MtlsConfig {
	fn default() -> Self {
		MtlsConfig {
			enabled: false,
			has_ca: false,
			ca_subject: None,
			ca_expiry: None,
			ca_cert_path: None,
			certs_base_path: "./certs".to_string(),
			overlay_template: MtlsOverlay::default(),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MtlsClient {
	pub id: String,
	pub name: String,
	pub subject: String,
	pub expiry: DateTime<Utc>,
	pub revoked: bool,
	pub revoked_at: Option<DateTime<Utc>>,
	pub cert_pem: String,
	#[serde(skip_serializing)]
	pub encrypted_key_pem: String,
	#[serde(skip_serializing)]
	pub p12_bundle: Vec<u8>,
	#[serde(skip_serializing)]
	pub p12_password_hash: String,
}
