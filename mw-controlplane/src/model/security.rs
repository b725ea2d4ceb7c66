use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityHeaders {
	#[serde(default)]
	pub frame_deny: bool,
	#[serde(default)]
	pub content_type_nosniff: bool,
	#[serde(default)]
	pub browser_xss_filter: bool,
	#[serde(default)]
	pub force_sts_header: bool,
	#[serde(default)]
	pub sts_seconds: i64,
	#[serde(default)]
	pub sts_include_subdomains: bool,
	#[serde(default)]
	pub sts_preload: bool,
	#[serde(default)]
	pub custom_frame_options_value: Option<String>,
	#[serde(default)]
	pub referrer_policy: Option<String>,
}

impl Default for SecurityHeaders {
	fn default() -> Self {
		SecurityHeaders {
			frame_deny: true,
			content_type_nosniff: true,
			browser_xss_filter: true,
			force_sts_header: true,
			sts_seconds: 31_536_000,
			sts_include_subdomains: true,
			sts_preload: false,
			custom_frame_options_value: None,
			referrer_policy: Some("strict-origin-when-cross-origin".to_string()),
		}
	}
}

/// Singleton row (`id=1`) holding the global TLS-hardening and secure-headers
/// posture plus the full header field set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
	pub tls_hardening_enabled: bool,
	pub secure_headers_enabled: bool,
	pub headers: SecurityHeaders,
}

impl Default for SecurityConfig {
	fn default() -> Self {
		SecurityConfig {
			tls_hardening_enabled: false,
			secure_headers_enabled: false,
			headers: SecurityHeaders::default(),
		}
	}
}
