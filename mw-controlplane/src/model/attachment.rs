use serde::{Deserialize, Serialize};

/// `(resource_id, middleware_id, priority)`. Unique per `(resource_id, middleware_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceMiddleware {
	pub id: i64,
	pub resource_id: String,
	pub middleware_id: String,
	pub priority: i64,
}

/// An attachment to an upstream-native middleware this system does not own,
/// identified by `(middleware_name, provider)` rather than a local id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceExternalMiddleware {
	pub id: i64,
	pub resource_id: String,
	pub middleware_name: String,
	pub provider: String,
	pub priority: i64,
}

/// Optional 1:1 override of a resource's default service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceService {
	pub resource_id: String,
	pub service_id: String,
}
