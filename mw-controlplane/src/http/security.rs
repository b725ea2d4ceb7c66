use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::model::{SecurityConfig, SecurityHeaders};
use crate::plugins::DuplicateCheckResult;
use crate::store::{DataSourceConfigRepo, ResourcesRepo, SecurityRepo};

use super::AppState;

pub fn router() -> Router<AppState> {
	Router::new()
		.route("/security/config", get(get_config))
		.route("/security/{kind}/{action}", axum::routing::post(toggle_global))
		.route("/security/headers/config", put(set_headers))
		.route("/security/middleware/duplicates", axum::routing::post(check_duplicates))
		.route("/security/resources/{id}/{kind}", put(toggle_resource))
}

async fn get_config(State(state): State<AppState>) -> ApiResult<Json<SecurityConfig>> {
	let store = state.store.lock().await;
	Ok(Json(SecurityRepo::get(store.conn())?))
}

async fn toggle_global(State(state): State<AppState>, Path((kind, action)): Path<(String, String)>) -> ApiResult<Json<SecurityConfig>> {
	let enable = match action.as_str() {
		"enable" => true,
		"disable" => false,
		other => return Err(ApiError::Validation(format!("'{other}' must be enable or disable"))),
	};
	let store = state.store.lock().await;
	let mut cfg = SecurityRepo::get(store.conn())?;
	match kind.as_str() {
		"tls" => cfg.tls_hardening_enabled = enable,
		"headers" => cfg.secure_headers_enabled = enable,
		other => return Err(ApiError::Validation(format!("'{other}' must be tls or headers"))),
	}
	SecurityRepo::save(store.conn(), &cfg)?;
	drop(store);
	state.config_proxy.invalidate().await;
	Ok(Json(cfg))
}

async fn set_headers(State(state): State<AppState>, Json(headers): Json<SecurityHeaders>) -> ApiResult<Json<SecurityConfig>> {
	let store = state.store.lock().await;
	let mut cfg = SecurityRepo::get(store.conn())?;
	cfg.headers = headers;
	SecurityRepo::save(store.conn(), &cfg)?;
	drop(store);
	state.config_proxy.invalidate().await;
	Ok(Json(cfg))
}

#[derive(Debug, Deserialize)]
struct DuplicatesRequest {
	name: String,
	#[serde(default)]
	plugin_name: Option<String>,
}

async fn check_duplicates(State(state): State<AppState>, Json(req): Json<DuplicatesRequest>) -> ApiResult<Json<DuplicateCheckResult>> {
	let active = {
		let store = state.store.lock().await;
		DataSourceConfigRepo::active(store.conn())?
	};
	let result = state
		.duplicates
		.check(active.as_ref(), state.config.datasource_deadline(), &req.name, req.plugin_name.as_deref())
		.await;
	Ok(Json(result))
}

#[derive(Debug, Deserialize)]
struct ResourceToggleRequest {
	enabled: bool,
}

async fn toggle_resource(
	State(state): State<AppState>,
	Path((id, kind)): Path<(String, String)>,
	Json(req): Json<ResourceToggleRequest>,
) -> ApiResult<Json<crate::model::Resource>> {
	let store = state.store.lock().await;
	let mut resource = ResourcesRepo::get(store.conn(), &id)?;
	match kind.as_str() {
		"tls" => {
			if req.enabled && resource.mtls_enabled {
				return Err(ApiError::Conflict("tls-hardening cannot be enabled while mTLS is enabled on this resource".into()));
			}
			resource.tls_hardening_enabled = req.enabled;
		}
		"headers" => {
			if req.enabled {
				let global = SecurityRepo::get(store.conn())?;
				if !global.secure_headers_enabled {
					return Err(ApiError::Conflict("secure headers must be enabled globally before a resource can opt in".into()));
				}
			}
			resource.secure_headers_enabled = req.enabled;
		}
		other => return Err(ApiError::Validation(format!("'{other}' must be tls or headers"))),
	}
	ResourcesRepo::update(store.conn(), &resource)?;
	drop(store);
	state.config_proxy.invalidate().await;
	Ok(Json(resource))
}
