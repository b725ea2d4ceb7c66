use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::model::{ResourceExternalMiddleware, ResourceMiddleware};
use crate::plugins::CataloguePlugin;
use crate::store::{AttachmentsRepo, MiddlewaresRepo, ResourcesRepo};

use super::AppState;

pub fn router() -> Router<AppState> {
	Router::new()
		.route("/plugins", get(list))
		.route("/plugins/install", axum::routing::post(install))
		.route("/plugins/remove", axum::routing::delete(remove))
		.route("/plugins/{name}/usage", get(usage))
		.route("/plugins/catalogue", get(catalogue))
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
	let plugins = state.static_config.list_plugins()?;
	let value = serde_json::to_value(&plugins).map_err(|e| anyhow::anyhow!(e))?;
	Ok(Json(value))
}

#[derive(Debug, Deserialize)]
struct InstallRequest {
	module_name: String,
	#[serde(default)]
	version: Option<String>,
}

#[derive(Debug, serde::Serialize)]
struct InstallResponse {
	key: String,
}

async fn install(State(state): State<AppState>, Json(req): Json<InstallRequest>) -> ApiResult<(StatusCode, Json<InstallResponse>)> {
	let key = state.static_config.install_plugin(&req.module_name, req.version.as_deref())?;
	state.catalogue.invalidate();
	Ok((StatusCode::CREATED, Json(InstallResponse { key })))
}

#[derive(Debug, Deserialize)]
struct RemoveRequest {
	key: String,
}

async fn remove(State(state): State<AppState>, Json(req): Json<RemoveRequest>) -> ApiResult<StatusCode> {
	let removed = state.static_config.remove_plugin(&req.key)?;
	if !removed {
		return Err(crate::error::ApiError::NotFound(format!("plugin '{}' is not installed", req.key)));
	}
	Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, serde::Serialize)]
struct UsageResponse {
	name: String,
	resource_ids: Vec<String>,
}

async fn usage(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Json<UsageResponse>> {
	let store = state.store.lock().await;
	let Some(middleware) = MiddlewaresRepo::get_by_name(store.conn(), &name)? else {
		return Ok(Json(UsageResponse { name, resource_ids: Vec::new() }));
	};
	let resources = ResourcesRepo::list_active(store.conn())?;
	let mut resource_ids = Vec::new();
	for resource in &resources {
		let internal: Vec<ResourceMiddleware> = AttachmentsRepo::list_internal(store.conn(), &resource.id)?;
		let external: Vec<ResourceExternalMiddleware> = AttachmentsRepo::list_external(store.conn(), &resource.id)?;
		if internal.iter().any(|a| a.middleware_id == middleware.id) || external.iter().any(|a| a.middleware_name == middleware.name) {
			resource_ids.push(resource.id.clone());
		}
	}
	Ok(Json(UsageResponse { name, resource_ids }))
}

async fn catalogue(State(state): State<AppState>) -> ApiResult<Json<std::sync::Arc<Vec<CataloguePlugin>>>> {
	let list = state
		.catalogue
		.list()
		.await
		.map_err(|e| crate::error::ApiError::Unreachable(e.to_string()))?;
	Ok(Json(list))
}
