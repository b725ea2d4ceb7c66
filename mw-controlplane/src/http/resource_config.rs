use axum::extract::{Path, State};
use axum::routing::put;
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::model::{MtlsOverlay, Resource, TcpBlock, clamp_priority};
use crate::store::ResourcesRepo;

use super::AppState;

pub fn router() -> Router<AppState> {
	Router::new()
		.route("/config/resources/{id}/priority", put(set_priority))
		.route("/config/resources/{id}/http", put(set_http))
		.route("/config/resources/{id}/tls", put(set_tls))
		.route("/config/resources/{id}/tcp", put(set_tcp))
		.route("/config/resources/{id}/headers", put(set_headers))
		.route("/config/resources/{id}/mtls", put(set_mtls))
}

async fn load(state: &AppState, id: &str) -> ApiResult<Resource> {
	let store = state.store.lock().await;
	Ok(ResourcesRepo::get(store.conn(), id)?)
}

async fn save(state: &AppState, resource: &Resource) -> ApiResult<()> {
	let store = state.store.lock().await;
	ResourcesRepo::update(store.conn(), resource)?;
	drop(store);
	state.config_proxy.invalidate().await;
	Ok(())
}

#[derive(Debug, Deserialize)]
struct PriorityRequest {
	priority: i64,
}

async fn set_priority(State(state): State<AppState>, Path(id): Path<String>, Json(req): Json<PriorityRequest>) -> ApiResult<Json<Resource>> {
	let mut resource = load(&state, &id).await?;
	resource.router_priority = clamp_priority(req.priority);
	resource.priority_manual = true;
	save(&state, &resource).await?;
	Ok(Json(resource))
}

#[derive(Debug, Deserialize)]
struct HttpRequest {
	entrypoints: String,
	#[serde(default)]
	tls_sans: Option<String>,
}

async fn set_http(State(state): State<AppState>, Path(id): Path<String>, Json(req): Json<HttpRequest>) -> ApiResult<Json<Resource>> {
	let mut resource = load(&state, &id).await?;
	resource.http_entrypoints = req.entrypoints;
	if let Some(sans) = req.tls_sans {
		resource.tls_sans = sans;
	}
	save(&state, &resource).await?;
	Ok(Json(resource))
}

#[derive(Debug, Deserialize)]
struct TlsRequest {
	tls_hardening_enabled: bool,
}

async fn set_tls(State(state): State<AppState>, Path(id): Path<String>, Json(req): Json<TlsRequest>) -> ApiResult<Json<Resource>> {
	let mut resource = load(&state, &id).await?;
	if req.tls_hardening_enabled && resource.mtls_enabled {
		return Err(ApiError::Conflict("tls-hardening cannot be enabled while mTLS is enabled on this resource".into()));
	}
	resource.tls_hardening_enabled = req.tls_hardening_enabled;
	save(&state, &resource).await?;
	Ok(Json(resource))
}

#[derive(Debug, Deserialize)]
struct TcpRequest {
	#[serde(default)]
	enabled: bool,
	#[serde(default)]
	entrypoints: String,
	#[serde(default)]
	sni_rule: String,
}

async fn set_tcp(State(state): State<AppState>, Path(id): Path<String>, Json(req): Json<TcpRequest>) -> ApiResult<Json<Resource>> {
	let mut resource = load(&state, &id).await?;
	resource.tcp = TcpBlock { enabled: req.enabled, entrypoints: req.entrypoints, sni_rule: req.sni_rule };
	save(&state, &resource).await?;
	Ok(Json(resource))
}

#[derive(Debug, Deserialize)]
struct HeadersRequest {
	custom_headers: serde_json::Value,
}

async fn set_headers(State(state): State<AppState>, Path(id): Path<String>, Json(req): Json<HeadersRequest>) -> ApiResult<Json<Resource>> {
	let mut resource = load(&state, &id).await?;
	resource.custom_headers = Some(req.custom_headers);
	save(&state, &resource).await?;
	Ok(Json(resource))
}

#[derive(Debug, Deserialize)]
struct MtlsRequest {
	mtls_enabled: bool,
	#[serde(default)]
	overlay: Option<MtlsOverlay>,
}

async fn set_mtls(State(state): State<AppState>, Path(id): Path<String>, Json(req): Json<MtlsRequest>) -> ApiResult<Json<Resource>> {
	let mut resource = load(&state, &id).await?;
	if req.mtls_enabled && resource.tls_hardening_enabled {
		return Err(ApiError::Conflict("mTLS cannot be enabled while tls-hardening is enabled on this resource".into()));
	}
	resource.mtls_enabled = req.mtls_enabled;
	if let Some(overlay) = req.overlay {
		resource.mtls_overlay = overlay;
	}
	save(&state, &resource).await?;
	Ok(Json(resource))
}
