use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::model::{Resource, ResourceStatus, SourceType, TcpBlock};
use crate::store::{ResourceFilter, ResourcesRepo};

use super::{AppState, Page, PageQuery};

pub fn router() -> Router<AppState> {
	Router::new()
		.route("/resources", get(list).post(create))
		.route("/resources/{id}", get(get_one).put(update).delete(delete))
}

#[derive(Debug, Deserialize)]
struct ResourceListQuery {
	#[serde(flatten)]
	page: PageQuery,
	status: Option<String>,
	source_type: Option<String>,
}

async fn list(State(state): State<AppState>, Query(q): Query<ResourceListQuery>) -> ApiResult<Json<Page<Resource>>> {
	let filter = match q.status.as_deref() {
		Some("disabled") => ResourceFilter::Disabled,
		Some("all") => ResourceFilter::All,
		Some("active") | None => ResourceFilter::Active,
		Some(other) => return Err(ApiError::Validation(format!("unknown status filter '{other}'"))),
	};
	let store = state.store.lock().await;
	let (items, total) = ResourcesRepo::list(store.conn(), filter, q.source_type.as_deref(), q.page.page(), q.page_size())?;
	Ok(Json(Page { items, page: q.page.page(), page_size: q.page.page_size(), total }))
}

async fn get_one(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Resource>> {
	let store = state.store.lock().await;
	Ok(Json(ResourcesRepo::get(store.conn(), &id)?))
}

#[derive(Debug, Deserialize)]
struct CreateResourceRequest {
	host: String,
	service_id: String,
	#[serde(default)]
	org: Option<String>,
	#[serde(default)]
	site: Option<String>,
	#[serde(default)]
	http_entrypoints: String,
	#[serde(default)]
	tls_sans: String,
	#[serde(default)]
	tcp: TcpBlock,
	#[serde(default)]
	custom_headers: Option<serde_json::Value>,
}

async fn create(State(state): State<AppState>, Json(req): Json<CreateResourceRequest>) -> ApiResult<(StatusCode, Json<Resource>)> {
	if req.host.trim().is_empty() {
		return Err(ApiError::Validation("host must not be empty".into()));
	}
	let resource = Resource {
		id: Uuid::new_v4().to_string(),
		upstream_router_id: None,
		host: req.host,
		service_id: req.service_id,
		org: req.org,
		site: req.site,
		status: ResourceStatus::Active,
		source_type: SourceType::Manual,
		router_priority: crate::model::DEFAULT_PRIORITY,
		priority_manual: false,
		http_entrypoints: req.http_entrypoints,
		tls_sans: req.tls_sans,
		tcp: req.tcp,
		custom_headers: req.custom_headers,
		mtls_enabled: false,
		tls_hardening_enabled: false,
		secure_headers_enabled: false,
		mtls_overlay: Default::default(),
		upstream_fingerprint: None,
	};
	let store = state.store.lock().await;
	ResourcesRepo::insert(store.conn(), &resource)?;
	state.config_proxy.invalidate().await;
	Ok((StatusCode::CREATED, Json(resource)))
}

#[derive(Debug, Deserialize)]
struct UpdateResourceRequest {
	#[serde(default)]
	host: Option<String>,
	#[serde(default)]
	service_id: Option<String>,
	#[serde(default)]
	org: Option<String>,
	#[serde(default)]
	site: Option<String>,
	#[serde(default)]
	http_entrypoints: Option<String>,
	#[serde(default)]
	tls_sans: Option<String>,
	#[serde(default)]
	custom_headers: Option<serde_json::Value>,
}

async fn update(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Json(req): Json<UpdateResourceRequest>,
) -> ApiResult<Json<Resource>> {
	let store = state.store.lock().await;
	let mut resource = ResourcesRepo::get(store.conn(), &id)?;
	if let Some(host) = req.host {
		resource.host = host;
	}
	if let Some(service_id) = req.service_id {
		resource.service_id = service_id;
	}
	if req.org.is_some() {
		resource.org = req.org;
	}
	if req.site.is_some() {
		resource.site = req.site;
	}
	if let Some(ep) = req.http_entrypoints {
		resource.http_entrypoints = ep;
	}
	if let Some(sans) = req.tls_sans {
		resource.tls_sans = sans;
	}
	if req.custom_headers.is_some() {
		resource.custom_headers = req.custom_headers;
	}
	ResourcesRepo::update(store.conn(), &resource)?;
	state.config_proxy.invalidate().await;
	Ok(Json(resource))
}

async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
	let store = state.store.lock().await;
	let resource = ResourcesRepo::get(store.conn(), &id)?;
	if !resource.deletable() {
		return Err(ApiError::Conflict("only a disabled resource may be deleted".into()));
	}
	ResourcesRepo::delete(store.conn(), &id)?;
	state.config_proxy.invalidate().await;
	Ok(StatusCode::NO_CONTENT)
}
