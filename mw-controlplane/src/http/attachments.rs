use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::model::{ResourceExternalMiddleware, ResourceMiddleware, clamp_priority};
use crate::store::AttachmentsRepo;

use super::AppState;

pub fn router() -> Router<AppState> {
	Router::new()
		.route("/resources/{id}/middlewares", get(list_internal).post(attach_one))
		.route("/resources/{id}/middlewares/bulk", post(attach_bulk))
		.route("/resources/{id}/middlewares/{middleware_id}", axum::routing::delete(detach_one))
		.route(
			"/resources/{id}/external-middlewares",
			get(list_external).post(attach_external_one),
		)
		.route(
			"/resources/{id}/external-middlewares/{name}",
			axum::routing::delete(detach_external_one),
		)
}

#[derive(Debug, Deserialize)]
struct AttachRequest {
	middleware_id: String,
	#[serde(default)]
	priority: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct BulkAttachRequest {
	attachments: Vec<AttachRequest>,
}

#[derive(Debug, Deserialize)]
struct AttachExternalRequest {
	middleware_name: String,
	#[serde(default = "default_provider")]
	provider: String,
	#[serde(default)]
	priority: Option<i64>,
}

fn default_provider() -> String {
	"traefik".to_string()
}

async fn list_internal(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Vec<ResourceMiddleware>>> {
	let store = state.store.lock().await;
	Ok(Json(AttachmentsRepo::list_internal(store.conn(), &id)?))
}

async fn list_external(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Vec<ResourceExternalMiddleware>>> {
	let store = state.store.lock().await;
	Ok(Json(AttachmentsRepo::list_external(store.conn(), &id)?))
}

async fn attach_one(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Json(req): Json<AttachRequest>,
) -> ApiResult<StatusCode> {
	let store = state.store.lock().await;
	let priority = clamp_priority(req.priority.unwrap_or(crate::model::DEFAULT_PRIORITY));
	AttachmentsRepo::attach_internal(store.conn(), &id, &req.middleware_id, priority)?;
	state.config_proxy.invalidate().await;
	Ok(StatusCode::CREATED)
}

async fn attach_bulk(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Json(req): Json<BulkAttachRequest>,
) -> ApiResult<StatusCode> {
	if req.attachments.is_empty() {
		return Err(ApiError::Validation("attachments must not be empty".into()));
	}
	let store = state.store.lock().await;
	for attachment in &req.attachments {
		let priority = clamp_priority(attachment.priority.unwrap_or(crate::model::DEFAULT_PRIORITY));
		AttachmentsRepo::attach_internal(store.conn(), &id, &attachment.middleware_id, priority)?;
	}
	state.config_proxy.invalidate().await;
	Ok(StatusCode::CREATED)
}

async fn detach_one(State(state): State<AppState>, Path((id, middleware_id)): Path<(String, String)>) -> ApiResult<StatusCode> {
	let store = state.store.lock().await;
	AttachmentsRepo::detach_internal(store.conn(), &id, &middleware_id)?;
	state.config_proxy.invalidate().await;
	Ok(StatusCode::NO_CONTENT)
}

async fn attach_external_one(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Json(req): Json<AttachExternalRequest>,
) -> ApiResult<StatusCode> {
	let store = state.store.lock().await;
	let priority = clamp_priority(req.priority.unwrap_or(crate::model::DEFAULT_PRIORITY));
	AttachmentsRepo::attach_external(store.conn(), &id, &req.middleware_name, &req.provider, priority)?;
	state.config_proxy.invalidate().await;
	Ok(StatusCode::CREATED)
}

#[derive(Debug, Deserialize)]
struct ProviderQuery {
	#[serde(default = "default_provider")]
	provider: String,
}

async fn detach_external_one(
	State(state): State<AppState>,
	Path((id, name)): Path<(String, String)>,
	Query(q): Query<ProviderQuery>,
) -> ApiResult<StatusCode> {
	let store = state.store.lock().await;
	AttachmentsRepo::detach_external(store.conn(), &id, &name, &q.provider)?;
	state.config_proxy.invalidate().await;
	Ok(StatusCode::NO_CONTENT)
}
