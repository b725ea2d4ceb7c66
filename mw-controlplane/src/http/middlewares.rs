use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::model::{Middleware, is_canonical_type};
use crate::store::MiddlewaresRepo;

use super::AppState;

pub fn router() -> Router<AppState> {
	Router::new()
		.route("/middlewares", get(list).post(create))
		.route("/middlewares/{id}", get(get_one).put(update).delete(delete))
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Middleware>>> {
	let store = state.store.lock().await;
	Ok(Json(MiddlewaresRepo::list(store.conn())?))
}

async fn get_one(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Middleware>> {
	let store = state.store.lock().await;
	Ok(Json(MiddlewaresRepo::get(store.conn(), &id)?))
}

#[derive(Debug, Deserialize)]
struct CreateMiddlewareRequest {
	name: String,
	#[serde(rename = "type")]
	type_: String,
	#[serde(default = "default_config")]
	config: serde_json::Value,
}

fn default_config() -> serde_json::Value {
	serde_json::json!({})
}

fn validate_type(type_: &str) -> ApiResult<()> {
	if !is_canonical_type(type_) {
		return Err(ApiError::Validation(format!("'{type_}' is not a recognized middleware type")));
	}
	Ok(())
}

async fn create(State(state): State<AppState>, Json(req): Json<CreateMiddlewareRequest>) -> ApiResult<(StatusCode, Json<Middleware>)> {
	validate_type(&req.type_)?;
	let middleware = Middleware {
		id: Uuid::new_v4().to_string(),
		name: req.name,
		type_: req.type_,
		config: req.config,
	};
	let store = state.store.lock().await;
	MiddlewaresRepo::insert(store.conn(), &middleware)?;
	state.config_proxy.invalidate().await;
	Ok((StatusCode::CREATED, Json(middleware)))
}

#[derive(Debug, Deserialize)]
struct UpdateMiddlewareRequest {
	#[serde(default)]
	name: Option<String>,
	#[serde(rename = "type", default)]
	type_: Option<String>,
	#[serde(default)]
	config: Option<serde_json::Value>,
}

async fn update(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Json(req): Json<UpdateMiddlewareRequest>,
) -> ApiResult<Json<Middleware>> {
	let store = state.store.lock().await;
	let mut middleware = MiddlewaresRepo::get(store.conn(), &id)?;
	if let Some(name) = req.name {
		middleware.name = name;
	}
	if let Some(type_) = req.type_ {
		validate_type(&type_)?;
		middleware.type_ = type_;
	}
	if let Some(config) = req.config {
		middleware.config = config;
	}
	MiddlewaresRepo::update(store.conn(), &middleware)?;
	state.config_proxy.invalidate().await;
	Ok(Json(middleware))
}

async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
	let store = state.store.lock().await;
	MiddlewaresRepo::delete(store.conn(), &id)?;
	state.config_proxy.invalidate().await;
	Ok(StatusCode::NO_CONTENT)
}
