use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::model::{ResourceStatus, Service, ServiceType, SourceType};
use crate::store::ServicesRepo;

use super::AppState;

pub fn router() -> Router<AppState> {
	Router::new()
		.route("/services", get(list).post(create))
		.route("/services/{id}", get(get_one).put(update).delete(delete))
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Service>>> {
	let store = state.store.lock().await;
	Ok(Json(ServicesRepo::list(store.conn())?))
}

async fn get_one(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Service>> {
	let store = state.store.lock().await;
	Ok(Json(ServicesRepo::get(store.conn(), &id)?))
}

#[derive(Debug, Deserialize)]
struct CreateServiceRequest {
	name: String,
	#[serde(rename = "type")]
	type_: String,
	#[serde(default = "default_config")]
	config: serde_json::Value,
}

fn default_config() -> serde_json::Value {
	serde_json::json!({})
}

fn parse_type(type_: &str) -> ApiResult<ServiceType> {
	ServiceType::parse(type_).ok_or_else(|| ApiError::Validation(format!("'{type_}' must be one of load-balancer, weighted, mirroring, failover")))
}

async fn create(State(state): State<AppState>, Json(req): Json<CreateServiceRequest>) -> ApiResult<(StatusCode, Json<Service>)> {
	let type_ = parse_type(&req.type_)?;
	let service = Service {
		id: Uuid::new_v4().to_string(),
		name: req.name,
		type_,
		config: req.config,
		status: ResourceStatus::Active,
		source_type: SourceType::Manual,
	};
	let store = state.store.lock().await;
	ServicesRepo::insert(store.conn(), &service)?;
	state.config_proxy.invalidate().await;
	Ok((StatusCode::CREATED, Json(service)))
}

#[derive(Debug, Deserialize)]
struct UpdateServiceRequest {
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
	Json(req): Json<UpdateServiceRequest>,
) -> ApiResult<Json<Service>> {
	let store = state.store.lock().await;
	let mut service = ServicesRepo::get(store.conn(), &id)?;
	if let Some(name) = req.name {
		service.name = name;
	}
	if let Some(type_) = req.type_ {
		service.type_ = parse_type(&type_)?;
	}
	if let Some(config) = req.config {
		service.config = config;
	}
	ServicesRepo::update(store.conn(), &service)?;
	state.config_proxy.invalidate().await;
	Ok(Json(service))
}

async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
	let store = state.store.lock().await;
	ServicesRepo::delete(store.conn(), &id)?;
	state.config_proxy.invalidate().await;
	Ok(StatusCode::NO_CONTENT)
}
