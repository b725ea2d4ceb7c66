use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;

use crate::datasource;
use crate::error::{ApiError, ApiResult};
use crate::model::{DataSourceConfig, DataSourceType};
use crate::store::DataSourceConfigRepo;

use super::AppState;

pub fn router() -> Router<AppState> {
	Router::new()
		.route("/datasource", get(list))
		.route("/datasource/active", get(get_active).put(set_active))
		.route("/datasource/{name}", put(upsert))
		.route("/datasource/test/{name}", axum::routing::post(test))
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<DataSourceConfig>>> {
	let store = state.store.lock().await;
	Ok(Json(DataSourceConfigRepo::list(store.conn())?))
}

async fn get_active(State(state): State<AppState>) -> ApiResult<Json<Option<DataSourceConfig>>> {
	let store = state.store.lock().await;
	Ok(Json(DataSourceConfigRepo::active(store.conn())?))
}

#[derive(Debug, Deserialize)]
struct SetActiveRequest {
	name: String,
}

async fn set_active(State(state): State<AppState>, Json(req): Json<SetActiveRequest>) -> ApiResult<Json<DataSourceConfig>> {
	let store = state.store.lock().await;
	DataSourceConfigRepo::set_active(store.conn(), &req.name)?;
	let cfg = DataSourceConfigRepo::get(store.conn(), &req.name)?;
	drop(store);
	state.config_proxy.invalidate().await;
	Ok(Json(cfg))
}

#[derive(Debug, Deserialize)]
struct UpsertRequest {
	#[serde(rename = "type")]
	type_: String,
	url: String,
	#[serde(default)]
	basic_auth_user: Option<String>,
	#[serde(default)]
	basic_auth_password: Option<String>,
	#[serde(default)]
	active: bool,
}

async fn upsert(State(state): State<AppState>, Path(name): Path<String>, Json(req): Json<UpsertRequest>) -> ApiResult<Json<DataSourceConfig>> {
	let type_ = DataSourceType::parse(&req.type_).ok_or_else(|| ApiError::Validation(format!("'{}' must be router-centric or traefik-native", req.type_)))?;
	let cfg = DataSourceConfig {
		name: name.clone(),
		type_,
		url: req.url,
		basic_auth_user: req.basic_auth_user,
		basic_auth_password: req.basic_auth_password,
		active: req.active,
	};
	let store = state.store.lock().await;
	DataSourceConfigRepo::upsert(store.conn(), &cfg)?;
	if cfg.active {
		DataSourceConfigRepo::set_active(store.conn(), &name)?;
	}
	drop(store);
	state.config_proxy.invalidate().await;
	Ok(Json(cfg))
}

#[derive(Debug, serde::Serialize)]
struct TestResult {
	reachable: bool,
	router_count: Option<usize>,
	error: Option<String>,
}

async fn test(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Json<TestResult>> {
	let cfg = {
		let store = state.store.lock().await;
		DataSourceConfigRepo::get(store.conn(), &name)?
	};
	let client = datasource::build(&cfg, state.http.clone());
	match client.fetch(state.config.datasource_deadline()).await {
		Ok(inventory) => Ok(Json(TestResult { reachable: true, router_count: Some(inventory.routers.len()), error: None })),
		Err(e) => Ok(Json(TestResult { reachable: false, router_count: None, error: Some(e.to_string()) })),
	}
}
