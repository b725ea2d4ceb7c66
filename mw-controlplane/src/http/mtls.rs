use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::model::{MtlsClient, MtlsConfig, MtlsOverlay};
use crate::store::MtlsRepo;

use super::AppState;

pub fn router() -> Router<AppState> {
	Router::new()
		.route("/mtls/config", get(get_config))
		.route("/mtls/enable", post(enable))
		.route("/mtls/disable", post(disable))
		.route("/mtls/ca", post(generate_ca).delete(delete_ca))
		.route("/mtls/clients", get(list_clients).post(issue_client))
		.route("/mtls/clients/{id}", get(get_client).delete(delete_client))
		.route("/mtls/clients/{id}/p12", get(export_p12))
		.route("/mtls/clients/{id}/revoke", post(revoke_client))
		.route("/mtls/middleware", get(get_overlay).put(set_overlay))
}

async fn get_config(State(state): State<AppState>) -> ApiResult<Json<MtlsConfig>> {
	let store = state.store.lock().await;
	Ok(Json(MtlsRepo::get_config(store.conn())?))
}

async fn enable(State(state): State<AppState>) -> ApiResult<Json<MtlsConfig>> {
	let store = state.store.lock().await;
	let cfg = state.mtls.enable(store.conn())?;
	drop(store);
	state.config_proxy.invalidate().await;
	Ok(Json(cfg))
}

async fn disable(State(state): State<AppState>) -> ApiResult<Json<MtlsConfig>> {
	let store = state.store.lock().await;
	let cfg = state.mtls.disable(store.conn())?;
	drop(store);
	state.config_proxy.invalidate().await;
	Ok(Json(cfg))
}

#[derive(Debug, Deserialize)]
struct GenerateCaRequest {
	subject: String,
	#[serde(default = "default_validity_days")]
	validity_days: i64,
}

fn default_validity_days() -> i64 {
	3650
}

async fn generate_ca(State(state): State<AppState>, Json(req): Json<GenerateCaRequest>) -> ApiResult<(StatusCode, Json<MtlsConfig>)> {
	let store = state.store.lock().await;
	let cfg = state.mtls.generate_ca(store.conn(), &req.subject, req.validity_days)?;
	Ok((StatusCode::CREATED, Json(cfg)))
}

async fn delete_ca(State(state): State<AppState>) -> ApiResult<StatusCode> {
	let store = state.store.lock().await;
	state.mtls.delete_ca(store.conn())?;
	drop(store);
	state.config_proxy.invalidate().await;
	Ok(StatusCode::NO_CONTENT)
}

async fn list_clients(State(state): State<AppState>) -> ApiResult<Json<Vec<MtlsClient>>> {
	let store = state.store.lock().await;
	Ok(Json(MtlsRepo::list_clients(store.conn())?))
}

async fn get_client(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<MtlsClient>> {
	let store = state.store.lock().await;
	Ok(Json(MtlsRepo::get_client(store.conn(), &id)?))
}

#[derive(Debug, Deserialize)]
struct IssueClientRequest {
	name: String,
	#[serde(default = "default_validity_days")]
	validity_days: i64,
	p12_password: String,
}

async fn issue_client(State(state): State<AppState>, Json(req): Json<IssueClientRequest>) -> ApiResult<(StatusCode, Json<MtlsClient>)> {
	let store = state.store.lock().await;
	let client = state.mtls.issue_client(store.conn(), &req.name, req.validity_days, &req.p12_password)?;
	Ok((StatusCode::CREATED, Json(client)))
}

async fn revoke_client(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
	let store = state.store.lock().await;
	state.mtls.revoke(store.conn(), &id)?;
	Ok(StatusCode::NO_CONTENT)
}

async fn delete_client(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
	let store = state.store.lock().await;
	state.mtls.delete(store.conn(), &id)?;
	Ok(StatusCode::NO_CONTENT)
}

async fn export_p12(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<impl IntoResponse> {
	let store = state.store.lock().await;
	let (bundle, filename) = state.mtls.export_p12(store.conn(), &id)?;
	let headers = [
		(header::CONTENT_TYPE, "application/x-pkcs12".to_string()),
		(header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
	];
	Ok((headers, bundle))
}

async fn get_overlay(State(state): State<AppState>) -> ApiResult<Json<MtlsOverlay>> {
	let store = state.store.lock().await;
	Ok(Json(MtlsRepo::get_config(store.conn())?.overlay_template))
}

async fn set_overlay(State(state): State<AppState>, Json(overlay): Json<MtlsOverlay>) -> ApiResult<Json<MtlsOverlay>> {
	let store = state.store.lock().await;
	let mut cfg = MtlsRepo::get_config(store.conn())?;
	cfg.overlay_template = overlay;
	MtlsRepo::save_config(store.conn(), &cfg)?;
	drop(store);
	state.config_proxy.invalidate().await;
	Ok(Json(cfg.overlay_template))
}
