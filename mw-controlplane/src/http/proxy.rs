use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::configproxy::CacheStatus;
use crate::error::ApiResult;

use super::AppState;

pub fn router() -> Router<AppState> {
	Router::new()
		.route("/traefik-config", get(get_config))
		.route("/traefik-config/invalidate", axum::routing::post(invalidate))
		.route("/traefik-config/status", get(status))
}

async fn get_config(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
	let doc = state.config_proxy.get_merged().await?;
	Ok(Json((*doc).clone()))
}

async fn invalidate(State(state): State<AppState>) -> StatusCode {
	state.config_proxy.invalidate().await;
	StatusCode::NO_CONTENT
}

async fn status(State(state): State<AppState>) -> Json<CacheStatus> {
	Json(state.config_proxy.status().await)
}
