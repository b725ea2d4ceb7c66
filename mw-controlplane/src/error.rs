//! The top-level error taxonomy. Every subsystem error converges here at the
//! HTTP boundary (see `http::error`), where a single `IntoResponse` impl maps
//! each variant to a status code and a `{"error": "..."}` body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::datasource::DataSourceError;
use crate::mtls::MtlsError;
use crate::staticconfig::StaticConfigError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
	#[error("validation failed: {0}")]
	Validation(String),
	#[error("not found: {0}")]
	NotFound(String),
	#[error("conflict: {0}")]
	Conflict(String),
	#[error("unauthorized")]
	Unauthorized,
	#[error("upstream unreachable: {0}")]
	Unreachable(String),
	#[error("upstream response malformed: {0}")]
	Malformed(String),
	#[error("operation timed out: {0}")]
	Timeout(String),
	#[error("persistence failure: {0}")]
	Persistence(String),
	#[error("internal error: {0}")]
	Internal(String),
}

impl From<StoreError> for ApiError {
	fn from(e: StoreError) -> Self {
		match e {
			StoreError::NotFound(what) => ApiError::NotFound(what),
			StoreError::Conflict(what) => ApiError::Conflict(what),
			StoreError::InvalidData(what) => ApiError::Validation(what),
			StoreError::Connection(e) => ApiError::Persistence(e.to_string()),
			StoreError::Serialization(e) => ApiError::Persistence(e.to_string()),
			StoreError::Panicked(msg) => ApiError::Internal(msg),
		}
	}
}

impl From<DataSourceError> for ApiError {
	fn from(e: DataSourceError) -> Self {
		match e {
			DataSourceError::Unreachable(m) => ApiError::Unreachable(m),
			DataSourceError::Unauthorized => ApiError::Unauthorized,
			DataSourceError::Malformed(m) => ApiError::Malformed(m),
			DataSourceError::Timeout(m) => ApiError::Timeout(m),
		}
	}
}

impl From<MtlsError> for ApiError {
	fn from(e: MtlsError) -> Self {
		match e {
			MtlsError::AlreadyExists(m) => ApiError::Conflict(m),
			MtlsError::NotFound(m) => ApiError::NotFound(m),
			MtlsError::NoCa => ApiError::Validation("no CA has been generated".into()),
			MtlsError::InvalidName(m) => ApiError::Validation(m),
			MtlsError::Store(e) => ApiError::from(e),
			MtlsError::Io(e) => ApiError::Internal(e.to_string()),
			MtlsError::Crypto(m) => ApiError::Internal(m),
		}
	}
}

impl From<StaticConfigError> for ApiError {
	fn from(e: StaticConfigError) -> Self {
		match e {
			StaticConfigError::Io(e) => ApiError::Internal(e.to_string()),
			StaticConfigError::Parse(m) => ApiError::Malformed(m),
			StaticConfigError::InvalidModuleName(m) => ApiError::Validation(m),
		}
	}
}

impl From<anyhow::Error> for ApiError {
	fn from(e: anyhow::Error) -> Self {
		ApiError::Internal(e.to_string())
	}
}

#[derive(Serialize)]
struct ErrorBody {
	error: String,
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = match &self {
			ApiError::Validation(_) => StatusCode::BAD_REQUEST,
			ApiError::NotFound(_) => StatusCode::NOT_FOUND,
			ApiError::Conflict(_) => StatusCode::CONFLICT,
			ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
			ApiError::Unreachable(_) => StatusCode::INTERNAL_SERVER_ERROR,
			ApiError::Malformed(_) => StatusCode::INTERNAL_SERVER_ERROR,
			ApiError::Timeout(_) => StatusCode::INTERNAL_SERVER_ERROR,
			ApiError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
			ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		};
		if status == StatusCode::INTERNAL_SERVER_ERROR {
			tracing::error!(error = %self, "request failed");
		}
		let body = ErrorBody {
			error: self.to_string(),
		};
		(status, axum::Json(body)).into_response()
	}
}

pub type ApiResult<T> = Result<T, ApiError>;
