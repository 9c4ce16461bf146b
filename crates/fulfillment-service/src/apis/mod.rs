//! HTTP API handlers for the operator surface.
//!
//! Handlers are thin: they deserialize the request, call into the engine,
//! and map `EngineError` variants onto HTTP status codes. All domain
//! validation lives in the engine so the API and any future surface
//! cannot diverge.

pub mod dashboard;
pub mod orders;
pub mod settlement;
pub mod tracking;
pub mod webhooks;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use fulfillment_core::EngineError;

/// Error wrapper mapping engine failures onto HTTP responses.
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
	fn from(err: EngineError) -> Self {
		ApiError(err)
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = match &self.0 {
			EngineError::Validation(_) => StatusCode::BAD_REQUEST,
			EngineError::NotFound(_) => StatusCode::NOT_FOUND,
			EngineError::Invariant(_) => StatusCode::CONFLICT,
			EngineError::Gateway(_) => StatusCode::BAD_GATEWAY,
			EngineError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
		};
		if status.is_server_error() {
			tracing::error!("Request failed: {}", self.0);
		} else {
			tracing::debug!("Request rejected: {}", self.0);
		}
		(
			status,
			Json(serde_json::json!({ "error": self.0.to_string() })),
		)
			.into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn engine_errors_map_to_expected_statuses() {
		let cases = [
			(EngineError::Validation("v".into()), StatusCode::BAD_REQUEST),
			(EngineError::NotFound("n".into()), StatusCode::NOT_FOUND),
			(EngineError::Invariant("i".into()), StatusCode::CONFLICT),
			(EngineError::Gateway("g".into()), StatusCode::BAD_GATEWAY),
			(
				EngineError::Storage("s".into()),
				StatusCode::INTERNAL_SERVER_ERROR,
			),
		];
		for (error, expected) in cases {
			let response = ApiError(error).into_response();
			assert_eq!(response.status(), expected);
		}
	}
}
