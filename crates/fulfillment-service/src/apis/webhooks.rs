//! Gateway notification webhook.

use crate::apis::ApiError;
use crate::server::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use fulfillment_types::GatewayNotification;

/// Handles POST /api/webhooks/gateway requests.
///
/// Delivery is at-least-once; duplicates are absorbed by the engine's
/// event-id dedupe, so this endpoint is safe to retry.
pub async fn gateway_notification(
	State(state): State<AppState>,
	Json(notification): Json<GatewayNotification>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
	state
		.engine
		.settlement()
		.handle_notification(notification)
		.await?;
	Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "status": "accepted" }))))
}
