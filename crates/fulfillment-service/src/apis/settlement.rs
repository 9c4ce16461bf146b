//! Payment settlement endpoints.

use crate::apis::ApiError;
use crate::server::AppState;
use axum::extract::{Path, State};
use axum::response::Json;
use fulfillment_types::{
	AuthorizeRequest, ChargeRequest, PaymentRecord, RefundEligibility, RefundRequest,
	SettlementResponse,
};

/// Handles POST /api/orders/{id}/authorize requests.
pub async fn authorize(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<AuthorizeRequest>,
) -> Result<Json<PaymentRecord>, ApiError> {
	let payment = state.engine.settlement().authorize(&id, request).await?;
	Ok(Json(payment))
}

/// Handles POST /api/orders/{id}/charge requests.
pub async fn charge(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<ChargeRequest>,
) -> Result<Json<SettlementResponse>, ApiError> {
	let response = state.engine.settlement().charge(&id, request).await?;
	Ok(Json(response))
}

/// Handles POST /api/orders/{id}/refund requests.
pub async fn refund(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<RefundRequest>,
) -> Result<Json<SettlementResponse>, ApiError> {
	let response = state.engine.settlement().refund(&id, request).await?;
	Ok(Json(response))
}

/// Handles GET /api/orders/{id}/can-refund requests.
pub async fn can_refund(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<RefundEligibility>, ApiError> {
	let eligibility = state.engine.settlement().can_refund(&id).await?;
	Ok(Json(eligibility))
}
