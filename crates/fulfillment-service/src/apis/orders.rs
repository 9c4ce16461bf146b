//! Order lifecycle endpoints.

use crate::apis::ApiError;
use crate::server::AppState;
use axum::extract::{Path, Query, State};
use axum::response::Json;
use fulfillment_core::EngineError;
use fulfillment_types::{
	admin_actor, CancelRequest, CorrectStatusRequest, LockRequest, NewOrderRequest, NoteRequest,
	Order, OrderHealth, OrderStatus, SetStatusRequest, StatusResponse, UnlockRequest,
};
use serde::Deserialize;

fn status_response(order: &Order) -> StatusResponse {
	StatusResponse {
		order_id: order.id.clone(),
		status: order.status,
		locked: order.is_locked(),
		timeline_length: order.timeline.len(),
	}
}

/// Handles POST /api/orders requests.
pub async fn create_order(
	State(state): State<AppState>,
	Json(request): Json<NewOrderRequest>,
) -> Result<Json<Order>, ApiError> {
	let order = state.engine.orders().create_order(request).await?;
	Ok(Json(order))
}

/// Query parameters for order listing.
#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
	/// Optional status filter, snake_case.
	pub status: Option<String>,
}

/// Handles GET /api/orders requests.
pub async fn list_orders(
	State(state): State<AppState>,
	Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<Order>>, ApiError> {
	let status = query
		.status
		.map(|s| s.parse::<OrderStatus>())
		.transpose()
		.map_err(EngineError::Validation)?;
	let orders = state.engine.orders().list_orders(status).await?;
	Ok(Json(orders))
}

/// Handles GET /api/orders/{id} requests.
pub async fn get_order(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<Order>, ApiError> {
	let order = state.engine.orders().get_order(&id).await?;
	Ok(Json(order))
}

/// Handles GET /api/orders/{id}/health requests.
pub async fn get_order_health(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<OrderHealth>, ApiError> {
	let health = state.engine.order_health(&id).await?;
	Ok(Json(health))
}

/// Handles POST /api/orders/{id}/status requests.
pub async fn set_status(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<SetStatusRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
	let order = state
		.engine
		.orders()
		.set_status(
			&id,
			request.status,
			admin_actor(&request.actor),
			request.reason,
			request.lock,
		)
		.await?;
	Ok(Json(status_response(&order)))
}

/// Handles POST /api/orders/{id}/correct-status requests.
pub async fn correct_status(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<CorrectStatusRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
	let order = state
		.engine
		.orders()
		.correct_status(&id, request.status, &request.actor, request.reason)
		.await?;
	Ok(Json(status_response(&order)))
}

/// Handles POST /api/orders/{id}/lock requests.
pub async fn lock_override(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<LockRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
	let order = state
		.engine
		.orders()
		.lock_override(&id, request.locked_status, request.reason, &request.actor)
		.await?;
	Ok(Json(status_response(&order)))
}

/// Handles POST /api/orders/{id}/unlock requests.
pub async fn unlock_override(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<UnlockRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
	let order = state
		.engine
		.orders()
		.unlock_override(&id, &request.actor)
		.await?;
	Ok(Json(status_response(&order)))
}

/// Handles POST /api/orders/{id}/cancel requests.
pub async fn cancel_order(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<CancelRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
	let order = state
		.engine
		.orders()
		.cancel(&id, request.reason, admin_actor(&request.actor))
		.await?;
	Ok(Json(status_response(&order)))
}

/// Handles POST /api/orders/{id}/notes requests.
pub async fn add_note(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<NoteRequest>,
) -> Result<Json<Order>, ApiError> {
	let order = state
		.engine
		.orders()
		.add_note(&id, request.note, request.author)
		.await?;
	Ok(Json(order))
}
