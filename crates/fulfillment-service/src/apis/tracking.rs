//! Tracking and procurement endpoints.

use crate::apis::ApiError;
use crate::server::AppState;
use axum::extract::{Path, State};
use axum::response::Json;
use fulfillment_types::{Order, SupplierOrderRequest, TrackingRequest};

/// Handles POST /api/orders/{id}/items/{item_id}/tracking requests.
pub async fn set_tracking_leg(
	Path((id, item_id)): Path<(String, String)>,
	State(state): State<AppState>,
	Json(request): Json<TrackingRequest>,
) -> Result<Json<Order>, ApiError> {
	let order = state
		.engine
		.tracking()
		.set_tracking_leg(&id, &item_id, request)
		.await?;
	Ok(Json(order))
}

/// Handles POST /api/orders/{id}/items/{item_id}/supplier-order requests.
pub async fn set_supplier_order(
	Path((id, item_id)): Path<(String, String)>,
	State(state): State<AppState>,
	Json(request): Json<SupplierOrderRequest>,
) -> Result<Json<Order>, ApiError> {
	let order = state
		.engine
		.tracking()
		.set_supplier_order(&id, &item_id, request)
		.await?;
	Ok(Json(order))
}
