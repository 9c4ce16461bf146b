//! Operator dashboard endpoints.

use crate::apis::ApiError;
use crate::server::AppState;
use axum::extract::State;
use axum::response::Json;
use fulfillment_types::{KpiSnapshot, Order, OrderHealth};
use serde::Serialize;

/// One order paired with its derived health, for the alert board.
#[derive(Debug, Serialize)]
pub struct AlertedOrder {
	pub order: Order,
	pub health: OrderHealth,
}

/// Handles GET /api/dashboard/kpis requests.
pub async fn kpis(State(state): State<AppState>) -> Result<Json<KpiSnapshot>, ApiError> {
	let snapshot = state.engine.kpi_snapshot().await?;
	Ok(Json(snapshot))
}

/// Handles GET /api/dashboard/alerts requests.
pub async fn alerts(State(state): State<AppState>) -> Result<Json<Vec<AlertedOrder>>, ApiError> {
	let alerted = state
		.engine
		.orders_with_alerts()
		.await?
		.into_iter()
		.map(|(order, health)| AlertedOrder { order, health })
		.collect();
	Ok(Json(alerted))
}
