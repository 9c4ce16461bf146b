//! HTTP server for the fulfillment operator API.
//!
//! Exposes the command surface (order lifecycle, settlement, tracking),
//! the read-side queries (orders, health, dashboard), and the gateway
//! notification webhook.

use axum::{
	routing::{get, post},
	Router,
};
use fulfillment_config::ApiConfig;
use fulfillment_core::FulfillmentEngine;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the engine for processing requests.
	pub engine: Arc<FulfillmentEngine>,
}

/// Starts the HTTP server for the API.
///
/// This function creates and configures the HTTP server with routing,
/// middleware, and error handling for all endpoints.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<FulfillmentEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app_state = AppState { engine };

	let app = Router::new()
		.nest("/api", api_router())
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CorsLayer::permissive()),
		)
		.with_state(app_state);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Fulfillment API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

fn api_router() -> Router<AppState> {
	Router::new()
		.route(
			"/orders",
			post(crate::apis::orders::create_order).get(crate::apis::orders::list_orders),
		)
		.route("/orders/{id}", get(crate::apis::orders::get_order))
		.route("/orders/{id}/health", get(crate::apis::orders::get_order_health))
		.route("/orders/{id}/status", post(crate::apis::orders::set_status))
		.route(
			"/orders/{id}/correct-status",
			post(crate::apis::orders::correct_status),
		)
		.route("/orders/{id}/lock", post(crate::apis::orders::lock_override))
		.route("/orders/{id}/unlock", post(crate::apis::orders::unlock_override))
		.route("/orders/{id}/cancel", post(crate::apis::orders::cancel_order))
		.route("/orders/{id}/notes", post(crate::apis::orders::add_note))
		.route("/orders/{id}/authorize", post(crate::apis::settlement::authorize))
		.route("/orders/{id}/charge", post(crate::apis::settlement::charge))
		.route("/orders/{id}/refund", post(crate::apis::settlement::refund))
		.route(
			"/orders/{id}/refundability",
			get(crate::apis::settlement::can_refund),
		)
		.route(
			"/orders/{id}/items/{item_id}/tracking",
			post(crate::apis::tracking::set_tracking_leg),
		)
		.route(
			"/orders/{id}/items/{item_id}/supplier-order",
			post(crate::apis::tracking::set_supplier_order),
		)
		.route("/dashboard/kpi", get(crate::apis::dashboard::kpis))
		.route("/dashboard/alerts", get(crate::apis::dashboard::alerts))
		.route(
			"/webhooks/gateway",
			post(crate::apis::webhooks::gateway_notification),
		)
}
