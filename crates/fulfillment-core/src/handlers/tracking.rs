//! Tracking and procurement handler.
//!
//! Records carrier tracking on either leg of an order item and supplier
//! procurement facts. Both operations replace the previous value; the
//! latest record wins, and the order's `updated_at` reflects it.

use crate::engine::event_bus::EventBus;
use crate::locks::OrderLocks;
use crate::state::OrderStateMachine;
use crate::EngineError;
use chrono::Utc;
use fulfillment_types::{
	truncate_id, DomesticTracking, FulfillmentEvent, InternationalTracking, Leg, Order,
	SupplierOrder, SupplierOrderRequest, TrackingEvent, TrackingRequest,
};
use std::sync::Arc;
use tracing::instrument;

/// Handler for tracking legs and supplier orders.
pub struct TrackingHandler {
	state_machine: Arc<OrderStateMachine>,
	locks: Arc<OrderLocks>,
	event_bus: EventBus,
}

impl TrackingHandler {
	pub fn new(
		state_machine: Arc<OrderStateMachine>,
		locks: Arc<OrderLocks>,
		event_bus: EventBus,
	) -> Self {
		Self {
			state_machine,
			locks,
			event_bus,
		}
	}

	fn require_item(order: &Order, item_id: &str) -> Result<(), EngineError> {
		if order.status == fulfillment_types::OrderStatus::Cancelled {
			return Err(EngineError::Invariant(format!(
				"order '{}' is cancelled and accepts no tracking updates",
				order.id
			)));
		}
		if order.item(item_id).is_none() {
			return Err(EngineError::NotFound(format!(
				"item '{}' not found on order '{}'",
				item_id, order.id
			)));
		}
		Ok(())
	}

	/// Records carrier tracking for one leg of an item. The carrier name is
	/// resolved against the leg's own vocabulary.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id), leg = %request.leg))]
	pub async fn set_tracking_leg(
		&self,
		order_id: &str,
		item_id: &str,
		request: TrackingRequest,
	) -> Result<Order, EngineError> {
		if request.tracking_number.trim().is_empty() {
			return Err(EngineError::Validation(
				"tracking number must not be empty".to_string(),
			));
		}

		let mutex = self.locks.for_order(order_id);
		let _guard = mutex.lock().await;

		let order = self.state_machine.get_order(order_id).await?;
		Self::require_item(&order, item_id)?;

		let leg = request.leg;
		let item_key = item_id.to_string();
		let updated = match leg {
			Leg::Israel => {
				let carrier = request
					.international_carrier()
					.map_err(EngineError::Validation)?;
				let record = InternationalTracking {
					carrier,
					tracking_number: request.tracking_number.clone(),
					estimated_date: request.estimated_date,
					recorded_at: Utc::now(),
				};
				self.state_machine
					.update_order_with(order_id, move |o| {
						if let Some(item) = o.items.iter_mut().find(|i| i.id == item_key) {
							item.israel = Some(record);
						}
					})
					.await?
			},
			Leg::Customer => {
				let carrier = request
					.domestic_carrier()
					.map_err(EngineError::Validation)?;
				let record = DomesticTracking {
					carrier,
					tracking_number: request.tracking_number.clone(),
					estimated_date: request.estimated_date,
					recorded_at: Utc::now(),
				};
				self.state_machine
					.update_order_with(order_id, move |o| {
						if let Some(item) = o.items.iter_mut().find(|i| i.id == item_key) {
							item.customer = Some(record);
						}
					})
					.await?
			},
		};

		self.event_bus
			.publish(FulfillmentEvent::Tracking(TrackingEvent::LegSet {
				order_id: order_id.to_string(),
				item_id: item_id.to_string(),
				leg,
			}))
			.ok();
		tracing::info!(tracking_number = %request.tracking_number, "Tracking leg recorded");
		Ok(updated)
	}

	/// Records supplier procurement facts on an item. Marks the item as
	/// purchased, which the stage advancer reads as the Ordered
	/// precondition.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn set_supplier_order(
		&self,
		order_id: &str,
		item_id: &str,
		request: SupplierOrderRequest,
	) -> Result<Order, EngineError> {
		if request.supplier_order_number.trim().is_empty() {
			return Err(EngineError::Validation(
				"supplier order number must not be empty".to_string(),
			));
		}
		if let Some(cost) = request.actual_cost {
			if cost < rust_decimal::Decimal::ZERO {
				return Err(EngineError::Validation(
					"actual cost must not be negative".to_string(),
				));
			}
		}

		let mutex = self.locks.for_order(order_id);
		let _guard = mutex.lock().await;

		let order = self.state_machine.get_order(order_id).await?;
		Self::require_item(&order, item_id)?;

		let record = SupplierOrder {
			supplier_order_number: request.supplier_order_number.clone(),
			supplier_tracking_number: request.supplier_tracking_number,
			actual_cost: request.actual_cost,
			notes: request.notes,
			ordered_at: Utc::now(),
		};
		let item_key = item_id.to_string();
		let updated = self
			.state_machine
			.update_order_with(order_id, move |o| {
				if let Some(item) = o.items.iter_mut().find(|i| i.id == item_key) {
					item.supplier_order = Some(record);
				}
			})
			.await?;

		self.event_bus
			.publish(FulfillmentEvent::Tracking(TrackingEvent::SupplierOrderSet {
				order_id: order_id.to_string(),
				item_id: item_id.to_string(),
			}))
			.ok();
		tracing::info!(
			supplier_order_number = %request.supplier_order_number,
			"Supplier order recorded"
		);
		Ok(updated)
	}
}
