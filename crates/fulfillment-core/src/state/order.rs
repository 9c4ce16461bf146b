//! Order state machine implementation.
//!
//! Validates and applies status transitions across the ten-stage
//! fulfillment pipeline: forward moves follow pipeline order, cancellation
//! is reachable from any non-terminal status by a human actor, and
//! backward moves happen only through an explicit administrative
//! correction. Every accepted change appends a timeline entry; the
//! timeline, not the bare status field, is the authoritative history.
//!
//! Callers must hold the per-order lock around any mutating call here so
//! the override-lock check and the transition apply are atomic.

use crate::EngineError;
use chrono::Utc;
use fulfillment_storage::StorageService;
use fulfillment_types::{
	Actor, Order, OrderStatus, StorageKey, TimelineEntry, TimelineKind,
};
use std::sync::Arc;

/// Manages order state transitions and persistence.
pub struct OrderStateMachine {
	storage: Arc<StorageService>,
}

impl OrderStateMachine {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Gets an order by id.
	pub async fn get_order(&self, order_id: &str) -> Result<Order, EngineError> {
		self.storage
			.retrieve(StorageKey::Orders.as_str(), order_id)
			.await
			.map_err(|e| match e {
				fulfillment_storage::StorageError::NotFound => {
					EngineError::NotFound(format!("order '{}' not found", order_id))
				},
				other => EngineError::Storage(other.to_string()),
			})
	}

	/// Stores a new order.
	pub async fn store_order(&self, order: &Order) -> Result<(), EngineError> {
		self.storage
			.store(StorageKey::Orders.as_str(), &order.id, order)
			.await
			.map_err(|e| EngineError::Storage(e.to_string()))
	}

	/// Returns every stored order. Read-side only.
	pub async fn list_orders(&self) -> Result<Vec<Order>, EngineError> {
		self.storage
			.retrieve_all(StorageKey::Orders.as_str())
			.await
			.map_err(|e| EngineError::Storage(e.to_string()))
	}

	/// Updates an order with a closure and persists it.
	pub async fn update_order_with<F>(
		&self,
		order_id: &str,
		updater: F,
	) -> Result<Order, EngineError>
	where
		F: FnOnce(&mut Order),
	{
		let mut order = self.get_order(order_id).await?;
		updater(&mut order);
		order.updated_at = Utc::now();
		self.storage
			.update(StorageKey::Orders.as_str(), order_id, &order)
			.await
			.map_err(|e| EngineError::Storage(e.to_string()))?;
		Ok(order)
	}

	/// Checks whether a transition is legal for the given actor.
	///
	/// Forward moves must strictly increase the pipeline position.
	/// Cancellation is reachable from any non-terminal status, but never by
	/// automation. Same-status is rejected as a no-change error rather than
	/// silently accepted.
	pub fn validate_transition(
		order: &Order,
		target: OrderStatus,
		actor: &Actor,
	) -> Result<(), EngineError> {
		if order.status == OrderStatus::Cancelled {
			return Err(EngineError::Invariant(format!(
				"order '{}' is cancelled and accepts no further transitions",
				order.id
			)));
		}
		if order.status == target {
			return Err(EngineError::Invariant(format!(
				"order '{}' is already in status '{}'",
				order.id, target
			)));
		}
		if order.is_locked() && actor.is_automation() {
			return Err(EngineError::Invariant(format!(
				"order '{}' is pinned by a manual override",
				order.id
			)));
		}
		if target == OrderStatus::Cancelled {
			if actor.is_automation() {
				return Err(EngineError::Invariant(
					"cancellation requires a human actor".to_string(),
				));
			}
			return Ok(());
		}
		if order.status == OrderStatus::Delivered {
			return Err(EngineError::Invariant(format!(
				"order '{}' is delivered; the pipeline is complete",
				order.id
			)));
		}
		let from_position = order.status.pipeline_position();
		let to_position = target.pipeline_position();
		match (from_position, to_position) {
			(Some(from), Some(to)) if to > from => Ok(()),
			_ => Err(EngineError::Invariant(format!(
				"transition '{}' -> '{}' moves backward; use an explicit correction",
				order.status, target
			))),
		}
	}

	/// Applies a validated transition, appending a timeline entry.
	pub async fn transition(
		&self,
		order_id: &str,
		target: OrderStatus,
		actor: Actor,
		reason: Option<String>,
	) -> Result<Order, EngineError> {
		let order = self.get_order(order_id).await?;
		Self::validate_transition(&order, target, &actor)?;

		let from = order.status;
		self.update_order_with(order_id, |o| {
			o.status = target;
			o.timeline.push(TimelineEntry {
				from,
				to: target,
				actor: actor.clone(),
				at: Utc::now(),
				reason,
				kind: TimelineKind::Transition,
			});
		})
		.await
	}

	/// Applies an explicit backward correction. Human-only.
	pub async fn correct(
		&self,
		order_id: &str,
		target: OrderStatus,
		admin: &str,
		reason: String,
	) -> Result<Order, EngineError> {
		let order = self.get_order(order_id).await?;

		if order.status == OrderStatus::Cancelled {
			return Err(EngineError::Invariant(format!(
				"order '{}' is cancelled and accepts no corrections",
				order.id
			)));
		}
		if target == OrderStatus::Cancelled {
			return Err(EngineError::Invariant(
				"corrections cannot cancel an order".to_string(),
			));
		}
		let from_position = order
			.status
			.pipeline_position()
			.ok_or_else(|| EngineError::Invariant("order is outside the pipeline".to_string()))?;
		let to_position = target
			.pipeline_position()
			.ok_or_else(|| EngineError::Invariant("target is outside the pipeline".to_string()))?;
		if to_position >= from_position {
			return Err(EngineError::Invariant(format!(
				"correction '{}' -> '{}' does not move backward; use a status change",
				order.status, target
			)));
		}

		let from = order.status;
		self.update_order_with(order_id, |o| {
			o.status = target;
			o.timeline.push(TimelineEntry {
				from,
				to: target,
				actor: Actor::Admin(admin.to_string()),
				at: Utc::now(),
				reason: Some(reason),
				kind: TimelineKind::Correction,
			});
		})
		.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use fulfillment_types::{PaymentRecord, Pricing};
	use rust_decimal_macros::dec;

	fn order_in(status: OrderStatus) -> Order {
		Order {
			id: "o-1".to_string(),
			order_number: "1001".to_string(),
			customer_ref: "c-1".to_string(),
			created_at: Utc::now(),
			updated_at: Utc::now(),
			status,
			pricing: Pricing {
				subtotal: dec!(100),
				shipping: dec!(20),
				discount: dec!(0),
				total: dec!(120),
			},
			manual_override: None,
			items: Vec::new(),
			payment: PaymentRecord::new(),
			admin_notes: Vec::new(),
			timeline: Vec::new(),
		}
	}

	fn admin() -> Actor {
		Actor::Admin("dana".to_string())
	}

	#[test]
	fn forward_moves_are_legal() {
		let order = order_in(OrderStatus::Pending);
		assert!(OrderStateMachine::validate_transition(
			&order,
			OrderStatus::PaymentHold,
			&Actor::Automation
		)
		.is_ok());
		// Skipping ahead is allowed for a human operator
		assert!(OrderStateMachine::validate_transition(
			&order,
			OrderStatus::ShippedToIsrael,
			&admin()
		)
		.is_ok());
	}

	#[test]
	fn same_status_is_rejected_not_ignored() {
		let order = order_in(OrderStatus::Ordered);
		let result =
			OrderStateMachine::validate_transition(&order, OrderStatus::Ordered, &admin());
		assert!(matches!(result, Err(EngineError::Invariant(_))));
	}

	#[test]
	fn cancelled_is_terminal() {
		let order = order_in(OrderStatus::Cancelled);
		for target in OrderStatus::ALL {
			if target == OrderStatus::Cancelled {
				continue;
			}
			let result = OrderStateMachine::validate_transition(&order, target, &admin());
			assert!(matches!(result, Err(EngineError::Invariant(_))));
		}
	}

	#[test]
	fn automation_cannot_cancel() {
		let order = order_in(OrderStatus::Ordered);
		let result = OrderStateMachine::validate_transition(
			&order,
			OrderStatus::Cancelled,
			&Actor::Automation,
		);
		assert!(matches!(result, Err(EngineError::Invariant(_))));
		assert!(OrderStateMachine::validate_transition(
			&order,
			OrderStatus::Cancelled,
			&admin()
		)
		.is_ok());
	}

	#[test]
	fn locked_order_blocks_automation_but_not_admins() {
		let mut order = order_in(OrderStatus::Ordered);
		order.manual_override = Some(fulfillment_types::ManualOverride {
			active: true,
			reason: "VIP exception".to_string(),
			locked_status: OrderStatus::Ordered,
			set_at: Utc::now(),
			set_by: "dana".to_string(),
		});

		let result = OrderStateMachine::validate_transition(
			&order,
			OrderStatus::ArrivedUsWarehouse,
			&Actor::Automation,
		);
		assert!(matches!(result, Err(EngineError::Invariant(_))));

		assert!(OrderStateMachine::validate_transition(
			&order,
			OrderStatus::ArrivedUsWarehouse,
			&admin()
		)
		.is_ok());
	}

	#[test]
	fn backward_moves_need_a_correction() {
		let order = order_in(OrderStatus::ShippedToIsrael);
		let result =
			OrderStateMachine::validate_transition(&order, OrderStatus::Ordered, &admin());
		assert!(matches!(result, Err(EngineError::Invariant(_))));
	}
}
