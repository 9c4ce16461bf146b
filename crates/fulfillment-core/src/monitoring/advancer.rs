//! Automated stage advancer.
//!
//! Periodically sweeps the order set and advances each order to its
//! immediate next pipeline stage, but only where the stage's entry
//! precondition is machine-checkable. Warehouse arrivals, customs
//! clearance and delivery confirmation are operator-entered facts and are
//! never auto-advanced. Terminal and locked orders are skipped outright.
//!
//! Sweeps are idempotent: re-running against unchanged inputs applies
//! nothing, because each proposal is re-validated under the per-order
//! lock before it is applied.

use crate::engine::event_bus::EventBus;
use crate::locks::OrderLocks;
use crate::state::OrderStateMachine;
use crate::EngineError;
use fulfillment_types::{
	truncate_id, Actor, FulfillmentEvent, Order, OrderEvent, OrderStatus, PaymentStatus,
};
use std::sync::Arc;

/// Periodic sweep that moves orders through machine-checkable stages.
pub struct StageAdvancer {
	state_machine: Arc<OrderStateMachine>,
	locks: Arc<OrderLocks>,
	event_bus: EventBus,
}

impl StageAdvancer {
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

	/// The stage this order is eligible to enter automatically, if any.
	///
	/// Only the immediate next pipeline stage is ever proposed, and only
	/// when its entry precondition can be verified from the order record.
	pub fn eligible_target(order: &Order) -> Option<OrderStatus> {
		if order.status.is_terminal() || order.is_locked() {
			return None;
		}
		let next = order.status.next_in_pipeline()?;
		let precondition_met = match next {
			OrderStatus::PaymentHold => matches!(
				order.payment.status,
				PaymentStatus::Hold | PaymentStatus::ReadyToCharge
			),
			OrderStatus::Ordered => order.all_items_purchased(),
			OrderStatus::ShippedToIsrael => order.all_items_have_israel_leg(),
			OrderStatus::ShippedToCustomer => order.all_items_have_customer_leg(),
			// Physical-world confirmations come from operators.
			_ => false,
		};
		precondition_met.then_some(next)
	}

	/// Runs one sweep over every stored order. Returns how many orders
	/// advanced.
	pub async fn sweep(&self) -> Result<usize, EngineError> {
		let orders = self.state_machine.list_orders().await?;
		let mut advanced = 0;

		for order in orders {
			let Some(target) = Self::eligible_target(&order) else {
				continue;
			};

			let mutex = self.locks.for_order(&order.id);
			let _guard = mutex.lock().await;

			// Re-check under the lock; an operator may have moved or
			// pinned the order since the list was read.
			let fresh = self.state_machine.get_order(&order.id).await?;
			if Self::eligible_target(&fresh) != Some(target) {
				continue;
			}

			match self
				.state_machine
				.transition(&order.id, target, Actor::Automation, None)
				.await
			{
				Ok(_) => {
					advanced += 1;
					tracing::info!(
						order_id = %truncate_id(&order.id),
						from = %fresh.status,
						to = %target,
						"Order advanced"
					);
					self.event_bus
						.publish(FulfillmentEvent::Order(OrderEvent::StatusChanged {
							order_id: order.id.clone(),
							from: fresh.status,
							to: target,
							actor: Actor::Automation,
						}))
						.ok();
				},
				Err(EngineError::Invariant(reason)) => {
					tracing::debug!(
						order_id = %truncate_id(&order.id),
						reason = %reason,
						"Order skipped"
					);
					self.event_bus
						.publish(FulfillmentEvent::Order(OrderEvent::Skipped {
							order_id: order.id.clone(),
							reason,
						}))
						.ok();
				},
				Err(e) => return Err(e),
			}
		}

		if advanced > 0 {
			tracing::info!(advanced, "Advancer sweep applied transitions");
		}
		Ok(advanced)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use fulfillment_types::{
		DomesticCarrier, DomesticTracking, InternationalCarrier, InternationalTracking,
		ManualOverride, OrderItem, PaymentRecord, Pricing, SupplierOrder,
	};
	use rust_decimal_macros::dec;

	fn item() -> OrderItem {
		OrderItem {
			id: "i-1".to_string(),
			product_ref: "sku-1".to_string(),
			quantity: 1,
			unit_price: dec!(100),
			line_total: dec!(100),
			supplier_order: None,
			israel: None,
			customer: None,
		}
	}

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
			items: vec![item()],
			payment: PaymentRecord::new(),
			admin_notes: Vec::new(),
			timeline: Vec::new(),
		}
	}

	#[test]
	fn pending_needs_a_verified_hold() {
		let mut order = order_in(OrderStatus::Pending);
		assert_eq!(StageAdvancer::eligible_target(&order), None);

		order.payment.status = PaymentStatus::Hold;
		assert_eq!(
			StageAdvancer::eligible_target(&order),
			Some(OrderStatus::PaymentHold)
		);

		order.payment.status = PaymentStatus::ReadyToCharge;
		assert_eq!(
			StageAdvancer::eligible_target(&order),
			Some(OrderStatus::PaymentHold)
		);

		order.payment.status = PaymentStatus::Failed;
		assert_eq!(StageAdvancer::eligible_target(&order), None);
	}

	#[test]
	fn ordered_needs_every_item_purchased() {
		let mut order = order_in(OrderStatus::PaymentHold);
		order.items.push(OrderItem {
			id: "i-2".to_string(),
			..item()
		});
		assert_eq!(StageAdvancer::eligible_target(&order), None);

		let supplier = SupplierOrder {
			supplier_order_number: "amz-1".to_string(),
			supplier_tracking_number: None,
			actual_cost: None,
			notes: None,
			ordered_at: Utc::now(),
		};
		order.items[0].supplier_order = Some(supplier.clone());
		assert_eq!(StageAdvancer::eligible_target(&order), None);

		order.items[1].supplier_order = Some(supplier);
		assert_eq!(
			StageAdvancer::eligible_target(&order),
			Some(OrderStatus::Ordered)
		);
	}

	#[test]
	fn shipping_stages_need_their_leg() {
		let mut order = order_in(OrderStatus::ArrivedUsWarehouse);
		assert_eq!(StageAdvancer::eligible_target(&order), None);

		order.items[0].israel = Some(InternationalTracking {
			carrier: InternationalCarrier::Dhl,
			tracking_number: "DHL1".to_string(),
			estimated_date: None,
			recorded_at: Utc::now(),
		});
		assert_eq!(
			StageAdvancer::eligible_target(&order),
			Some(OrderStatus::ShippedToIsrael)
		);

		let mut order = order_in(OrderStatus::ArrivedIsraelWarehouse);
		assert_eq!(StageAdvancer::eligible_target(&order), None);
		order.items[0].customer = Some(DomesticTracking {
			carrier: DomesticCarrier::IsraelPost,
			tracking_number: "RR1".to_string(),
			estimated_date: None,
			recorded_at: Utc::now(),
		});
		assert_eq!(
			StageAdvancer::eligible_target(&order),
			Some(OrderStatus::ShippedToCustomer)
		);
	}

	#[test]
	fn operator_entered_stages_never_auto_advance() {
		// Ordered -> ArrivedUsWarehouse is a warehouse confirmation.
		let order = order_in(OrderStatus::Ordered);
		assert_eq!(StageAdvancer::eligible_target(&order), None);
		// ShippedToIsrael -> CustomsIsrael is a customs fact.
		let order = order_in(OrderStatus::ShippedToIsrael);
		assert_eq!(StageAdvancer::eligible_target(&order), None);
		// ShippedToCustomer -> Delivered is a delivery confirmation.
		let order = order_in(OrderStatus::ShippedToCustomer);
		assert_eq!(StageAdvancer::eligible_target(&order), None);
	}

	#[test]
	fn locked_and_terminal_orders_are_invisible() {
		let mut order = order_in(OrderStatus::Pending);
		order.payment.status = PaymentStatus::Hold;
		order.manual_override = Some(ManualOverride {
			active: true,
			reason: "hold for review".to_string(),
			locked_status: OrderStatus::Pending,
			set_at: Utc::now(),
			set_by: "dana".to_string(),
		});
		assert_eq!(StageAdvancer::eligible_target(&order), None);

		// Cleared lock restores eligibility.
		if let Some(lock) = order.manual_override.as_mut() {
			lock.active = false;
		}
		assert_eq!(
			StageAdvancer::eligible_target(&order),
			Some(OrderStatus::PaymentHold)
		);

		assert_eq!(
			StageAdvancer::eligible_target(&order_in(OrderStatus::Delivered)),
			None
		);
		assert_eq!(
			StageAdvancer::eligible_target(&order_in(OrderStatus::Cancelled)),
			None
		);
	}
}
