//! Order lifecycle handler.
//!
//! Covers order creation, manual and automated status changes, backward
//! corrections, the manual-override lock, cancellation, and admin notes.
//! Every mutation runs inside the order's critical section so the
//! override-lock check and the transition apply can never race.

use crate::engine::event_bus::EventBus;
use crate::locks::OrderLocks;
use crate::state::OrderStateMachine;
use crate::EngineError;
use chrono::Utc;
use fulfillment_config::EngineConfig;
use fulfillment_types::{
	truncate_id, Actor, AdminNote, FulfillmentEvent, ManualOverride, NewOrderRequest, Order,
	OrderEvent, OrderItem, OrderStatus, PaymentRecord, Pricing, TimelineEntry, TimelineKind,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Handler for order lifecycle commands.
pub struct OrderHandler {
	state_machine: Arc<OrderStateMachine>,
	locks: Arc<OrderLocks>,
	event_bus: EventBus,
	policy: EngineConfig,
}

impl OrderHandler {
	pub fn new(
		state_machine: Arc<OrderStateMachine>,
		locks: Arc<OrderLocks>,
		event_bus: EventBus,
		policy: EngineConfig,
	) -> Self {
		Self {
			state_machine,
			locks,
			event_bus,
			policy,
		}
	}

	fn validate_reason(&self, reason: &str) -> Result<(), EngineError> {
		if reason.trim().len() < self.policy.min_reason_length {
			return Err(EngineError::Validation(format!(
				"reason must be at least {} characters",
				self.policy.min_reason_length
			)));
		}
		Ok(())
	}

	/// Creates a new order at checkout. Status Pending, payment Pending.
	pub async fn create_order(&self, request: NewOrderRequest) -> Result<Order, EngineError> {
		if request.order_number.trim().is_empty() {
			return Err(EngineError::Validation(
				"order number is required".to_string(),
			));
		}
		if request.customer_ref.trim().is_empty() {
			return Err(EngineError::Validation(
				"customer reference is required".to_string(),
			));
		}
		if request.items.is_empty() {
			return Err(EngineError::Validation(
				"an order needs at least one item".to_string(),
			));
		}
		for item in &request.items {
			if item.quantity == 0 {
				return Err(EngineError::Validation(
					"item quantity must be positive".to_string(),
				));
			}
			if item.unit_price.is_sign_negative() {
				return Err(EngineError::Validation(
					"item unit price cannot be negative".to_string(),
				));
			}
		}

		let now = Utc::now();
		let items = request
			.items
			.into_iter()
			.map(|item| OrderItem {
				id: Uuid::new_v4().to_string(),
				product_ref: item.product_ref,
				quantity: item.quantity,
				unit_price: item.unit_price,
				line_total: item.unit_price * rust_decimal::Decimal::from(item.quantity),
				supplier_order: None,
				israel: None,
				customer: None,
			})
			.collect();

		let order = Order {
			id: Uuid::new_v4().to_string(),
			order_number: request.order_number,
			customer_ref: request.customer_ref,
			created_at: now,
			updated_at: now,
			status: OrderStatus::Pending,
			pricing: Pricing {
				subtotal: request.subtotal,
				shipping: request.shipping,
				discount: request.discount,
				total: request.subtotal + request.shipping - request.discount,
			},
			manual_override: None,
			items,
			payment: PaymentRecord::new(),
			admin_notes: Vec::new(),
			timeline: Vec::new(),
		};

		self.state_machine.store_order(&order).await?;
		tracing::info!(order_id = %truncate_id(&order.id), "Order created");
		self.event_bus
			.publish(FulfillmentEvent::Order(OrderEvent::Created {
				order_id: order.id.clone(),
			}))
			.ok();
		Ok(order)
	}

	/// Fetches a single order with its full ledger and timeline.
	pub async fn get_order(&self, order_id: &str) -> Result<Order, EngineError> {
		self.state_machine.get_order(order_id).await
	}

	/// Lists orders, optionally filtered by status. Read-side.
	pub async fn list_orders(
		&self,
		status: Option<OrderStatus>,
	) -> Result<Vec<Order>, EngineError> {
		let mut orders = self.state_machine.list_orders().await?;
		if let Some(status) = status {
			orders.retain(|order| order.status == status);
		}
		orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
		Ok(orders)
	}

	/// Applies a status change, optionally pinning it with the override
	/// lock in the same critical section.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id), target = %target))]
	pub async fn set_status(
		&self,
		order_id: &str,
		target: OrderStatus,
		actor: Actor,
		reason: Option<String>,
		lock: bool,
	) -> Result<Order, EngineError> {
		if target == OrderStatus::Cancelled {
			let reason = reason
				.as_deref()
				.ok_or_else(|| EngineError::Validation("cancellation requires a reason".to_string()))?;
			self.validate_reason(reason)?;
		} else if let Some(reason) = &reason {
			self.validate_reason(reason)?;
		}
		if lock && !matches!(actor, Actor::Admin(_)) {
			return Err(EngineError::Validation(
				"only an administrator can pin a status".to_string(),
			));
		}

		let mutex = self.locks.for_order(order_id);
		let _guard = mutex.lock().await;

		let order = self.state_machine.get_order(order_id).await?;
		OrderStateMachine::validate_transition(&order, target, &actor)?;

		let from = order.status;
		let actor_for_update = actor.clone();
		let reason_for_update = reason.clone();
		let updated = self
			.state_machine
			.update_order_with(order_id, move |o| {
				o.status = target;
				o.timeline.push(TimelineEntry {
					from,
					to: target,
					actor: actor_for_update.clone(),
					at: Utc::now(),
					reason: reason_for_update.clone(),
					kind: TimelineKind::Transition,
				});
				if lock {
					if let Actor::Admin(name) = &actor_for_update {
						o.manual_override = Some(ManualOverride {
							active: true,
							reason: reason_for_update
								.clone()
								.unwrap_or_else(|| "status pinned".to_string()),
							locked_status: target,
							set_at: Utc::now(),
							set_by: name.clone(),
						});
					}
				}
			})
			.await?;

		tracing::info!(from = %from, to = %target, actor = %actor, "Status changed");
		self.event_bus
			.publish(FulfillmentEvent::Order(OrderEvent::StatusChanged {
				order_id: order_id.to_string(),
				from,
				to: target,
				actor,
			}))
			.ok();
		if target == OrderStatus::Cancelled {
			self.event_bus
				.publish(FulfillmentEvent::Order(OrderEvent::Cancelled {
					order_id: order_id.to_string(),
					reason: reason.unwrap_or_default(),
				}))
				.ok();
		}
		if lock {
			self.event_bus
				.publish(FulfillmentEvent::Order(OrderEvent::Locked {
					order_id: order_id.to_string(),
					locked_status: target,
				}))
				.ok();
		}
		Ok(updated)
	}

	/// Cancels an order. Terminal; refunds stay permitted afterwards.
	pub async fn cancel(
		&self,
		order_id: &str,
		reason: String,
		actor: Actor,
	) -> Result<Order, EngineError> {
		self.set_status(order_id, OrderStatus::Cancelled, actor, Some(reason), false)
			.await
	}

	/// Applies an explicit backward correction, logged as such.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id), target = %target))]
	pub async fn correct_status(
		&self,
		order_id: &str,
		target: OrderStatus,
		admin: &str,
		reason: String,
	) -> Result<Order, EngineError> {
		self.validate_reason(&reason)?;

		let mutex = self.locks.for_order(order_id);
		let _guard = mutex.lock().await;

		let updated = self
			.state_machine
			.correct(order_id, target, admin, reason)
			.await?;

		tracing::info!(to = %target, admin = %admin, "Status corrected");
		self.event_bus
			.publish(FulfillmentEvent::Order(OrderEvent::StatusChanged {
				order_id: order_id.to_string(),
				from: updated
					.timeline
					.last()
					.map(|entry| entry.from)
					.unwrap_or(target),
				to: target,
				actor: Actor::Admin(admin.to_string()),
			}))
			.ok();
		Ok(updated)
	}

	/// Sets the manual-override lock, pinning the order's status.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn lock_override(
		&self,
		order_id: &str,
		locked_status: OrderStatus,
		reason: String,
		admin: &str,
	) -> Result<Order, EngineError> {
		self.validate_reason(&reason)?;
		if locked_status == OrderStatus::Cancelled {
			return Err(EngineError::Validation(
				"cannot pin an order to cancelled; use cancel".to_string(),
			));
		}

		let mutex = self.locks.for_order(order_id);
		let _guard = mutex.lock().await;

		let order = self.state_machine.get_order(order_id).await?;
		if order.status == OrderStatus::Cancelled {
			return Err(EngineError::Invariant(format!(
				"order '{}' is cancelled and cannot be locked",
				order_id
			)));
		}

		let from = order.status;
		let reason_for_update = reason.clone();
		let admin_name = admin.to_string();
		let updated = self
			.state_machine
			.update_order_with(order_id, move |o| {
				o.status = locked_status;
				o.manual_override = Some(ManualOverride {
					active: true,
					reason: reason_for_update.clone(),
					locked_status,
					set_at: Utc::now(),
					set_by: admin_name.clone(),
				});
				o.timeline.push(TimelineEntry {
					from,
					to: locked_status,
					actor: Actor::Admin(admin_name.clone()),
					at: Utc::now(),
					reason: Some(reason_for_update.clone()),
					kind: TimelineKind::Lock,
				});
			})
			.await?;

		tracing::info!(locked_status = %locked_status, admin = %admin, "Override lock set");
		self.event_bus
			.publish(FulfillmentEvent::Order(OrderEvent::Locked {
				order_id: order_id.to_string(),
				locked_status,
			}))
			.ok();
		Ok(updated)
	}

	/// Clears the manual-override lock without changing status.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn unlock_override(&self, order_id: &str, admin: &str) -> Result<Order, EngineError> {
		let mutex = self.locks.for_order(order_id);
		let _guard = mutex.lock().await;

		let order = self.state_machine.get_order(order_id).await?;
		if !order.is_locked() {
			return Err(EngineError::Invariant(format!(
				"order '{}' is not locked",
				order_id
			)));
		}

		let status = order.status;
		let admin_name = admin.to_string();
		let updated = self
			.state_machine
			.update_order_with(order_id, move |o| {
				if let Some(lock) = o.manual_override.as_mut() {
					lock.active = false;
				}
				o.timeline.push(TimelineEntry {
					from: status,
					to: status,
					actor: Actor::Admin(admin_name.clone()),
					at: Utc::now(),
					reason: None,
					kind: TimelineKind::Unlock,
				});
			})
			.await?;

		tracing::info!(admin = %admin, "Override lock cleared");
		self.event_bus
			.publish(FulfillmentEvent::Order(OrderEvent::Unlocked {
				order_id: order_id.to_string(),
			}))
			.ok();
		Ok(updated)
	}

	/// Appends an admin note. Notes count as order activity, so they also
	/// append a timeline entry and reset the stuck-order clock.
	pub async fn add_note(
		&self,
		order_id: &str,
		note: String,
		author: String,
	) -> Result<Order, EngineError> {
		if note.trim().is_empty() {
			return Err(EngineError::Validation("note cannot be empty".to_string()));
		}
		if author.trim().is_empty() {
			return Err(EngineError::Validation(
				"note author is required".to_string(),
			));
		}

		let mutex = self.locks.for_order(order_id);
		let _guard = mutex.lock().await;

		let order = self.state_machine.get_order(order_id).await?;
		let status = order.status;
		self.state_machine
			.update_order_with(order_id, move |o| {
				o.admin_notes.push(AdminNote {
					note: note.clone(),
					author: author.clone(),
					created_at: Utc::now(),
				});
				o.timeline.push(TimelineEntry {
					from: status,
					to: status,
					actor: Actor::Admin(author.clone()),
					at: Utc::now(),
					reason: Some(note.clone()),
					kind: TimelineKind::Note,
				});
			})
			.await
	}
}
