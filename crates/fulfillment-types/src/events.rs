//! Event types for inter-service communication.
//!
//! This module defines the event system used by the fulfillment engine for
//! asynchronous communication between components. Events flow through an
//! event bus allowing read-side consumers (dashboards, audit sinks) to
//! react to state changes without coupling to the mutating paths.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::order::{Actor, OrderStatus};
use crate::payment::{LedgerEntryKind, LedgerOutcome};
use crate::tracking::Leg;

/// Main event type encompassing all engine events.
///
/// Events are categorized by the subsystem that produces them, allowing
/// consumers to filter and handle specific event types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FulfillmentEvent {
	/// Events from the order state machine.
	Order(OrderEvent),
	/// Events from the payment settlement ledger.
	Payment(PaymentEvent),
	/// Events from the tracking subsystem.
	Tracking(TrackingEvent),
}

/// Events related to order lifecycle changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderEvent {
	/// A new order was created at checkout.
	Created { order_id: String },
	/// A status transition was accepted and applied.
	StatusChanged {
		order_id: String,
		from: OrderStatus,
		to: OrderStatus,
		actor: Actor,
	},
	/// The automated advancer skipped an order.
	Skipped { order_id: String, reason: String },
	/// The manual-override lock was set.
	Locked {
		order_id: String,
		locked_status: OrderStatus,
	},
	/// The manual-override lock was cleared.
	Unlocked { order_id: String },
	/// The order was cancelled.
	Cancelled { order_id: String, reason: String },
}

/// Events related to payment settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PaymentEvent {
	/// A ledger entry was appended (hold, charge, refund, or failure).
	LedgerAppended {
		order_id: String,
		entry_id: String,
		kind: LedgerEntryKind,
		amount: Decimal,
		outcome: LedgerOutcome,
	},
	/// An indeterminate entry was resolved by the reconciliation sweep.
	Reconciled {
		order_id: String,
		entry_id: String,
		outcome: LedgerOutcome,
	},
	/// A gateway notification was applied to the payment record.
	NotificationApplied {
		order_id: String,
		event_id: String,
		at: DateTime<Utc>,
	},
}

/// Events related to tracking updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrackingEvent {
	/// A tracking leg was recorded on an item.
	LegSet {
		order_id: String,
		item_id: String,
		leg: Leg,
	},
	/// Supplier procurement facts were recorded on an item.
	SupplierOrderSet { order_id: String, item_id: String },
}
