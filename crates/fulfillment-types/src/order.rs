//! Order types for the fulfillment engine.
//!
//! This module defines the durable order record and everything attached to
//! it: line items, pricing, the status pipeline, the manual-override lock,
//! admin notes, and the append-only status timeline that serves as the
//! authoritative history for the order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::payment::PaymentRecord;
use crate::tracking::{DomesticTracking, InternationalTracking};

/// Status of an order in the fulfillment pipeline.
///
/// Variants are declared in fixed pipeline order; `pipeline_position`
/// relies on that ordering. `Cancelled` is fully terminal; `Delivered`
/// is terminal for the pipeline but not for payment operations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
	/// Order has been placed at checkout but not yet authorized.
	Pending,
	/// An authorization hold has been placed on the customer's instrument.
	PaymentHold,
	/// All items have been purchased from the upstream supplier.
	Ordered,
	/// Items have arrived at the US consolidation warehouse.
	ArrivedUsWarehouse,
	/// International shipment to Israel is underway.
	ShippedToIsrael,
	/// Shipment is in Israeli customs clearance.
	CustomsIsrael,
	/// Items have arrived at the Israel warehouse.
	ArrivedIsraelWarehouse,
	/// Domestic last-mile delivery to the customer is underway.
	ShippedToCustomer,
	/// Order has been delivered to the customer.
	Delivered,
	/// Order has been cancelled. Terminal for all operations except refunds.
	Cancelled,
}

impl OrderStatus {
	/// All statuses in pipeline order, `Cancelled` last.
	pub const ALL: [OrderStatus; 10] = [
		OrderStatus::Pending,
		OrderStatus::PaymentHold,
		OrderStatus::Ordered,
		OrderStatus::ArrivedUsWarehouse,
		OrderStatus::ShippedToIsrael,
		OrderStatus::CustomsIsrael,
		OrderStatus::ArrivedIsraelWarehouse,
		OrderStatus::ShippedToCustomer,
		OrderStatus::Delivered,
		OrderStatus::Cancelled,
	];

	/// Number of non-terminal pipeline stages (Pending through ShippedToCustomer).
	pub const NON_TERMINAL_STAGES: usize = 8;

	/// Returns the zero-based position of this status in the pipeline.
	///
	/// `Cancelled` sits outside the pipeline and reports `None`.
	pub fn pipeline_position(&self) -> Option<usize> {
		match self {
			OrderStatus::Pending => Some(0),
			OrderStatus::PaymentHold => Some(1),
			OrderStatus::Ordered => Some(2),
			OrderStatus::ArrivedUsWarehouse => Some(3),
			OrderStatus::ShippedToIsrael => Some(4),
			OrderStatus::CustomsIsrael => Some(5),
			OrderStatus::ArrivedIsraelWarehouse => Some(6),
			OrderStatus::ShippedToCustomer => Some(7),
			OrderStatus::Delivered => Some(8),
			OrderStatus::Cancelled => None,
		}
	}

	/// Returns the next status along the fulfillment pipeline, if any.
	pub fn next_in_pipeline(&self) -> Option<OrderStatus> {
		let position = self.pipeline_position()?;
		OrderStatus::ALL.get(position + 1).copied().filter(|s| *s != OrderStatus::Cancelled)
	}

	/// Whether this status accepts no further pipeline transitions.
	pub fn is_terminal(&self) -> bool {
		matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
	}

	/// Whether the order is in one of the shipping-leg statuses.
	pub fn is_in_transit(&self) -> bool {
		matches!(
			self,
			OrderStatus::ShippedToIsrael
				| OrderStatus::CustomsIsrael
				| OrderStatus::ArrivedIsraelWarehouse
				| OrderStatus::ShippedToCustomer
		)
	}

	/// Returns the snake_case name used in storage and on the wire.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "pending",
			OrderStatus::PaymentHold => "payment_hold",
			OrderStatus::Ordered => "ordered",
			OrderStatus::ArrivedUsWarehouse => "arrived_us_warehouse",
			OrderStatus::ShippedToIsrael => "shipped_to_israel",
			OrderStatus::CustomsIsrael => "customs_israel",
			OrderStatus::ArrivedIsraelWarehouse => "arrived_israel_warehouse",
			OrderStatus::ShippedToCustomer => "shipped_to_customer",
			OrderStatus::Delivered => "delivered",
			OrderStatus::Cancelled => "cancelled",
		}
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

impl std::str::FromStr for OrderStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		OrderStatus::ALL
			.iter()
			.find(|status| status.as_str() == s)
			.copied()
			.ok_or_else(|| format!("unknown order status '{}'", s))
	}
}

/// Identity of whoever performs a mutation on an order.
///
/// Every timeline and ledger entry records the acting party so the audit
/// trail distinguishes automation sweeps from operator actions and gateway
/// notifications.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
	/// The automated status-advancement process.
	Automation,
	/// A human administrator, identified by name or operator id.
	Admin(String),
	/// The external payment gateway (webhook/poll driven).
	Gateway,
}

impl Actor {
	/// Whether this actor is the automated advancer.
	pub fn is_automation(&self) -> bool {
		matches!(self, Actor::Automation)
	}
}

impl fmt::Display for Actor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Actor::Automation => write!(f, "automation"),
			Actor::Admin(name) => write!(f, "admin:{}", name),
			Actor::Gateway => write!(f, "gateway"),
		}
	}
}

/// Kind of an entry in the order timeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimelineKind {
	/// A forward pipeline transition or cancellation.
	Transition,
	/// An explicit administrative backward correction.
	Correction,
	/// The manual-override lock was set (status pinned).
	Lock,
	/// The manual-override lock was cleared.
	Unlock,
	/// An admin note was recorded (from == to).
	Note,
}

/// One entry in an order's append-only timeline.
///
/// The timeline, not the bare `status` field, is the authoritative history
/// used for stuck-order age calculations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
	pub from: OrderStatus,
	pub to: OrderStatus,
	pub actor: Actor,
	pub at: DateTime<Utc>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
	pub kind: TimelineKind,
}

/// Manual-override lock state for an order.
///
/// While active, the order is invisible to the automated status advancer;
/// only an explicit administrative status change or an unlock mutates the
/// order's status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualOverride {
	pub active: bool,
	pub reason: String,
	pub locked_status: OrderStatus,
	pub set_at: DateTime<Utc>,
	pub set_by: String,
}

/// Immutable pricing breakdown captured at checkout.
///
/// `total` is the single canonical monetary field for the order. Pricing
/// must not change once a charge has occurred except via an explicit
/// administrative correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pricing {
	pub subtotal: Decimal,
	pub shipping: Decimal,
	pub discount: Decimal,
	pub total: Decimal,
}

/// Procurement facts recorded once an item is purchased upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierOrder {
	pub supplier_order_number: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub supplier_tracking_number: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub actual_cost: Option<Decimal>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
	pub ordered_at: DateTime<Utc>,
}

/// A single line item on an order.
///
/// Tracking is recorded per leg: `israel` is the international segment to
/// the Israel warehouse, `customer` is the domestic last mile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
	/// Unique identifier for this item.
	pub id: String,
	/// Reference into the (external) product catalog.
	pub product_ref: String,
	pub quantity: u32,
	pub unit_price: Decimal,
	pub line_total: Decimal,
	/// Set once the item is purchased from the upstream supplier.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub supplier_order: Option<SupplierOrder>,
	/// International tracking leg (to the Israel warehouse).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub israel: Option<InternationalTracking>,
	/// Domestic tracking leg (to the end customer).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub customer: Option<DomesticTracking>,
}

/// An operator note on an order. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminNote {
	pub note: String,
	pub author: String,
	pub created_at: DateTime<Utc>,
}

/// Durable record of a customer order.
///
/// Orders are never deleted; cancellation is a status. `id` is the
/// canonical lookup key everywhere in the engine, `order_number` is the
/// human-facing label used only for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
	/// Unique identifier and canonical lookup key for this order.
	pub id: String,
	/// Human-facing order number. Display only, never used for lookups.
	pub order_number: String,
	/// Reference to the customer who placed the order.
	pub customer_ref: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	/// Current status of the order.
	pub status: OrderStatus,
	pub pricing: Pricing,
	/// Manual-override lock, if one has ever been set.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub manual_override: Option<ManualOverride>,
	/// Line items in insertion order (purchase order).
	pub items: Vec<OrderItem>,
	/// Payment settlement record (one per order).
	pub payment: PaymentRecord,
	/// Append-only operator notes.
	#[serde(default)]
	pub admin_notes: Vec<AdminNote>,
	/// Append-only status timeline. Authoritative history.
	#[serde(default)]
	pub timeline: Vec<TimelineEntry>,
}

impl Order {
	/// Whether the manual-override lock is currently active.
	pub fn is_locked(&self) -> bool {
		self.manual_override.as_ref().is_some_and(|o| o.active)
	}

	/// Timestamp of the most recent timeline entry, falling back to creation.
	pub fn last_activity_at(&self) -> DateTime<Utc> {
		self.timeline
			.last()
			.map(|entry| entry.at)
			.unwrap_or(self.created_at)
	}

	/// Finds a line item by id.
	pub fn item(&self, item_id: &str) -> Option<&OrderItem> {
		self.items.iter().find(|item| item.id == item_id)
	}

	/// Whether every item has been purchased from the upstream supplier.
	pub fn all_items_purchased(&self) -> bool {
		!self.items.is_empty() && self.items.iter().all(|item| item.supplier_order.is_some())
	}

	/// Whether every item carries the international tracking leg.
	pub fn all_items_have_israel_leg(&self) -> bool {
		!self.items.is_empty() && self.items.iter().all(|item| item.israel.is_some())
	}

	/// Whether every item carries the domestic tracking leg.
	pub fn all_items_have_customer_leg(&self) -> bool {
		!self.items.is_empty() && self.items.iter().all(|item| item.customer.is_some())
	}

	/// Whether any item carries any tracking leg at all.
	pub fn has_any_tracking(&self) -> bool {
		self.items
			.iter()
			.any(|item| item.israel.is_some() || item.customer.is_some())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pipeline_positions_are_sequential() {
		for (expected, status) in OrderStatus::ALL[..9].iter().enumerate() {
			assert_eq!(status.pipeline_position(), Some(expected));
		}
		assert_eq!(OrderStatus::Cancelled.pipeline_position(), None);
	}

	#[test]
	fn next_in_pipeline_stops_at_delivered() {
		assert_eq!(
			OrderStatus::Pending.next_in_pipeline(),
			Some(OrderStatus::PaymentHold)
		);
		assert_eq!(
			OrderStatus::ShippedToCustomer.next_in_pipeline(),
			Some(OrderStatus::Delivered)
		);
		assert_eq!(OrderStatus::Delivered.next_in_pipeline(), None);
		assert_eq!(OrderStatus::Cancelled.next_in_pipeline(), None);
	}

	#[test]
	fn terminal_statuses() {
		assert!(OrderStatus::Delivered.is_terminal());
		assert!(OrderStatus::Cancelled.is_terminal());
		assert!(!OrderStatus::CustomsIsrael.is_terminal());
	}

	#[test]
	fn status_round_trips_through_str() {
		for status in OrderStatus::ALL {
			let parsed: OrderStatus = status.as_str().parse().unwrap();
			assert_eq!(parsed, status);
		}
		assert!("not_a_status".parse::<OrderStatus>().is_err());
	}

	#[test]
	fn status_serde_uses_snake_case() {
		let json = serde_json::to_string(&OrderStatus::ArrivedUsWarehouse).unwrap();
		assert_eq!(json, "\"arrived_us_warehouse\"");
	}
}
