//! API types for HTTP endpoints and request/response structures.
//!
//! These are the wire shapes consumed by the operator UI layer. Field
//! names follow the camelCase convention of the existing admin screens.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::order::{Actor, OrderStatus};
use crate::payment::{CardDetails, ChargeFunding, LedgerEntry, PaymentStatus};
use crate::tracking::{DomesticCarrier, InternationalCarrier, Leg};

/// Request body for creating an order at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRequest {
	#[serde(rename = "orderNumber")]
	pub order_number: String,
	#[serde(rename = "customerRef")]
	pub customer_ref: String,
	pub subtotal: Decimal,
	pub shipping: Decimal,
	#[serde(default)]
	pub discount: Decimal,
	pub items: Vec<NewOrderItem>,
}

/// One line item in an order-creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderItem {
	#[serde(rename = "productRef")]
	pub product_ref: String,
	pub quantity: u32,
	#[serde(rename = "unitPrice")]
	pub unit_price: Decimal,
}

/// Request body for placing an authorization hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizeRequest {
	pub amount: Decimal,
	pub card: CardDetails,
}

/// Request body for a manual charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRequest {
	pub amount: Decimal,
	pub mode: ChargeFunding,
	/// Required when `mode` is `new_card`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub card: Option<CardDetails>,
	pub reason: String,
	pub actor: String,
	#[serde(rename = "clientRequestId")]
	pub client_request_id: String,
}

/// Request body for a refund.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
	pub amount: Decimal,
	pub reason: String,
	/// Card details supplied for gateway-side verification.
	#[serde(rename = "cardVerification", skip_serializing_if = "Option::is_none")]
	pub card_verification: Option<CardDetails>,
	pub actor: String,
	#[serde(rename = "clientRequestId")]
	pub client_request_id: String,
}

/// Request body for an administrative status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetStatusRequest {
	pub status: OrderStatus,
	pub actor: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
	/// When set, the manual-override lock is applied atomically with the
	/// status change, pinning the order against automatic drift.
	#[serde(default)]
	pub lock: bool,
}

/// Request body for an explicit backward correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectStatusRequest {
	pub status: OrderStatus,
	pub actor: String,
	pub reason: String,
}

/// Request body for setting the manual-override lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRequest {
	#[serde(rename = "lockedStatus")]
	pub locked_status: OrderStatus,
	pub reason: String,
	pub actor: String,
}

/// Request body for clearing the manual-override lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlockRequest {
	pub actor: String,
}

/// Request body for recording a tracking leg on an item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingRequest {
	pub leg: Leg,
	/// Carrier name from the per-leg vocabulary, or "other".
	pub carrier: String,
	/// Required when `carrier` is "other".
	#[serde(rename = "customCarrierName", skip_serializing_if = "Option::is_none")]
	pub custom_carrier_name: Option<String>,
	#[serde(rename = "trackingNumber")]
	pub tracking_number: String,
	#[serde(rename = "estimatedDate", skip_serializing_if = "Option::is_none")]
	pub estimated_date: Option<DateTime<Utc>>,
}

impl TrackingRequest {
	/// Resolves the carrier field against the international vocabulary.
	pub fn international_carrier(&self) -> Result<InternationalCarrier, String> {
		let carrier = match self.carrier.as_str() {
			"dhl" => InternationalCarrier::Dhl,
			"fedex" => InternationalCarrier::Fedex,
			"ups" => InternationalCarrier::Ups,
			"ecms" => InternationalCarrier::Ecms,
			"other" => InternationalCarrier::Other(
				self.custom_carrier_name.clone().unwrap_or_default(),
			),
			other => return Err(format!("unknown international carrier '{}'", other)),
		};
		carrier.validate()?;
		Ok(carrier)
	}

	/// Resolves the carrier field against the domestic vocabulary.
	pub fn domestic_carrier(&self) -> Result<DomesticCarrier, String> {
		let carrier = match self.carrier.as_str() {
			"israel_post" => DomesticCarrier::IsraelPost,
			"hfd" => DomesticCarrier::Hfd,
			"cheetah" => DomesticCarrier::Cheetah,
			"ups" => DomesticCarrier::Ups,
			"fedex" => DomesticCarrier::Fedex,
			"dhl" => DomesticCarrier::Dhl,
			"other" => DomesticCarrier::Other(
				self.custom_carrier_name.clone().unwrap_or_default(),
			),
			other => return Err(format!("unknown domestic carrier '{}'", other)),
		};
		carrier.validate()?;
		Ok(carrier)
	}
}

/// Request body for recording supplier procurement facts on an item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierOrderRequest {
	#[serde(rename = "supplierOrderNumber")]
	pub supplier_order_number: String,
	#[serde(rename = "supplierTrackingNumber", skip_serializing_if = "Option::is_none")]
	pub supplier_tracking_number: Option<String>,
	#[serde(rename = "actualCost", skip_serializing_if = "Option::is_none")]
	pub actual_cost: Option<Decimal>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
}

/// Request body for appending an admin note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteRequest {
	pub note: String,
	pub author: String,
}

/// Request body for cancelling an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRequest {
	pub reason: String,
	pub actor: String,
}

/// Structured detail returned from settlement operations so the caller
/// can update its view without a full refetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementResponse {
	pub entry: LedgerEntry,
	#[serde(rename = "paymentStatus")]
	pub payment_status: PaymentStatus,
	#[serde(rename = "chargedAmount")]
	pub charged_amount: Decimal,
	#[serde(rename = "refundedAmount")]
	pub refunded_amount: Decimal,
	#[serde(rename = "maxRefundable")]
	pub max_refundable: Decimal,
}

/// Structured detail returned from status-changing operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
	#[serde(rename = "orderId")]
	pub order_id: String,
	pub status: OrderStatus,
	pub locked: bool,
	#[serde(rename = "timelineLength")]
	pub timeline_length: usize,
}

/// An asynchronous status-change notification from the payment gateway.
///
/// Delivery is at-least-once; `event_id` is the dedupe key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayNotification {
	#[serde(rename = "eventId")]
	pub event_id: String,
	#[serde(rename = "gatewayReference")]
	pub gateway_reference: String,
	pub kind: GatewayNotificationKind,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
}

/// Kinds of gateway notifications the engine consumes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GatewayNotificationKind {
	/// The authorization hold has been verified; funds may be captured.
	HoldVerified,
	/// The authorization hold was declined or voided.
	HoldDeclined,
	/// A capture settled on the gateway side.
	ChargeConfirmed,
	/// A refund settled on the gateway side.
	RefundConfirmed,
}

/// Conversion helper: the `actor` string on operator requests becomes an
/// [`Actor::Admin`] for the audit trail.
pub fn admin_actor(name: &str) -> Actor {
	Actor::Admin(name.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn other_carrier_without_name_is_rejected() {
		let request = TrackingRequest {
			leg: Leg::Israel,
			carrier: "other".to_string(),
			custom_carrier_name: None,
			tracking_number: "X1".to_string(),
			estimated_date: None,
		};
		assert!(request.international_carrier().is_err());

		let named = TrackingRequest {
			custom_carrier_name: Some("PostNL".to_string()),
			..request
		};
		assert_eq!(
			named.international_carrier().unwrap(),
			InternationalCarrier::Other("PostNL".to_string())
		);
	}

	#[test]
	fn vocabularies_differ_per_leg() {
		let request = TrackingRequest {
			leg: Leg::Customer,
			carrier: "israel_post".to_string(),
			custom_carrier_name: None,
			tracking_number: "RR123".to_string(),
			estimated_date: None,
		};
		assert!(request.domestic_carrier().is_ok());
		// Israel Post is not part of the international vocabulary.
		assert!(request.international_carrier().is_err());
	}
}
