//! Payment settlement types for the fulfillment engine.
//!
//! This module defines the per-order payment record and its append-only
//! settlement ledger. The three cached amount fields (authorization,
//! charged, refunded) are always derived from the ledger; the ledger is
//! the source of truth for reconciliation and audit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::order::Actor;

/// Status of an order's payment record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
	/// No authorization has been attempted yet.
	Pending,
	/// The authorization hold has been verified by the gateway and funds
	/// can be captured by an operator.
	ReadyToCharge,
	/// An authorization hold is in place.
	Hold,
	/// Funds have been captured (possibly across multiple charges).
	Charged,
	/// The last gateway operation was declined.
	Failed,
}

impl fmt::Display for PaymentStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			PaymentStatus::Pending => "pending",
			PaymentStatus::ReadyToCharge => "ready_to_charge",
			PaymentStatus::Hold => "hold",
			PaymentStatus::Charged => "charged",
			PaymentStatus::Failed => "failed",
		};
		write!(f, "{}", s)
	}
}

/// Kind of a settlement ledger entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryKind {
	/// An authorization hold was placed.
	Hold,
	/// Funds were captured.
	Charge,
	/// Funds were returned to the customer.
	Refund,
	/// A gateway operation was attempted and declined.
	Failure,
}

/// Outcome of the gateway call backing a ledger entry.
///
/// Timed-out calls are recorded as `Indeterminate` rather than omitted;
/// the reconciliation sweep later resolves them by querying the gateway
/// for the authoritative result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerOutcome {
	Succeeded,
	Failed,
	Indeterminate,
}

/// How a charge was funded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChargeFunding {
	/// Captured against the existing authorization hold.
	Existing,
	/// Re-authorized against a freshly supplied card.
	NewCard,
}

/// One entry in the append-only settlement ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
	/// Unique identifier for this entry.
	pub id: String,
	pub kind: LedgerEntryKind,
	pub amount: Decimal,
	/// Mandatory on charge entries: how the capture was funded.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub funding: Option<ChargeFunding>,
	pub reason: String,
	pub performed_by: Actor,
	pub at: DateTime<Utc>,
	/// Opaque transaction reference owned by the external gateway.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub gateway_reference: Option<String>,
	pub outcome: LedgerOutcome,
	/// Client-supplied request id used for idempotent retries.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub client_request_id: Option<String>,
}

/// Per-order payment settlement record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
	pub status: PaymentStatus,
	/// Amount held on the customer's instrument at authorization time.
	pub authorization_amount: Decimal,
	/// Cumulative captured amount. Cache; derived from the ledger.
	pub charged_amount: Decimal,
	/// Cumulative refunded amount. Cache; derived from the ledger.
	pub refunded_amount: Decimal,
	/// Opaque token from the external gateway for the live hold/charge.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub gateway_reference: Option<String>,
	/// Append-only audit trail. Source of truth for the amount fields.
	#[serde(default)]
	pub ledger: Vec<LedgerEntry>,
}

impl PaymentRecord {
	/// A fresh record for a newly created order.
	pub fn new() -> Self {
		Self {
			status: PaymentStatus::Pending,
			authorization_amount: Decimal::ZERO,
			charged_amount: Decimal::ZERO,
			refunded_amount: Decimal::ZERO,
			gateway_reference: None,
			ledger: Vec::new(),
		}
	}

	/// Whether an authorization hold already exists for this record.
	pub fn has_authorization(&self) -> bool {
		self.ledger
			.iter()
			.any(|entry| entry.kind == LedgerEntryKind::Hold && entry.outcome == LedgerOutcome::Succeeded)
	}

	/// Whether an authorization attempt is still awaiting reconciliation.
	///
	/// The provider may have placed the hold even though the call never
	/// returned; a second attempt before reconciliation settles the first
	/// risks double-holding the customer's funds.
	pub fn has_pending_hold(&self) -> bool {
		self.ledger
			.iter()
			.any(|entry| entry.kind == LedgerEntryKind::Hold && entry.outcome == LedgerOutcome::Indeterminate)
	}

	/// Recomputes the cached amount fields from the ledger.
	///
	/// Only entries whose gateway outcome succeeded count toward the
	/// cached amounts; failed and indeterminate entries stay in the trail
	/// but move no money until reconciled.
	pub fn recompute_from_ledger(&mut self) {
		let mut authorized = Decimal::ZERO;
		let mut charged = Decimal::ZERO;
		let mut refunded = Decimal::ZERO;
		for entry in &self.ledger {
			if entry.outcome != LedgerOutcome::Succeeded {
				continue;
			}
			match entry.kind {
				LedgerEntryKind::Hold => authorized += entry.amount,
				LedgerEntryKind::Charge => charged += entry.amount,
				LedgerEntryKind::Refund => refunded += entry.amount,
				LedgerEntryKind::Failure => {},
			}
		}
		self.authorization_amount = authorized;
		self.charged_amount = charged;
		self.refunded_amount = refunded;
	}

	/// The hard ceiling for any further refund: charged minus refunded.
	pub fn max_refundable(&self) -> Decimal {
		self.charged_amount - self.refunded_amount
	}
}

impl Default for PaymentRecord {
	fn default() -> Self {
		Self::new()
	}
}

/// Result of a refund eligibility check.
///
/// Mirrors exactly the checks the mutating refund path enforces so the
/// two can never disagree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundEligibility {
	pub eligible: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
	pub max_refundable: Decimal,
	pub charged_amount: Decimal,
	pub refunded_amount: Decimal,
}

/// Card details supplied for new-card charges and refund verification.
///
/// Only shape validation happens in this engine; the card itself is
/// forwarded to the external gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDetails {
	pub number: String,
	pub exp_month: String,
	pub exp_year: String,
	pub cvv: String,
	/// Holder identifier (national id), exactly 9 digits.
	pub holder_id: String,
}

impl CardDetails {
	/// Validates the card's shape before any gateway contact.
	///
	/// Checks: number 13-19 digits, month 01-12, year 2 or 4 digits,
	/// CVV at least 3 digits, holder id exactly 9 digits.
	pub fn validate(&self) -> Result<(), String> {
		if !all_digits(&self.number) || self.number.len() < 13 || self.number.len() > 19 {
			return Err("card number must be 13-19 digits".to_string());
		}
		match self.exp_month.parse::<u8>() {
			Ok(month) if (1..=12).contains(&month) && all_digits(&self.exp_month) => {},
			_ => return Err("expiry month must be between 01 and 12".to_string()),
		}
		if !all_digits(&self.exp_year) || !(self.exp_year.len() == 2 || self.exp_year.len() == 4) {
			return Err("expiry year must be 2 or 4 digits".to_string());
		}
		if !all_digits(&self.cvv) || self.cvv.len() < 3 {
			return Err("cvv must be at least 3 digits".to_string());
		}
		if !all_digits(&self.holder_id) || self.holder_id.len() != 9 {
			return Err("holder id must be exactly 9 digits".to_string());
		}
		Ok(())
	}
}

fn all_digits(s: &str) -> bool {
	!s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}
