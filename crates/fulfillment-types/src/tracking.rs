//! Tracking types for the two shipping legs of an order item.
//!
//! Each item travels two independent legs: the international segment to
//! the Israel warehouse and the domestic last mile to the customer. Each
//! leg has its own closed carrier vocabulary with an explicit `Other`
//! escape hatch carrying a free-text carrier name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two tracking legs on an order item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Leg {
	/// International segment to the Israel warehouse.
	Israel,
	/// Domestic last mile to the end customer.
	Customer,
}

impl fmt::Display for Leg {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Leg::Israel => write!(f, "israel"),
			Leg::Customer => write!(f, "customer"),
		}
	}
}

/// Carriers accepted on the international leg.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InternationalCarrier {
	Dhl,
	Fedex,
	Ups,
	Ecms,
	/// Ad hoc carrier; the name must be non-empty.
	Other(String),
}

impl InternationalCarrier {
	/// Rejects `Other` variants with an empty carrier name.
	pub fn validate(&self) -> Result<(), String> {
		match self {
			InternationalCarrier::Other(name) if name.trim().is_empty() => {
				Err("custom carrier name must not be empty".to_string())
			},
			_ => Ok(()),
		}
	}
}

/// Carriers accepted on the domestic leg.
///
/// The domestic vocabulary is wider than the international one since the
/// last mile is served by local couriers as well.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DomesticCarrier {
	IsraelPost,
	Hfd,
	Cheetah,
	Ups,
	Fedex,
	Dhl,
	/// Ad hoc carrier; the name must be non-empty.
	Other(String),
}

impl DomesticCarrier {
	/// Rejects `Other` variants with an empty carrier name.
	pub fn validate(&self) -> Result<(), String> {
		match self {
			DomesticCarrier::Other(name) if name.trim().is_empty() => {
				Err("custom carrier name must not be empty".to_string())
			},
			_ => Ok(()),
		}
	}
}

/// Tracking record for the international leg of an item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternationalTracking {
	pub carrier: InternationalCarrier,
	/// Stored verbatim; carrier formats vary too much to validate.
	pub tracking_number: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub estimated_date: Option<DateTime<Utc>>,
	pub recorded_at: DateTime<Utc>,
}

/// Tracking record for the domestic leg of an item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomesticTracking {
	pub carrier: DomesticCarrier,
	/// Stored verbatim; carrier formats vary too much to validate.
	pub tracking_number: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub estimated_date: Option<DateTime<Utc>>,
	pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn other_carrier_requires_name() {
		assert!(InternationalCarrier::Other("".to_string()).validate().is_err());
		assert!(InternationalCarrier::Other("  ".to_string()).validate().is_err());
		assert!(InternationalCarrier::Other("PostNL".to_string())
			.validate()
			.is_ok());
		assert!(DomesticCarrier::Other("".to_string()).validate().is_err());
		assert!(DomesticCarrier::IsraelPost.validate().is_ok());
	}

	#[test]
	fn carrier_serde_round_trip() {
		let carrier = DomesticCarrier::Other("Local Courier".to_string());
		let json = serde_json::to_string(&carrier).unwrap();
		let back: DomesticCarrier = serde_json::from_str(&json).unwrap();
		assert_eq!(back, carrier);

		let json = serde_json::to_string(&InternationalCarrier::Dhl).unwrap();
		assert_eq!(json, "\"dhl\"");
	}
}
