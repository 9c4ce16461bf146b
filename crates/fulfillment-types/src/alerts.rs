//! Alert types produced by the stuck-order detector.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a derived alert.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
	Low,
	Medium,
	High,
}

impl fmt::Display for AlertSeverity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AlertSeverity::Low => write!(f, "low"),
			AlertSeverity::Medium => write!(f, "medium"),
			AlertSeverity::High => write!(f, "high"),
		}
	}
}

/// A single derived alert for an order.
///
/// Alerts are recomputed per read and never persisted, so they cannot
/// drift from the source data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
	pub severity: AlertSeverity,
	pub message: String,
}

/// Derived health projection for one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderHealth {
	pub alerts: Vec<Alert>,
	/// Position of the current status in the pipeline as a percentage of
	/// the non-terminal stages. Delivered reports 100, Cancelled 0.
	pub completion_percentage: f64,
}

impl OrderHealth {
	/// Whether any alert at the given severity is present.
	pub fn has_severity(&self, severity: AlertSeverity) -> bool {
		self.alerts.iter().any(|alert| alert.severity == severity)
	}
}
