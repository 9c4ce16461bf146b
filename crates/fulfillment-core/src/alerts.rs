//! Stuck-order alert detector.
//!
//! Alerts are a pure projection over the order record and the current
//! time. Nothing is persisted, so an alert clears the moment the
//! underlying condition does: recording tracking clears the missing-
//! tracking alert, any timeline entry clears the stuck alert.

use chrono::{DateTime, Utc};
use fulfillment_config::EngineConfig;
use fulfillment_types::{
	Alert, AlertSeverity, Order, OrderHealth, OrderStatus, PaymentStatus,
};

/// Thresholds the detector evaluates orders against.
#[derive(Debug, Clone, Copy)]
pub struct AlertPolicy {
	pub stuck_threshold_days: i64,
	pub tracking_grace_days: i64,
	pub sla_warning_days: i64,
}

impl From<&EngineConfig> for AlertPolicy {
	fn from(config: &EngineConfig) -> Self {
		Self {
			stuck_threshold_days: config.stuck_threshold_days as i64,
			tracking_grace_days: config.tracking_grace_days as i64,
			sla_warning_days: config.sla_warning_days as i64,
		}
	}
}

/// When the order last entered the given status, per the timeline.
fn entered_status_at(order: &Order, status: OrderStatus) -> Option<DateTime<Utc>> {
	order
		.timeline
		.iter()
		.rev()
		.find(|entry| entry.to == status)
		.map(|entry| entry.at)
}

/// Completion as a percentage of the non-terminal pipeline stages.
///
/// Delivered reports 100, Cancelled 0.
pub fn completion_percentage(status: OrderStatus) -> f64 {
	match status.pipeline_position() {
		Some(position) => position as f64 / OrderStatus::NON_TERMINAL_STAGES as f64 * 100.0,
		None => 0.0,
	}
}

/// Evaluates one order against the policy at the given instant.
pub fn order_health(order: &Order, policy: &AlertPolicy, now: DateTime<Utc>) -> OrderHealth {
	let mut alerts = Vec::new();

	if order.payment.status == PaymentStatus::Failed {
		alerts.push(Alert {
			severity: AlertSeverity::High,
			message: "payment failed; the last gateway operation was declined".to_string(),
		});
	}

	let past_ordered = matches!(
		(
			order.status.pipeline_position(),
			OrderStatus::Ordered.pipeline_position()
		),
		(Some(position), Some(ordered)) if position >= ordered
	);
	if past_ordered && !order.status.is_terminal() && !order.has_any_tracking() {
		let ordered_at =
			entered_status_at(order, OrderStatus::Ordered).unwrap_or(order.created_at);
		let age_days = (now - ordered_at).num_days();
		if age_days > policy.tracking_grace_days {
			alerts.push(Alert {
				severity: AlertSeverity::High,
				message: format!(
					"no tracking recorded {} days after supplier purchase",
					age_days
				),
			});
		}
	}

	if !order.status.is_terminal() {
		let idle_days = (now - order.last_activity_at()).num_days();
		if idle_days >= policy.stuck_threshold_days {
			alerts.push(Alert {
				severity: AlertSeverity::Medium,
				message: format!("no activity for {} days", idle_days),
			});
		}
	}

	if order.status.is_in_transit() {
		let entered_at = entered_status_at(order, order.status).unwrap_or(order.created_at);
		let transit_days = (now - entered_at).num_days();
		if transit_days >= policy.sla_warning_days {
			alerts.push(Alert {
				severity: AlertSeverity::Low,
				message: format!(
					"in '{}' for {} days, past the delivery window",
					order.status, transit_days
				),
			});
		}
	}

	OrderHealth {
		alerts,
		completion_percentage: completion_percentage(order.status),
	}
}
