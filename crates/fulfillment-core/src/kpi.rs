//! Dashboard KPI aggregation.
//!
//! A pure rollup over the live order set. Daily and monthly windows are
//! anchored to the operator's business calendar, expressed as a fixed UTC
//! offset, so "today" matches what the operator sees rather than the UTC
//! date.

use crate::alerts::{order_health, AlertPolicy};
use chrono::{DateTime, Datelike, FixedOffset, Offset, Utc};
use fulfillment_types::{
	AlertSeverity, CountAndAmount, KpiSnapshot, LedgerEntryKind, LedgerOutcome, Order,
	OrderStatus, PaymentStatus, StuckSummary,
};
use rust_decimal::Decimal;

fn business_offset(offset_hours: i64) -> FixedOffset {
	// Validated at config load: |offset| <= 14.
	FixedOffset::east_opt((offset_hours * 3600) as i32).unwrap_or_else(|| Utc.fix())
}

fn same_business_day(a: DateTime<Utc>, b: DateTime<Utc>, offset: FixedOffset) -> bool {
	a.with_timezone(&offset).date_naive() == b.with_timezone(&offset).date_naive()
}

fn same_business_month(a: DateTime<Utc>, b: DateTime<Utc>, offset: FixedOffset) -> bool {
	let a = a.with_timezone(&offset);
	let b = b.with_timezone(&offset);
	a.year() == b.year() && a.month() == b.month()
}

/// Net captured amount over ledger entries inside the window: succeeded
/// charges minus succeeded refunds.
fn net_revenue<F>(orders: &[Order], in_window: F) -> Decimal
where
	F: Fn(DateTime<Utc>) -> bool,
{
	let mut net = Decimal::ZERO;
	for order in orders {
		for entry in &order.payment.ledger {
			if entry.outcome != LedgerOutcome::Succeeded || !in_window(entry.at) {
				continue;
			}
			match entry.kind {
				LedgerEntryKind::Charge => net += entry.amount,
				LedgerEntryKind::Refund => net -= entry.amount,
				_ => {},
			}
		}
	}
	net
}

/// Computes the dashboard snapshot over the given order set.
pub fn kpi_snapshot(
	orders: &[Order],
	policy: &AlertPolicy,
	business_utc_offset_hours: i64,
	now: DateTime<Utc>,
) -> KpiSnapshot {
	let offset = business_offset(business_utc_offset_hours);

	let mut urgent = 0;
	let mut pending_payment = CountAndAmount::default();
	let mut in_transit = 0;
	let mut stuck_count = 0;
	let mut stuck_age_days_total = 0.0;
	let mut completed_today = 0;

	for order in orders {
		let health = order_health(order, policy, now);
		if health.has_severity(AlertSeverity::High) {
			urgent += 1;
		}
		if health.has_severity(AlertSeverity::Medium) {
			stuck_count += 1;
			stuck_age_days_total += (now - order.last_activity_at()).num_days() as f64;
		}
		if order.payment.status == PaymentStatus::ReadyToCharge {
			pending_payment.count += 1;
			pending_payment.amount += order.pricing.total;
		}
		if order.status.is_in_transit() {
			in_transit += 1;
		}
		let delivered_today = order.timeline.iter().any(|entry| {
			entry.to == OrderStatus::Delivered && same_business_day(entry.at, now, offset)
		});
		if delivered_today {
			completed_today += 1;
		}
	}

	let stuck = StuckSummary {
		count: stuck_count,
		average_age_days: if stuck_count > 0 {
			stuck_age_days_total / stuck_count as f64
		} else {
			0.0
		},
	};

	KpiSnapshot {
		urgent,
		pending_payment,
		in_transit,
		stuck,
		completed_today,
		revenue_this_month: net_revenue(orders, |at| same_business_month(at, now, offset)),
		revenue_today: net_revenue(orders, |at| same_business_day(at, now, offset)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Duration;
	use fulfillment_types::{
		Actor, LedgerEntry, PaymentRecord, Pricing, TimelineEntry, TimelineKind,
	};
	use rust_decimal_macros::dec;

	fn policy() -> AlertPolicy {
		AlertPolicy {
			stuck_threshold_days: 7,
			tracking_grace_days: 5,
			sla_warning_days: 5,
		}
	}

	fn order_in(status: OrderStatus, total: Decimal) -> Order {
		Order {
			id: uuid::Uuid::new_v4().to_string(),
			order_number: "1001".to_string(),
			customer_ref: "c-1".to_string(),
			created_at: Utc::now(),
			updated_at: Utc::now(),
			status,
			pricing: Pricing {
				subtotal: total,
				shipping: dec!(0),
				discount: dec!(0),
				total,
			},
			manual_override: None,
			items: Vec::new(),
			payment: PaymentRecord::new(),
			admin_notes: Vec::new(),
			timeline: Vec::new(),
		}
	}

	fn ledger_entry(kind: LedgerEntryKind, amount: Decimal, at: DateTime<Utc>) -> LedgerEntry {
		LedgerEntry {
			id: uuid::Uuid::new_v4().to_string(),
			kind,
			amount,
			funding: None,
			reason: "test".to_string(),
			performed_by: Actor::Admin("dana".to_string()),
			at,
			gateway_reference: None,
			outcome: LedgerOutcome::Succeeded,
			client_request_id: None,
		}
	}

	#[test]
	fn revenue_nets_refunds_against_charges() {
		let now = Utc::now();
		let mut order = order_in(OrderStatus::Delivered, dec!(500));
		order
			.payment
			.ledger
			.push(ledger_entry(LedgerEntryKind::Charge, dec!(500), now));
		order
			.payment
			.ledger
			.push(ledger_entry(LedgerEntryKind::Refund, dec!(200), now));
		// An indeterminate charge moves no money.
		let mut pending = ledger_entry(LedgerEntryKind::Charge, dec!(900), now);
		pending.outcome = LedgerOutcome::Indeterminate;
		order.payment.ledger.push(pending);

		let snapshot = kpi_snapshot(&[order], &policy(), 3, now);
		assert_eq!(snapshot.revenue_today, dec!(300));
		assert_eq!(snapshot.revenue_this_month, dec!(300));
	}

	#[test]
	fn pending_payment_counts_ready_to_charge_totals() {
		let now = Utc::now();
		let mut a = order_in(OrderStatus::PaymentHold, dec!(120));
		a.payment.status = PaymentStatus::ReadyToCharge;
		let mut b = order_in(OrderStatus::PaymentHold, dec!(80));
		b.payment.status = PaymentStatus::ReadyToCharge;
		let c = order_in(OrderStatus::Pending, dec!(50));

		let snapshot = kpi_snapshot(&[a, b, c], &policy(), 3, now);
		assert_eq!(snapshot.pending_payment.count, 2);
		assert_eq!(snapshot.pending_payment.amount, dec!(200));
	}

	#[test]
	fn completed_today_uses_the_business_day() {
		let now = Utc::now();
		let mut today = order_in(OrderStatus::Delivered, dec!(100));
		today.timeline.push(TimelineEntry {
			from: OrderStatus::ShippedToCustomer,
			to: OrderStatus::Delivered,
			actor: Actor::Admin("dana".to_string()),
			at: now,
			reason: None,
			kind: TimelineKind::Transition,
		});
		let mut last_week = order_in(OrderStatus::Delivered, dec!(100));
		last_week.timeline.push(TimelineEntry {
			from: OrderStatus::ShippedToCustomer,
			to: OrderStatus::Delivered,
			actor: Actor::Admin("dana".to_string()),
			at: now - Duration::days(7),
			reason: None,
			kind: TimelineKind::Transition,
		});

		let snapshot = kpi_snapshot(&[today, last_week], &policy(), 3, now);
		assert_eq!(snapshot.completed_today, 1);
	}

	#[test]
	fn stuck_summary_averages_idle_days() {
		let now = Utc::now();
		let mut a = order_in(OrderStatus::Ordered, dec!(100));
		a.created_at = now - Duration::days(10);
		let mut b = order_in(OrderStatus::CustomsIsrael, dec!(100));
		b.created_at = now - Duration::days(20);

		let snapshot = kpi_snapshot(&[a, b], &policy(), 3, now);
		assert_eq!(snapshot.stuck.count, 2);
		assert!((snapshot.stuck.average_age_days - 15.0).abs() < 0.01);
	}

	#[test]
	fn in_transit_counts_shipping_statuses() {
		let orders = vec![
			order_in(OrderStatus::ShippedToIsrael, dec!(1)),
			order_in(OrderStatus::CustomsIsrael, dec!(1)),
			order_in(OrderStatus::Ordered, dec!(1)),
			order_in(OrderStatus::Cancelled, dec!(1)),
		];
		let snapshot = kpi_snapshot(&orders, &policy(), 3, Utc::now());
		assert_eq!(snapshot.in_transit, 2);
	}
}
