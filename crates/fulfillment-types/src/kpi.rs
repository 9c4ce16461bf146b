//! KPI snapshot types for the operator dashboard.
//!
//! The snapshot is a pure read-side rollup over the live order set,
//! windowed by "today" and "this month" in the operator's business
//! calendar. It is recomputed on demand and never persisted.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A count paired with a summed monetary amount.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CountAndAmount {
	pub count: usize,
	pub amount: Decimal,
}

/// Stuck-order rollup: count and average days since last timeline entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StuckSummary {
	pub count: usize,
	pub average_age_days: f64,
}

/// Dashboard snapshot over the current order set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KpiSnapshot {
	/// Orders with at least one high-severity alert.
	pub urgent: usize,
	/// Orders whose payment record is ready to charge, with summed totals.
	pub pending_payment: CountAndAmount,
	/// Orders currently in any shipping-leg status.
	pub in_transit: usize,
	/// Medium-severity ("stuck") orders with their average age.
	pub stuck: StuckSummary,
	/// Orders whose status reached delivered inside today's window.
	pub completed_today: usize,
	/// Net captured amount (charges minus refunds) ledgered this month.
	pub revenue_this_month: Decimal,
	/// Net captured amount (charges minus refunds) ledgered today.
	pub revenue_today: Decimal,
}
