//! Operation handlers for the fulfillment engine.
//!
//! Each handler owns one slice of the command surface: order lifecycle
//! (creation, status changes, the override lock, notes), payment
//! settlement (holds, charges, refunds, gateway notifications), and
//! tracking. Handlers acquire the per-order lock before any mutation.

pub mod orders;
pub mod settlement;
pub mod tracking;

pub use orders::OrderHandler;
pub use settlement::{refund_eligibility, SettlementHandler};
pub use tracking::TrackingHandler;
