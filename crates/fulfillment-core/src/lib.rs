//! Core fulfillment engine.
//!
//! This crate provides the orchestration logic for the order fulfillment
//! and payment settlement pipeline: the order state machine with its
//! manual-override lock, the append-only settlement ledger, the tracking
//! subsystem, the automated status advancer, gateway webhook ingestion,
//! the reconciliation sweep for indeterminate gateway outcomes, and the
//! read-side alert and KPI projections. All mutations on a single order
//! are serialized through a per-order lock registry.

use fulfillment_storage::StorageError;
use thiserror::Error;

pub mod alerts;
pub mod builder;
pub mod engine;
pub mod handlers;
pub mod kpi;
pub mod locks;
pub mod monitoring;
pub mod state;

pub use builder::{FulfillmentBuilder, FulfillmentFactories};
pub use engine::{event_bus::EventBus, FulfillmentEngine};

/// Errors surfaced by engine operations.
///
/// The taxonomy maps directly onto operator-facing failure modes:
/// validation problems never reach the gateway, invariant violations are
/// checked before any external call, gateway failures are always recorded
/// on the ledger before being surfaced.
#[derive(Debug, Error)]
pub enum EngineError {
	/// Malformed input (missing reason, bad card shape, non-positive amount).
	#[error("Validation error: {0}")]
	Validation(String),
	/// A domain invariant would be violated (illegal transition, refund
	/// over budget, operation on a cancelled order).
	#[error("Invariant violation: {0}")]
	Invariant(String),
	/// The referenced order or item does not exist.
	#[error("Not found: {0}")]
	NotFound(String),
	/// The external gateway declined, failed, or timed out. The attempt is
	/// already on the ledger when this is returned.
	#[error("Gateway error: {0}")]
	Gateway(String),
	/// The storage backend failed.
	#[error("Storage error: {0}")]
	Storage(String),
}

impl From<StorageError> for EngineError {
	fn from(err: StorageError) -> Self {
		match err {
			StorageError::NotFound => EngineError::NotFound("order not found".to_string()),
			other => EngineError::Storage(other.to_string()),
		}
	}
}
