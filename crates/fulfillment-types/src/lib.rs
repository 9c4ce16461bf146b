//! Common types module for the fulfillment engine.
//!
//! This module defines the core data types and structures used throughout
//! the fulfillment system. It provides a centralized location for shared
//! types to ensure consistency across all engine components.

/// Alert and order-health types produced by the stuck-order detector.
pub mod alerts;
/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Event types for inter-service communication.
pub mod events;
/// KPI snapshot types for the operator dashboard.
pub mod kpi;
/// Order, line-item, timeline, and manual-override types.
pub mod order;
/// Payment record, settlement ledger, and card types.
pub mod payment;
/// Storage namespaces for managing persistent data.
pub mod storage;
/// Per-leg tracking types and carrier vocabularies.
pub mod tracking;
/// Utility functions for display formatting.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use alerts::*;
pub use api::*;
pub use events::*;
pub use kpi::*;
pub use order::*;
pub use payment::*;
pub use storage::*;
pub use tracking::*;
pub use utils::truncate_id;
pub use validation::*;
