//! Storage-related types for the fulfillment engine.

use std::str::FromStr;

/// Storage keys for different data collections.
///
/// This enum provides type safety for storage operations by replacing
/// string literals with strongly typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Key for storing order data
	Orders,
	/// Key for idempotency records of retried charge/refund requests
	Idempotency,
	/// Key for deduplicating gateway notification event ids
	GatewayEvents,
	/// Key for mapping gateway references to order IDs
	OrderByGatewayRef,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::Idempotency => "idempotency",
			StorageKey::GatewayEvents => "gateway_events",
			StorageKey::OrderByGatewayRef => "order_by_gateway_ref",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Orders,
			Self::Idempotency,
			Self::GatewayEvents,
			Self::OrderByGatewayRef,
		]
		.into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"orders" => Ok(Self::Orders),
			"idempotency" => Ok(Self::Idempotency),
			"gateway_events" => Ok(Self::GatewayEvents),
			"order_by_gateway_ref" => Ok(Self::OrderByGatewayRef),
			_ => Err(()),
		}
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}
