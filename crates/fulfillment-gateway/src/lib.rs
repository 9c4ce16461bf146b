//! Payment gateway module for the fulfillment engine.
//!
//! This module handles all money movement against the external payment
//! provider. It provides abstractions for authorization holds, captures,
//! refunds, and transaction lookups, plus a service wrapper that applies
//! the configured call deadline so a slow provider can never wedge an
//! order's critical section.

use async_trait::async_trait;
use fulfillment_types::{CardDetails, ConfigSchema};
use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod mock;
}

/// Errors that can occur during gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
	/// The provider rejected the operation (insufficient funds, bad card).
	#[error("Declined: {0}")]
	Declined(String),
	/// The call did not complete within the configured deadline. The
	/// outcome on the provider side is unknown.
	#[error("Gateway call timed out after {0:?}")]
	Timeout(Duration),
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// The referenced transaction is unknown to the provider.
	#[error("Unknown transaction reference: {0}")]
	UnknownReference(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// The funding instrument for a capture or refund.
#[derive(Debug, Clone)]
pub enum Instrument {
	/// Reuse the card behind an existing gateway reference.
	ExistingReference(String),
	/// Charge a freshly supplied card.
	Card(CardDetails),
}

/// The provider-side state of a transaction, as reported by a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
	/// The transaction settled successfully.
	Settled,
	/// The transaction failed or was voided.
	Failed,
	/// The provider has no final answer yet.
	Pending,
}

/// Trait defining the interface for payment gateway providers.
///
/// This trait must be implemented by any gateway provider that wants to
/// integrate with the engine. Amounts are always in the store currency.
/// Every mutating call returns the provider's reference for the created
/// transaction so it can be recorded on the ledger entry.
#[async_trait]
pub trait GatewayInterface: Send + Sync {
	/// Returns the configuration schema for this gateway implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Places an authorization hold for the given amount.
	async fn authorize(
		&self,
		amount: Decimal,
		card: &CardDetails,
	) -> Result<String, GatewayError>;

	/// Captures funds against an instrument.
	async fn capture(
		&self,
		amount: Decimal,
		instrument: &Instrument,
	) -> Result<String, GatewayError>;

	/// Refunds funds previously captured under the given reference.
	///
	/// `card_verification` carries card details when the provider requires
	/// re-verification for credits.
	async fn refund(
		&self,
		reference: &str,
		amount: Decimal,
		card_verification: Option<&CardDetails>,
	) -> Result<String, GatewayError>;

	/// Looks up the provider-side state of a transaction.
	///
	/// Used by the reconciliation sweep to settle ledger entries whose
	/// original call timed out.
	async fn query_transaction(&self, reference: &str) -> Result<TransactionState, GatewayError>;
}

/// Type alias for gateway factory functions.
///
/// This is the function signature that all gateway implementations must
/// provide to create instances of their gateway interface.
pub type GatewayFactory = fn(&toml::Value) -> Result<Box<dyn GatewayInterface>, GatewayError>;

/// Service that wraps a gateway provider with a call deadline.
///
/// Gateway calls happen inside an order's critical section, so every call
/// is bounded. A deadline miss surfaces as [`GatewayError::Timeout`] and
/// the caller records the attempt as indeterminate.
pub struct GatewayService {
	/// The underlying gateway provider implementation.
	provider: Box<dyn GatewayInterface>,
	/// Maximum wall-clock time allowed for a single provider call.
	call_deadline: Duration,
}

impl GatewayService {
	/// Creates a new GatewayService with the specified provider and deadline.
	pub fn new(provider: Box<dyn GatewayInterface>, call_deadline: Duration) -> Self {
		Self {
			provider,
			call_deadline,
		}
	}

	async fn bounded<T>(
		&self,
		fut: impl std::future::Future<Output = Result<T, GatewayError>>,
	) -> Result<T, GatewayError> {
		tokio::time::timeout(self.call_deadline, fut)
			.await
			.unwrap_or(Err(GatewayError::Timeout(self.call_deadline)))
	}

	/// Places an authorization hold, bounded by the call deadline.
	pub async fn authorize(
		&self,
		amount: Decimal,
		card: &CardDetails,
	) -> Result<String, GatewayError> {
		self.bounded(self.provider.authorize(amount, card)).await
	}

	/// Captures funds, bounded by the call deadline.
	pub async fn capture(
		&self,
		amount: Decimal,
		instrument: &Instrument,
	) -> Result<String, GatewayError> {
		self.bounded(self.provider.capture(amount, instrument)).await
	}

	/// Refunds funds, bounded by the call deadline.
	pub async fn refund(
		&self,
		reference: &str,
		amount: Decimal,
		card_verification: Option<&CardDetails>,
	) -> Result<String, GatewayError> {
		self.bounded(self.provider.refund(reference, amount, card_verification))
			.await
	}

	/// Looks up a transaction, bounded by the call deadline.
	pub async fn query_transaction(
		&self,
		reference: &str,
	) -> Result<TransactionState, GatewayError> {
		self.bounded(self.provider.query_transaction(reference))
			.await
	}
}
