//! Mock payment gateway implementation.
//!
//! This module provides an in-process gateway for testing and local
//! development. Every call is recorded so tests can assert on exactly how
//! many provider calls a flow produced, and behavior knobs allow forcing
//! declines or slow responses.

use crate::{GatewayError, GatewayInterface, Instrument, TransactionState};
use async_trait::async_trait;
use fulfillment_types::{CardDetails, ConfigSchema, Field, FieldType, Schema, ValidationError};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A single recorded provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
	Authorize { amount: Decimal },
	Capture { amount: Decimal },
	Refund { reference: String, amount: Decimal },
	Query { reference: String },
}

#[derive(Default)]
struct MockState {
	transactions: HashMap<String, TransactionState>,
	calls: Vec<MockCall>,
	sequence: u64,
}

/// In-process gateway that settles every transaction immediately.
///
/// Cloning yields a handle onto the same underlying state, so a test can
/// keep one clone for assertions while the engine owns the other.
#[derive(Clone)]
pub struct MockGateway {
	state: Arc<Mutex<MockState>>,
	/// When true, authorize and capture calls are declined.
	decline_all: bool,
	/// Artificial latency applied before every call completes.
	response_delay: Duration,
}

impl MockGateway {
	pub fn new() -> Self {
		Self {
			state: Arc::new(Mutex::new(MockState::default())),
			decline_all: false,
			response_delay: Duration::ZERO,
		}
	}

	/// Returns a gateway that declines every money-moving call.
	pub fn declining() -> Self {
		Self {
			decline_all: true,
			..Self::new()
		}
	}

	/// Returns a gateway that sleeps before answering, for deadline tests.
	pub fn with_delay(delay: Duration) -> Self {
		Self {
			response_delay: delay,
			..Self::new()
		}
	}

	/// All calls made so far, in order.
	pub fn calls(&self) -> Vec<MockCall> {
		self.state.lock().unwrap().calls.clone()
	}

	/// Number of calls made so far.
	pub fn call_count(&self) -> usize {
		self.state.lock().unwrap().calls.len()
	}

	/// Seeds the provider-side state for a reference, for reconciliation
	/// scenarios where the original call never returned to the engine.
	pub fn seed_transaction(&self, reference: &str, state: TransactionState) {
		self.state
			.lock()
			.unwrap()
			.transactions
			.insert(reference.to_string(), state);
	}

	fn next_reference(&self, prefix: &str) -> String {
		let mut state = self.state.lock().unwrap();
		state.sequence += 1;
		let reference = format!("{}-{:06}", prefix, state.sequence);
		state
			.transactions
			.insert(reference.clone(), TransactionState::Settled);
		reference
	}

	fn record(&self, call: MockCall) {
		self.state.lock().unwrap().calls.push(call);
	}

	async fn simulate_latency(&self) {
		if !self.response_delay.is_zero() {
			tokio::time::sleep(self.response_delay).await;
		}
	}
}

impl Default for MockGateway {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl GatewayInterface for MockGateway {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MockGatewaySchema)
	}

	async fn authorize(
		&self,
		amount: Decimal,
		card: &CardDetails,
	) -> Result<String, GatewayError> {
		self.record(MockCall::Authorize { amount });
		self.simulate_latency().await;
		card.validate().map_err(GatewayError::Declined)?;
		if self.decline_all {
			return Err(GatewayError::Declined("card declined".into()));
		}
		Ok(self.next_reference("auth"))
	}

	async fn capture(
		&self,
		amount: Decimal,
		instrument: &Instrument,
	) -> Result<String, GatewayError> {
		self.record(MockCall::Capture { amount });
		self.simulate_latency().await;
		if self.decline_all {
			return Err(GatewayError::Declined("capture declined".into()));
		}
		match instrument {
			Instrument::ExistingReference(reference) => {
				let known = self
					.state
					.lock()
					.unwrap()
					.transactions
					.contains_key(reference);
				if !known {
					return Err(GatewayError::UnknownReference(reference.clone()));
				}
			},
			Instrument::Card(card) => card.validate().map_err(GatewayError::Declined)?,
		}
		Ok(self.next_reference("chg"))
	}

	async fn refund(
		&self,
		reference: &str,
		amount: Decimal,
		_card_verification: Option<&CardDetails>,
	) -> Result<String, GatewayError> {
		self.record(MockCall::Refund {
			reference: reference.to_string(),
			amount,
		});
		self.simulate_latency().await;
		let known = self
			.state
			.lock()
			.unwrap()
			.transactions
			.contains_key(reference);
		if !known {
			return Err(GatewayError::UnknownReference(reference.to_string()));
		}
		Ok(self.next_reference("rfnd"))
	}

	async fn query_transaction(&self, reference: &str) -> Result<TransactionState, GatewayError> {
		self.record(MockCall::Query {
			reference: reference.to_string(),
		});
		self.simulate_latency().await;
		self.state
			.lock()
			.unwrap()
			.transactions
			.get(reference)
			.copied()
			.ok_or_else(|| GatewayError::UnknownReference(reference.to_string()))
	}
}

/// Configuration schema for MockGateway.
pub struct MockGatewaySchema;

impl ConfigSchema for MockGatewaySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![],
			vec![
				Field::new("decline_all", FieldType::Boolean),
				Field::new(
					"response_delay_ms",
					FieldType::Integer {
						min: Some(0),
						max: None,
					},
				),
			],
		)
		.validate(config)
	}
}

/// Factory function to create a mock gateway from configuration.
///
/// Configuration parameters:
/// - `decline_all`: decline every money-moving call (default: false)
/// - `response_delay_ms`: artificial latency in milliseconds (default: 0)
pub fn create_gateway(config: &toml::Value) -> Result<Box<dyn GatewayInterface>, GatewayError> {
	let decline_all = config
		.get("decline_all")
		.and_then(|v| v.as_bool())
		.unwrap_or(false);
	let response_delay = config
		.get("response_delay_ms")
		.and_then(|v| v.as_integer())
		.map(|ms| Duration::from_millis(ms as u64))
		.unwrap_or(Duration::ZERO);

	let mut gateway = MockGateway::new();
	gateway.decline_all = decline_all;
	gateway.response_delay = response_delay;
	Ok(Box::new(gateway))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::GatewayService;
	use rust_decimal_macros::dec;

	fn test_card() -> CardDetails {
		CardDetails {
			number: "4580111122223333".to_string(),
			exp_month: "04".to_string(),
			exp_year: "2027".to_string(),
			cvv: "123".to_string(),
			holder_id: "123456789".to_string(),
		}
	}

	#[tokio::test]
	async fn authorize_then_capture_by_reference() {
		let gateway = MockGateway::new();
		let auth_ref = gateway.authorize(dec!(500), &test_card()).await.unwrap();

		let charge_ref = gateway
			.capture(dec!(500), &Instrument::ExistingReference(auth_ref.clone()))
			.await
			.unwrap();
		assert_ne!(auth_ref, charge_ref);
		assert_eq!(
			gateway.query_transaction(&charge_ref).await.unwrap(),
			TransactionState::Settled
		);
		assert_eq!(gateway.call_count(), 3);
	}

	#[tokio::test]
	async fn refund_against_unknown_reference_fails() {
		let gateway = MockGateway::new();
		let result = gateway.refund("chg-missing", dec!(100), None).await;
		assert!(matches!(result, Err(GatewayError::UnknownReference(_))));
	}

	#[tokio::test]
	async fn declining_gateway_rejects_capture() {
		let gateway = MockGateway::declining();
		let result = gateway
			.capture(dec!(100), &Instrument::Card(test_card()))
			.await;
		assert!(matches!(result, Err(GatewayError::Declined(_))));
	}

	#[tokio::test]
	async fn service_enforces_call_deadline() {
		let slow = MockGateway::with_delay(Duration::from_secs(5));
		let service = GatewayService::new(Box::new(slow), Duration::from_millis(20));

		let result = service.authorize(dec!(500), &test_card()).await;
		assert!(matches!(result, Err(GatewayError::Timeout(_))));
	}
}
