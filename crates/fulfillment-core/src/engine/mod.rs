//! Core fulfillment engine that orchestrates the order lifecycle.
//!
//! This module contains the main FulfillmentEngine struct which wires the
//! storage and gateway services to the operation handlers and runs the
//! background loop: the automated stage advancer, the reconciliation
//! sweep, and storage cleanup.

pub mod event_bus;

use crate::alerts::AlertPolicy;
use crate::handlers::{OrderHandler, SettlementHandler, TrackingHandler};
use crate::locks::OrderLocks;
use crate::monitoring::StageAdvancer;
use crate::state::OrderStateMachine;
use crate::EngineError;
use chrono::Utc;
use fulfillment_config::Config;
use fulfillment_gateway::GatewayService;
use fulfillment_storage::StorageService;
use fulfillment_types::{KpiSnapshot, Order, OrderHealth};
use std::sync::Arc;
use std::time::Duration;

/// Main engine orchestrating order fulfillment and payment settlement.
#[derive(Clone)]
pub struct FulfillmentEngine {
	/// Engine configuration.
	pub(crate) config: Config,
	/// Storage service for persisting state.
	pub(crate) storage: Arc<StorageService>,
	/// Payment gateway service with a bounded call deadline.
	#[allow(dead_code)]
	pub(crate) gateway: Arc<GatewayService>,
	/// Event bus for read-side consumers.
	pub(crate) event_bus: event_bus::EventBus,
	/// Per-order mutexes serializing mutations.
	#[allow(dead_code)]
	pub(crate) locks: Arc<OrderLocks>,
	/// Order state machine.
	pub(crate) state_machine: Arc<OrderStateMachine>,
	/// Order lifecycle handler.
	pub(crate) order_handler: Arc<OrderHandler>,
	/// Payment settlement handler.
	pub(crate) settlement_handler: Arc<SettlementHandler>,
	/// Tracking and procurement handler.
	pub(crate) tracking_handler: Arc<TrackingHandler>,
	/// Automated stage advancer.
	pub(crate) advancer: Arc<StageAdvancer>,
}

impl FulfillmentEngine {
	/// Creates a new engine wired to the given services.
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		gateway: Arc<GatewayService>,
		event_bus: event_bus::EventBus,
	) -> Self {
		let locks = Arc::new(OrderLocks::default());
		let state_machine = Arc::new(OrderStateMachine::new(storage.clone()));

		let order_handler = Arc::new(OrderHandler::new(
			state_machine.clone(),
			locks.clone(),
			event_bus.clone(),
			config.engine.clone(),
		));

		let settlement_handler = Arc::new(SettlementHandler::new(
			state_machine.clone(),
			storage.clone(),
			gateway.clone(),
			locks.clone(),
			event_bus.clone(),
			config.engine.clone(),
		));

		let tracking_handler = Arc::new(TrackingHandler::new(
			state_machine.clone(),
			locks.clone(),
			event_bus.clone(),
		));

		let advancer = Arc::new(StageAdvancer::new(
			state_machine.clone(),
			locks.clone(),
			event_bus.clone(),
		));

		Self {
			config,
			storage,
			gateway,
			event_bus,
			locks,
			state_machine,
			order_handler,
			settlement_handler,
			tracking_handler,
			advancer,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn orders(&self) -> &OrderHandler {
		&self.order_handler
	}

	pub fn settlement(&self) -> &SettlementHandler {
		&self.settlement_handler
	}

	pub fn tracking(&self) -> &TrackingHandler {
		&self.tracking_handler
	}

	pub fn event_bus(&self) -> &event_bus::EventBus {
		&self.event_bus
	}

	/// Derived health projection for one order, evaluated now.
	pub async fn order_health(&self, order_id: &str) -> Result<OrderHealth, EngineError> {
		let order = self.state_machine.get_order(order_id).await?;
		let policy = AlertPolicy::from(&self.config.engine);
		Ok(crate::alerts::order_health(&order, &policy, Utc::now()))
	}

	/// Dashboard KPI snapshot over the live order set.
	pub async fn kpi_snapshot(&self) -> Result<KpiSnapshot, EngineError> {
		let orders = self.state_machine.list_orders().await?;
		let policy = AlertPolicy::from(&self.config.engine);
		Ok(crate::kpi::kpi_snapshot(
			&orders,
			&policy,
			self.config.engine.business_utc_offset_hours,
			Utc::now(),
		))
	}

	/// Orders carrying at least one alert, paired with their health.
	pub async fn orders_with_alerts(&self) -> Result<Vec<(Order, OrderHealth)>, EngineError> {
		let orders = self.state_machine.list_orders().await?;
		let policy = AlertPolicy::from(&self.config.engine);
		let now = Utc::now();
		Ok(orders
			.into_iter()
			.filter_map(|order| {
				let health = crate::alerts::order_health(&order, &policy, now);
				(!health.alerts.is_empty()).then_some((order, health))
			})
			.collect())
	}

	/// Main background loop: advancer sweeps, reconciliation sweeps, and
	/// storage cleanup, until shutdown.
	pub async fn run(&self) -> Result<(), EngineError> {
		// Start storage cleanup task
		let storage = self.storage.clone();
		let cleanup_interval = tokio::time::interval(Duration::from_secs(
			self.config.storage.cleanup_interval_seconds,
		));
		let cleanup_handle = tokio::spawn(async move {
			let mut interval = cleanup_interval;
			loop {
				interval.tick().await;
				match storage.cleanup_expired().await {
					Ok(count) if count > 0 => {
						tracing::debug!("Storage cleanup: removed {} expired entries", count);
					},
					Err(e) => {
						tracing::warn!("Storage cleanup failed: {}", e);
					},
					_ => {}, // No expired entries
				}
			}
		});

		let mut advancer_interval = tokio::time::interval(Duration::from_secs(
			self.config.engine.advancer_interval_seconds,
		));
		let mut reconcile_interval = tokio::time::interval(Duration::from_secs(
			self.config.engine.reconcile_interval_seconds,
		));
		// The first tick of an interval fires immediately; consume both so
		// sweeps start one full period after boot.
		advancer_interval.tick().await;
		reconcile_interval.tick().await;

		tracing::info!(
			advancer_interval = self.config.engine.advancer_interval_seconds,
			reconcile_interval = self.config.engine.reconcile_interval_seconds,
			"Fulfillment engine running"
		);

		loop {
			tokio::select! {
				_ = advancer_interval.tick() => {
					if let Err(e) = self.advancer.sweep().await {
						tracing::warn!("Advancer sweep failed: {}", e);
					}
				}

				_ = reconcile_interval.tick() => {
					if let Err(e) = self.settlement_handler.reconcile_sweep().await {
						tracing::warn!("Reconciliation sweep failed: {}", e);
					}
				}

				// Handle shutdown
				_ = tokio::signal::ctrl_c() => {
					tracing::info!("Shutting down fulfillment engine...");
					break;
				}
			}
		}

		cleanup_handle.abort();
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use fulfillment_gateway::implementations::mock::{MockCall, MockGateway};
	use fulfillment_gateway::TransactionState;
	use fulfillment_storage::implementations::memory::MemoryStorage;
	use fulfillment_types::{
		Actor, AuthorizeRequest, CardDetails, ChargeFunding, ChargeRequest, GatewayNotification,
		GatewayNotificationKind, LedgerEntry, LedgerEntryKind, LedgerOutcome, NewOrderItem,
		NewOrderRequest, OrderStatus, PaymentStatus, RefundRequest,
	};
	use rust_decimal_macros::dec;

	const TEST_CONFIG: &str = r#"
[service]
id = "fulfillment-test"

[engine]

[storage]
primary = "memory"
[storage.implementations.memory]

[gateway]
primary = "mock"
[gateway.implementations.mock]
"#;

	fn engine_with(mock: MockGateway) -> FulfillmentEngine {
		engine_with_deadline(mock, Duration::from_secs(5))
	}

	fn engine_with_deadline(mock: MockGateway, deadline: Duration) -> FulfillmentEngine {
		let config: Config = TEST_CONFIG.parse().unwrap();
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let gateway = Arc::new(GatewayService::new(Box::new(mock), deadline));
		FulfillmentEngine::new(config, storage, gateway, event_bus::EventBus::new(64))
	}

	fn test_card() -> CardDetails {
		CardDetails {
			number: "4580111122223333".to_string(),
			exp_month: "04".to_string(),
			exp_year: "2027".to_string(),
			cvv: "123".to_string(),
			holder_id: "123456789".to_string(),
		}
	}

	fn new_order_request() -> NewOrderRequest {
		NewOrderRequest {
			order_number: "1001".to_string(),
			customer_ref: "c-1".to_string(),
			subtotal: dec!(480),
			shipping: dec!(20),
			discount: dec!(0),
			items: vec![NewOrderItem {
				product_ref: "sku-1".to_string(),
				quantity: 2,
				unit_price: dec!(240),
			}],
		}
	}

	fn charge_request(amount: rust_decimal::Decimal, request_id: &str) -> ChargeRequest {
		ChargeRequest {
			amount,
			mode: ChargeFunding::Existing,
			card: None,
			reason: "customer confirmed the order".to_string(),
			actor: "dana".to_string(),
			client_request_id: request_id.to_string(),
		}
	}

	fn refund_request(amount: rust_decimal::Decimal, request_id: &str) -> RefundRequest {
		RefundRequest {
			amount,
			reason: "one item arrived damaged".to_string(),
			card_verification: None,
			actor: "dana".to_string(),
			client_request_id: request_id.to_string(),
		}
	}

	#[tokio::test]
	async fn charge_then_partial_refund_respects_the_budget() {
		let mock = MockGateway::new();
		let engine = engine_with(mock.clone());
		let order = engine.orders().create_order(new_order_request()).await.unwrap();

		let payment = engine
			.settlement()
			.authorize(
				&order.id,
				AuthorizeRequest {
					amount: dec!(500),
					card: test_card(),
				},
			)
			.await
			.unwrap();
		assert_eq!(payment.status, PaymentStatus::Hold);
		assert_eq!(payment.authorization_amount, dec!(500));

		let charged = engine
			.settlement()
			.charge(&order.id, charge_request(dec!(500), "req-1"))
			.await
			.unwrap();
		assert_eq!(charged.payment_status, PaymentStatus::Charged);
		assert_eq!(charged.charged_amount, dec!(500));

		let refunded = engine
			.settlement()
			.refund(&order.id, refund_request(dec!(200), "req-2"))
			.await
			.unwrap();
		assert_eq!(refunded.refunded_amount, dec!(200));
		assert_eq!(refunded.max_refundable, dec!(300));

		// A further 400 would exceed the 300 still refundable.
		let over = engine
			.settlement()
			.refund(&order.id, refund_request(dec!(400), "req-3"))
			.await;
		assert!(matches!(over, Err(EngineError::Invariant(_))));

		let eligibility = engine.settlement().can_refund(&order.id).await.unwrap();
		assert!(eligibility.eligible);
		assert_eq!(eligibility.max_refundable, dec!(300));
	}

	#[tokio::test]
	async fn identical_charge_retry_hits_the_gateway_once() {
		let mock = MockGateway::new();
		let engine = engine_with(mock.clone());
		let order = engine.orders().create_order(new_order_request()).await.unwrap();
		engine
			.settlement()
			.authorize(
				&order.id,
				AuthorizeRequest {
					amount: dec!(500),
					card: test_card(),
				},
			)
			.await
			.unwrap();

		let first = engine
			.settlement()
			.charge(&order.id, charge_request(dec!(500), "req-dup"))
			.await
			.unwrap();
		let second = engine
			.settlement()
			.charge(&order.id, charge_request(dec!(500), "req-dup"))
			.await
			.unwrap();
		assert_eq!(first.entry.id, second.entry.id);

		let stored = engine.orders().get_order(&order.id).await.unwrap();
		let charge_entries = stored
			.payment
			.ledger
			.iter()
			.filter(|entry| entry.kind == LedgerEntryKind::Charge)
			.count();
		assert_eq!(charge_entries, 1);
		assert_eq!(stored.payment.charged_amount, dec!(500));

		let captures = mock
			.calls()
			.iter()
			.filter(|call| matches!(call, MockCall::Capture { .. }))
			.count();
		assert_eq!(captures, 1);
	}

	#[tokio::test]
	async fn full_refund_retry_returns_the_prior_result() {
		let mock = MockGateway::new();
		let engine = engine_with(mock.clone());
		let order = engine.orders().create_order(new_order_request()).await.unwrap();
		engine
			.settlement()
			.authorize(
				&order.id,
				AuthorizeRequest {
					amount: dec!(500),
					card: test_card(),
				},
			)
			.await
			.unwrap();
		engine
			.settlement()
			.charge(&order.id, charge_request(dec!(500), "req-1"))
			.await
			.unwrap();

		let first = engine
			.settlement()
			.refund(&order.id, refund_request(dec!(500), "rfd-1"))
			.await
			.unwrap();
		assert_eq!(first.refunded_amount, dec!(500));
		assert_eq!(first.max_refundable, dec!(0));

		// The budget is spent, but an identical retry replays the stored
		// result instead of tripping the fully-refunded invariant.
		let retry = engine
			.settlement()
			.refund(&order.id, refund_request(dec!(500), "rfd-1"))
			.await
			.unwrap();
		assert_eq!(first.entry.id, retry.entry.id);

		let stored = engine.orders().get_order(&order.id).await.unwrap();
		let refunds = stored
			.payment
			.ledger
			.iter()
			.filter(|entry| entry.kind == LedgerEntryKind::Refund)
			.count();
		assert_eq!(refunds, 1);

		let refund_calls = mock
			.calls()
			.iter()
			.filter(|call| matches!(call, MockCall::Refund { .. }))
			.count();
		assert_eq!(refund_calls, 1);
	}

	#[tokio::test]
	async fn charge_retry_replays_after_cancellation() {
		let mock = MockGateway::new();
		let engine = engine_with(mock.clone());
		let order = engine.orders().create_order(new_order_request()).await.unwrap();
		engine
			.settlement()
			.authorize(
				&order.id,
				AuthorizeRequest {
					amount: dec!(500),
					card: test_card(),
				},
			)
			.await
			.unwrap();
		let first = engine
			.settlement()
			.charge(&order.id, charge_request(dec!(500), "req-1"))
			.await
			.unwrap();

		engine
			.orders()
			.cancel(
				&order.id,
				"customer withdrew the order".to_string(),
				Actor::Admin("dana".to_string()),
			)
			.await
			.unwrap();

		// The order moved on, but the retry of an already-applied charge
		// still replays its stored outcome.
		let retry = engine
			.settlement()
			.charge(&order.id, charge_request(dec!(500), "req-1"))
			.await
			.unwrap();
		assert_eq!(first.entry.id, retry.entry.id);

		let captures = mock
			.calls()
			.iter()
			.filter(|call| matches!(call, MockCall::Capture { .. }))
			.count();
		assert_eq!(captures, 1);
	}

	#[tokio::test]
	async fn concurrent_refunds_racing_one_budget_admit_exactly_one() {
		let engine = engine_with(MockGateway::new());
		let order = engine.orders().create_order(new_order_request()).await.unwrap();
		engine
			.settlement()
			.authorize(
				&order.id,
				AuthorizeRequest {
					amount: dec!(500),
					card: test_card(),
				},
			)
			.await
			.unwrap();
		engine
			.settlement()
			.charge(&order.id, charge_request(dec!(500), "req-1"))
			.await
			.unwrap();

		// 500 charged; two 300 refunds race a budget that admits only one.
		let mut handles = Vec::new();
		for request_id in ["rfd-a", "rfd-b"] {
			let engine = engine.clone();
			let order_id = order.id.clone();
			let request = refund_request(dec!(300), request_id);
			handles.push(tokio::spawn(async move {
				engine.settlement().refund(&order_id, request).await
			}));
		}

		let mut ok = 0;
		for handle in handles {
			match handle.await.unwrap() {
				Ok(_) => ok += 1,
				Err(e) => assert!(matches!(e, EngineError::Invariant(_))),
			}
		}
		assert_eq!(ok, 1);

		let stored = engine.orders().get_order(&order.id).await.unwrap();
		assert_eq!(stored.payment.refunded_amount, dec!(300));
		let succeeded_refunds = stored
			.payment
			.ledger
			.iter()
			.filter(|entry| {
				entry.kind == LedgerEntryKind::Refund
					&& entry.outcome == LedgerOutcome::Succeeded
			})
			.count();
		assert_eq!(succeeded_refunds, 1);
	}

	#[tokio::test]
	async fn concurrent_status_changes_apply_exactly_once() {
		let engine = engine_with(MockGateway::new());
		let order = engine.orders().create_order(new_order_request()).await.unwrap();

		let mut handles = Vec::new();
		for _ in 0..2 {
			let engine = engine.clone();
			let order_id = order.id.clone();
			handles.push(tokio::spawn(async move {
				engine
					.orders()
					.set_status(
						&order_id,
						OrderStatus::PaymentHold,
						Actor::Admin("dana".to_string()),
						None,
						false,
					)
					.await
			}));
		}

		let mut ok = 0;
		for handle in handles {
			if handle.await.unwrap().is_ok() {
				ok += 1;
			}
		}
		assert_eq!(ok, 1);

		let stored = engine.orders().get_order(&order.id).await.unwrap();
		assert_eq!(stored.status, OrderStatus::PaymentHold);
		assert_eq!(stored.timeline.len(), 1);
	}

	#[tokio::test]
	async fn advancer_ignores_locked_orders_until_unlock() {
		let engine = engine_with(MockGateway::new());
		let order = engine.orders().create_order(new_order_request()).await.unwrap();
		engine
			.settlement()
			.authorize(
				&order.id,
				AuthorizeRequest {
					amount: dec!(500),
					card: test_card(),
				},
			)
			.await
			.unwrap();

		engine
			.orders()
			.lock_override(
				&order.id,
				OrderStatus::Pending,
				"held pending fraud review".to_string(),
				"dana",
			)
			.await
			.unwrap();
		assert_eq!(engine.advancer.sweep().await.unwrap(), 0);
		let stored = engine.orders().get_order(&order.id).await.unwrap();
		assert_eq!(stored.status, OrderStatus::Pending);

		engine.orders().unlock_override(&order.id, "dana").await.unwrap();
		assert_eq!(engine.advancer.sweep().await.unwrap(), 1);
		let stored = engine.orders().get_order(&order.id).await.unwrap();
		assert_eq!(stored.status, OrderStatus::PaymentHold);

		// Re-running with unchanged inputs applies nothing.
		assert_eq!(engine.advancer.sweep().await.unwrap(), 0);
	}

	#[tokio::test]
	async fn hold_verified_notification_is_applied_once() {
		let engine = engine_with(MockGateway::new());
		let order = engine.orders().create_order(new_order_request()).await.unwrap();
		let payment = engine
			.settlement()
			.authorize(
				&order.id,
				AuthorizeRequest {
					amount: dec!(500),
					card: test_card(),
				},
			)
			.await
			.unwrap();

		let notification = GatewayNotification {
			event_id: "evt-1".to_string(),
			gateway_reference: payment.gateway_reference.unwrap(),
			kind: GatewayNotificationKind::HoldVerified,
			reason: None,
		};
		engine
			.settlement()
			.handle_notification(notification.clone())
			.await
			.unwrap();
		// Redelivery of the same event id is absorbed.
		engine.settlement().handle_notification(notification).await.unwrap();

		let stored = engine.orders().get_order(&order.id).await.unwrap();
		assert_eq!(stored.payment.status, PaymentStatus::ReadyToCharge);
	}

	#[tokio::test]
	async fn reconcile_settles_indeterminate_entries() {
		let mock = MockGateway::new();
		let engine = engine_with(mock.clone());
		let order = engine.orders().create_order(new_order_request()).await.unwrap();

		// A capture whose response never arrived: no gateway reference,
		// only the client request id to look it up by.
		engine
			.state_machine
			.update_order_with(&order.id, |o| {
				o.payment.ledger.push(LedgerEntry {
					id: "entry-1".to_string(),
					kind: LedgerEntryKind::Charge,
					amount: dec!(500),
					funding: Some(ChargeFunding::Existing),
					reason: "customer confirmed the order".to_string(),
					performed_by: Actor::Admin("dana".to_string()),
					at: chrono::Utc::now(),
					gateway_reference: None,
					outcome: LedgerOutcome::Indeterminate,
					client_request_id: Some("req-77".to_string()),
				});
			})
			.await
			.unwrap();
		mock.seed_transaction("req-77", TransactionState::Settled);

		assert_eq!(engine.settlement().reconcile_sweep().await.unwrap(), 1);

		let stored = engine.orders().get_order(&order.id).await.unwrap();
		assert_eq!(stored.payment.ledger[0].outcome, LedgerOutcome::Succeeded);
		assert_eq!(stored.payment.charged_amount, dec!(500));
		assert_eq!(stored.payment.status, PaymentStatus::Charged);
	}

	#[tokio::test]
	async fn timed_out_authorization_blocks_a_retry() {
		let mock = MockGateway::with_delay(Duration::from_millis(100));
		let engine = engine_with_deadline(mock.clone(), Duration::from_millis(10));
		let order = engine.orders().create_order(new_order_request()).await.unwrap();

		let first = engine
			.settlement()
			.authorize(
				&order.id,
				AuthorizeRequest {
					amount: dec!(500),
					card: test_card(),
				},
			)
			.await;
		assert!(matches!(first, Err(EngineError::Gateway(_))));

		// The attempt lands on the ledger keyed by the order id, so the
		// reconciliation sweep can query the provider for it.
		let stored = engine.orders().get_order(&order.id).await.unwrap();
		assert_eq!(stored.payment.ledger.len(), 1);
		assert_eq!(stored.payment.ledger[0].kind, LedgerEntryKind::Hold);
		assert_eq!(stored.payment.ledger[0].outcome, LedgerOutcome::Indeterminate);
		assert_eq!(
			stored.payment.ledger[0].client_request_id.as_deref(),
			Some(order.id.as_str())
		);

		// The provider may have placed the hold; a retry before
		// reconciliation would risk double-holding the customer's funds.
		let retry = engine
			.settlement()
			.authorize(
				&order.id,
				AuthorizeRequest {
					amount: dec!(500),
					card: test_card(),
				},
			)
			.await;
		assert!(matches!(retry, Err(EngineError::Invariant(_))));

		let hold_attempts = mock
			.calls()
			.iter()
			.filter(|call| matches!(call, MockCall::Authorize { .. }))
			.count();
		assert_eq!(hold_attempts, 1);
	}

	#[tokio::test]
	async fn reconcile_settles_a_pending_hold_and_restores_idempotency() {
		let mock = MockGateway::new();
		let engine = engine_with(mock.clone());
		let order = engine.orders().create_order(new_order_request()).await.unwrap();

		// An authorization whose call timed out before a reference arrived.
		let order_id = order.id.clone();
		engine
			.state_machine
			.update_order_with(&order.id, move |o| {
				o.payment.ledger.push(LedgerEntry {
					id: "entry-1".to_string(),
					kind: LedgerEntryKind::Hold,
					amount: dec!(500),
					funding: None,
					reason: "gateway call timed out after 10ms".to_string(),
					performed_by: Actor::Gateway,
					at: chrono::Utc::now(),
					gateway_reference: None,
					outcome: LedgerOutcome::Indeterminate,
					client_request_id: Some(order_id),
				});
			})
			.await
			.unwrap();
		mock.seed_transaction(&order.id, TransactionState::Settled);

		assert_eq!(engine.settlement().reconcile_sweep().await.unwrap(), 1);

		let stored = engine.orders().get_order(&order.id).await.unwrap();
		assert_eq!(stored.payment.ledger[0].outcome, LedgerOutcome::Succeeded);
		assert_eq!(stored.payment.status, PaymentStatus::Hold);
		assert_eq!(stored.payment.authorization_amount, dec!(500));

		// The hold now counts as the existing authorization: a retry returns
		// it without another provider call.
		let payment = engine
			.settlement()
			.authorize(
				&order.id,
				AuthorizeRequest {
					amount: dec!(500),
					card: test_card(),
				},
			)
			.await
			.unwrap();
		assert_eq!(payment.authorization_amount, dec!(500));
		let hold_attempts = mock
			.calls()
			.iter()
			.filter(|call| matches!(call, MockCall::Authorize { .. }))
			.count();
		assert_eq!(hold_attempts, 0);
	}

	#[tokio::test]
	async fn cancelled_orders_reject_charges_but_allow_refunds() {
		let engine = engine_with(MockGateway::new());
		let order = engine.orders().create_order(new_order_request()).await.unwrap();
		engine
			.settlement()
			.authorize(
				&order.id,
				AuthorizeRequest {
					amount: dec!(500),
					card: test_card(),
				},
			)
			.await
			.unwrap();
		engine
			.settlement()
			.charge(&order.id, charge_request(dec!(500), "req-1"))
			.await
			.unwrap();

		engine
			.orders()
			.cancel(
				&order.id,
				"customer withdrew the order".to_string(),
				Actor::Admin("dana".to_string()),
			)
			.await
			.unwrap();

		let charge = engine
			.settlement()
			.charge(&order.id, charge_request(dec!(100), "req-2"))
			.await;
		assert!(matches!(charge, Err(EngineError::Invariant(_))));

		let refund = engine
			.settlement()
			.refund(&order.id, refund_request(dec!(500), "req-3"))
			.await
			.unwrap();
		assert_eq!(refund.refunded_amount, dec!(500));
		assert_eq!(refund.max_refundable, dec!(0));
	}

	#[tokio::test]
	async fn declined_charge_lands_on_the_ledger_as_failure() {
		let engine = engine_with(MockGateway::declining());
		let order = engine.orders().create_order(new_order_request()).await.unwrap();

		// Authorization itself declines too; seed the payment record by
		// charging against a fresh card instead.
		let result = engine
			.settlement()
			.charge(
				&order.id,
				ChargeRequest {
					amount: dec!(500),
					mode: ChargeFunding::NewCard,
					card: Some(test_card()),
					reason: "customer confirmed the order".to_string(),
					actor: "dana".to_string(),
					client_request_id: "req-1".to_string(),
				},
			)
			.await;
		assert!(matches!(result, Err(EngineError::Gateway(_))));

		let stored = engine.orders().get_order(&order.id).await.unwrap();
		assert_eq!(stored.payment.status, PaymentStatus::Failed);
		assert_eq!(stored.payment.ledger.len(), 1);
		assert_eq!(stored.payment.ledger[0].kind, LedgerEntryKind::Failure);
		assert_eq!(stored.payment.ledger[0].outcome, LedgerOutcome::Failed);
		assert_eq!(stored.payment.charged_amount, dec!(0));
	}
}
