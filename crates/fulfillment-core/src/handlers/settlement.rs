//! Payment settlement handler.
//!
//! Owns the append-only ledger: authorization holds, captures, refunds,
//! gateway notification ingestion, and the reconciliation sweep that
//! resolves indeterminate outcomes. Gateway calls run inside the order's
//! critical section with a bounded deadline; a deadline miss is recorded
//! as an indeterminate ledger entry, never silently dropped, and later
//! settled by reconciliation.
//!
//! Charge and refund are idempotent under retry keyed by
//! `(order_id, operation, client_request_id)`: a retried identical request
//! returns the prior ledger entry without a second gateway call.

use crate::engine::event_bus::EventBus;
use crate::locks::OrderLocks;
use crate::state::OrderStateMachine;
use crate::EngineError;
use chrono::Utc;
use fulfillment_config::EngineConfig;
use fulfillment_gateway::{GatewayError, GatewayService, Instrument, TransactionState};
use fulfillment_storage::StorageService;
use fulfillment_types::{
	truncate_id, Actor, AuthorizeRequest, ChargeFunding, ChargeRequest, FulfillmentEvent,
	GatewayNotification, GatewayNotificationKind, LedgerEntry, LedgerEntryKind, LedgerOutcome,
	Order, OrderStatus, PaymentEvent, PaymentRecord, PaymentStatus, RefundEligibility,
	RefundRequest, SettlementResponse, StorageKey,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;

/// Shared refund-eligibility logic.
///
/// Used by both the read-side `can_refund` projection and the mutating
/// refund path, so the two can never disagree.
pub fn refund_eligibility(payment: &PaymentRecord) -> RefundEligibility {
	let max_refundable = payment.max_refundable();
	let (eligible, reason) = if payment.charged_amount.is_zero() {
		(false, Some("nothing has been charged".to_string()))
	} else if max_refundable.is_zero() {
		(false, Some("the charged amount is fully refunded".to_string()))
	} else {
		(true, None)
	};
	RefundEligibility {
		eligible,
		reason,
		max_refundable,
		charged_amount: payment.charged_amount,
		refunded_amount: payment.refunded_amount,
	}
}

/// Handler for settlement-ledger commands and gateway notifications.
pub struct SettlementHandler {
	state_machine: Arc<OrderStateMachine>,
	storage: Arc<StorageService>,
	gateway: Arc<GatewayService>,
	locks: Arc<OrderLocks>,
	event_bus: EventBus,
	policy: EngineConfig,
}

impl SettlementHandler {
	pub fn new(
		state_machine: Arc<OrderStateMachine>,
		storage: Arc<StorageService>,
		gateway: Arc<GatewayService>,
		locks: Arc<OrderLocks>,
		event_bus: EventBus,
		policy: EngineConfig,
	) -> Self {
		Self {
			state_machine,
			storage,
			gateway,
			locks,
			event_bus,
			policy,
		}
	}

	fn idempotency_ttl(&self) -> Duration {
		Duration::from_secs(self.policy.idempotency_ttl_seconds)
	}

	fn validate_reason(&self, reason: &str) -> Result<(), EngineError> {
		if reason.trim().len() < self.policy.min_reason_length {
			return Err(EngineError::Validation(format!(
				"reason must be at least {} characters",
				self.policy.min_reason_length
			)));
		}
		Ok(())
	}

	fn idempotency_id(order_id: &str, operation: &str, client_request_id: &str) -> String {
		format!("{}:{}:{}", order_id, operation, client_request_id)
	}

	async fn stored_result(
		&self,
		order_id: &str,
		operation: &str,
		client_request_id: &str,
	) -> Result<Option<LedgerEntry>, EngineError> {
		let id = Self::idempotency_id(order_id, operation, client_request_id);
		match self
			.storage
			.retrieve::<LedgerEntry>(StorageKey::Idempotency.as_str(), &id)
			.await
		{
			Ok(entry) => Ok(Some(entry)),
			Err(fulfillment_storage::StorageError::NotFound) => Ok(None),
			Err(e) => Err(EngineError::Storage(e.to_string())),
		}
	}

	async fn remember_result(
		&self,
		order_id: &str,
		operation: &str,
		client_request_id: &str,
		entry: &LedgerEntry,
	) -> Result<(), EngineError> {
		let id = Self::idempotency_id(order_id, operation, client_request_id);
		self.storage
			.store_with_ttl(
				StorageKey::Idempotency.as_str(),
				&id,
				entry,
				Some(self.idempotency_ttl()),
			)
			.await
			.map_err(|e| EngineError::Storage(e.to_string()))
	}

	async fn remember_gateway_reference(
		&self,
		reference: &str,
		order_id: &str,
	) -> Result<(), EngineError> {
		self.storage
			.store(
				StorageKey::OrderByGatewayRef.as_str(),
				reference,
				&order_id.to_string(),
			)
			.await
			.map_err(|e| EngineError::Storage(e.to_string()))
	}

	/// Appends a ledger entry, recomputes the cached amounts, and persists.
	async fn append_entry(
		&self,
		order_id: &str,
		entry: LedgerEntry,
		payment_status: Option<PaymentStatus>,
		gateway_reference: Option<String>,
	) -> Result<Order, EngineError> {
		let event = FulfillmentEvent::Payment(PaymentEvent::LedgerAppended {
			order_id: order_id.to_string(),
			entry_id: entry.id.clone(),
			kind: entry.kind,
			amount: entry.amount,
			outcome: entry.outcome,
		});
		let updated = self
			.state_machine
			.update_order_with(order_id, move |o| {
				o.payment.ledger.push(entry);
				o.payment.recompute_from_ledger();
				if let Some(status) = payment_status {
					o.payment.status = status;
				}
				if let Some(reference) = gateway_reference {
					o.payment.gateway_reference = Some(reference);
				}
			})
			.await?;
		self.event_bus.publish(event).ok();
		Ok(updated)
	}

	fn settlement_response(order: &Order, entry: LedgerEntry) -> SettlementResponse {
		SettlementResponse {
			entry,
			payment_status: order.payment.status,
			charged_amount: order.payment.charged_amount,
			refunded_amount: order.payment.refunded_amount,
			max_refundable: order.payment.max_refundable(),
		}
	}

	/// Places the checkout authorization hold. Idempotent by order id: a
	/// retried call returns the existing record instead of double-holding.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn authorize(
		&self,
		order_id: &str,
		request: AuthorizeRequest,
	) -> Result<PaymentRecord, EngineError> {
		if request.amount <= Decimal::ZERO {
			return Err(EngineError::Validation(
				"authorization amount must be positive".to_string(),
			));
		}
		request.card.validate().map_err(EngineError::Validation)?;

		let mutex = self.locks.for_order(order_id);
		let _guard = mutex.lock().await;

		let order = self.state_machine.get_order(order_id).await?;
		if order.payment.has_authorization() {
			return Ok(order.payment);
		}
		if order.payment.has_pending_hold() {
			return Err(EngineError::Invariant(
				"an earlier authorization attempt is awaiting reconciliation".to_string(),
			));
		}
		if order.status == OrderStatus::Cancelled {
			return Err(EngineError::Invariant(format!(
				"order '{}' is cancelled",
				order_id
			)));
		}

		// Authorize is keyed by order id, so the order id doubles as the
		// request id the provider can be queried by during reconciliation.
		match self.gateway.authorize(request.amount, &request.card).await {
			Ok(reference) => {
				let entry = LedgerEntry {
					id: Uuid::new_v4().to_string(),
					kind: LedgerEntryKind::Hold,
					amount: request.amount,
					funding: None,
					reason: "checkout authorization".to_string(),
					performed_by: Actor::Gateway,
					at: Utc::now(),
					gateway_reference: Some(reference.clone()),
					outcome: LedgerOutcome::Succeeded,
					client_request_id: Some(order_id.to_string()),
				};
				self.remember_gateway_reference(&reference, order_id).await?;
				let updated = self
					.append_entry(
						order_id,
						entry,
						Some(PaymentStatus::Hold),
						Some(reference),
					)
					.await?;
				tracing::info!(amount = %request.amount, "Authorization hold placed");
				Ok(updated.payment)
			},
			Err(GatewayError::Declined(message)) => {
				let entry = LedgerEntry {
					id: Uuid::new_v4().to_string(),
					kind: LedgerEntryKind::Failure,
					amount: request.amount,
					funding: None,
					reason: message.clone(),
					performed_by: Actor::Gateway,
					at: Utc::now(),
					gateway_reference: None,
					outcome: LedgerOutcome::Failed,
					client_request_id: Some(order_id.to_string()),
				};
				self.append_entry(order_id, entry, Some(PaymentStatus::Failed), None)
					.await?;
				Err(EngineError::Gateway(format!(
					"authorization declined: {}",
					message
				)))
			},
			Err(e) => {
				let entry = LedgerEntry {
					id: Uuid::new_v4().to_string(),
					kind: LedgerEntryKind::Hold,
					amount: request.amount,
					funding: None,
					reason: e.to_string(),
					performed_by: Actor::Gateway,
					at: Utc::now(),
					gateway_reference: None,
					outcome: LedgerOutcome::Indeterminate,
					client_request_id: Some(order_id.to_string()),
				};
				self.append_entry(order_id, entry, None, None).await?;
				Err(EngineError::Gateway(format!(
					"authorization outcome unknown: {}",
					e
				)))
			},
		}
	}

	/// Captures funds against the existing hold or a freshly supplied card.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn charge(
		&self,
		order_id: &str,
		request: ChargeRequest,
	) -> Result<SettlementResponse, EngineError> {
		if request.amount <= Decimal::ZERO {
			return Err(EngineError::Validation(
				"charge amount must be positive".to_string(),
			));
		}
		self.validate_reason(&request.reason)?;
		if request.client_request_id.trim().is_empty() {
			return Err(EngineError::Validation(
				"client request id is required".to_string(),
			));
		}
		if request.mode == ChargeFunding::NewCard {
			let card = request.card.as_ref().ok_or_else(|| {
				EngineError::Validation("new-card charges need card details".to_string())
			})?;
			card.validate().map_err(EngineError::Validation)?;
		}

		let mutex = self.locks.for_order(order_id);
		let _guard = mutex.lock().await;

		let order = self.state_machine.get_order(order_id).await?;

		// Retried identical request: return the prior result, no second
		// gateway call. Checked before any invariant so a retry still
		// replays after the order state moved on (say, a cancellation).
		if let Some(prior) = self
			.stored_result(order_id, "charge", &request.client_request_id)
			.await?
		{
			return Ok(Self::settlement_response(&order, prior));
		}

		if order.status == OrderStatus::Cancelled {
			return Err(EngineError::Invariant(format!(
				"order '{}' is cancelled and accepts no charges",
				order_id
			)));
		}

		let instrument = match request.mode {
			ChargeFunding::Existing => {
				let reference = order.payment.gateway_reference.clone().ok_or_else(|| {
					EngineError::Invariant(
						"no live gateway reference; charge with a new card".to_string(),
					)
				})?;
				Instrument::ExistingReference(reference)
			},
			ChargeFunding::NewCard => {
				let card = request.card.clone().ok_or_else(|| {
					EngineError::Validation("new-card charges need card details".to_string())
				})?;
				Instrument::Card(card)
			},
		};

		let actor = Actor::Admin(request.actor.clone());
		match self.gateway.capture(request.amount, &instrument).await {
			Ok(reference) => {
				let entry = LedgerEntry {
					id: Uuid::new_v4().to_string(),
					kind: LedgerEntryKind::Charge,
					amount: request.amount,
					funding: Some(request.mode),
					reason: request.reason.clone(),
					performed_by: actor,
					at: Utc::now(),
					gateway_reference: Some(reference.clone()),
					outcome: LedgerOutcome::Succeeded,
					client_request_id: Some(request.client_request_id.clone()),
				};
				self.remember_gateway_reference(&reference, order_id).await?;
				self.remember_result(order_id, "charge", &request.client_request_id, &entry)
					.await?;
				let updated = self
					.append_entry(
						order_id,
						entry.clone(),
						Some(PaymentStatus::Charged),
						Some(reference),
					)
					.await?;
				tracing::info!(amount = %request.amount, "Charge captured");
				Ok(Self::settlement_response(&updated, entry))
			},
			Err(GatewayError::Declined(message)) | Err(GatewayError::UnknownReference(message)) => {
				let entry = LedgerEntry {
					id: Uuid::new_v4().to_string(),
					kind: LedgerEntryKind::Failure,
					amount: request.amount,
					funding: Some(request.mode),
					reason: message.clone(),
					performed_by: actor,
					at: Utc::now(),
					gateway_reference: None,
					outcome: LedgerOutcome::Failed,
					client_request_id: Some(request.client_request_id.clone()),
				};
				self.remember_result(order_id, "charge", &request.client_request_id, &entry)
					.await?;
				self.append_entry(order_id, entry, Some(PaymentStatus::Failed), None)
					.await?;
				tracing::warn!(amount = %request.amount, reason = %message, "Charge declined");
				Err(EngineError::Gateway(format!(
					"charge declined: {}",
					message
				)))
			},
			Err(e) => {
				// Timeout or transport failure: the money may or may not
				// have moved. Record the attempt as indeterminate and let
				// the reconciliation sweep settle it.
				let entry = LedgerEntry {
					id: Uuid::new_v4().to_string(),
					kind: LedgerEntryKind::Charge,
					amount: request.amount,
					funding: Some(request.mode),
					reason: request.reason.clone(),
					performed_by: actor,
					at: Utc::now(),
					gateway_reference: None,
					outcome: LedgerOutcome::Indeterminate,
					client_request_id: Some(request.client_request_id.clone()),
				};
				self.remember_result(order_id, "charge", &request.client_request_id, &entry)
					.await?;
				self.append_entry(order_id, entry, None, None).await?;
				tracing::warn!(amount = %request.amount, error = %e, "Charge outcome unknown");
				Err(EngineError::Gateway(format!(
					"charge outcome unknown, pending reconciliation: {}",
					e
				)))
			},
		}
	}

	/// Read-side refund eligibility projection.
	pub async fn can_refund(&self, order_id: &str) -> Result<RefundEligibility, EngineError> {
		let order = self.state_machine.get_order(order_id).await?;
		Ok(refund_eligibility(&order.payment))
	}

	/// Refunds part or all of the captured amount. Permitted on cancelled
	/// and delivered orders; the max-refundable budget is read inside the
	/// critical section, never from a stale cache.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn refund(
		&self,
		order_id: &str,
		request: RefundRequest,
	) -> Result<SettlementResponse, EngineError> {
		if request.amount <= Decimal::ZERO {
			return Err(EngineError::Validation(
				"refund amount must be positive".to_string(),
			));
		}
		self.validate_reason(&request.reason)?;
		if request.client_request_id.trim().is_empty() {
			return Err(EngineError::Validation(
				"client request id is required".to_string(),
			));
		}
		if let Some(card) = &request.card_verification {
			card.validate().map_err(EngineError::Validation)?;
		}

		let mutex = self.locks.for_order(order_id);
		let _guard = mutex.lock().await;

		let order = self.state_machine.get_order(order_id).await?;

		// Retried identical request: return the prior result, no second
		// gateway call. Checked before the budget so a retry of a refund
		// that already consumed the budget replays instead of erroring.
		if let Some(prior) = self
			.stored_result(order_id, "refund", &request.client_request_id)
			.await?
		{
			return Ok(Self::settlement_response(&order, prior));
		}

		let eligibility = refund_eligibility(&order.payment);
		if !eligibility.eligible {
			return Err(EngineError::Invariant(
				eligibility
					.reason
					.unwrap_or_else(|| "refund not permitted".to_string()),
			));
		}
		if request.amount > eligibility.max_refundable {
			return Err(EngineError::Invariant(format!(
				"refund of {} exceeds the max refundable {}",
				request.amount, eligibility.max_refundable
			)));
		}

		// Refund against the most recent captured charge.
		let charge_reference = order
			.payment
			.ledger
			.iter()
			.rev()
			.find(|entry| {
				entry.kind == LedgerEntryKind::Charge
					&& entry.outcome == LedgerOutcome::Succeeded
					&& entry.gateway_reference.is_some()
			})
			.and_then(|entry| entry.gateway_reference.clone())
			.or_else(|| order.payment.gateway_reference.clone())
			.ok_or_else(|| {
				EngineError::Invariant("no gateway reference to refund against".to_string())
			})?;

		let actor = Actor::Admin(request.actor.clone());
		match self
			.gateway
			.refund(
				&charge_reference,
				request.amount,
				request.card_verification.as_ref(),
			)
			.await
		{
			Ok(reference) => {
				let entry = LedgerEntry {
					id: Uuid::new_v4().to_string(),
					kind: LedgerEntryKind::Refund,
					amount: request.amount,
					funding: None,
					reason: request.reason.clone(),
					performed_by: actor,
					at: Utc::now(),
					gateway_reference: Some(reference.clone()),
					outcome: LedgerOutcome::Succeeded,
					client_request_id: Some(request.client_request_id.clone()),
				};
				self.remember_gateway_reference(&reference, order_id).await?;
				self.remember_result(order_id, "refund", &request.client_request_id, &entry)
					.await?;
				let updated = self.append_entry(order_id, entry.clone(), None, None).await?;
				tracing::info!(amount = %request.amount, "Refund issued");
				Ok(Self::settlement_response(&updated, entry))
			},
			Err(GatewayError::Declined(message)) | Err(GatewayError::UnknownReference(message)) => {
				let entry = LedgerEntry {
					id: Uuid::new_v4().to_string(),
					kind: LedgerEntryKind::Failure,
					amount: request.amount,
					funding: None,
					reason: message.clone(),
					performed_by: actor,
					at: Utc::now(),
					gateway_reference: None,
					outcome: LedgerOutcome::Failed,
					client_request_id: Some(request.client_request_id.clone()),
				};
				self.remember_result(order_id, "refund", &request.client_request_id, &entry)
					.await?;
				self.append_entry(order_id, entry, None, None).await?;
				tracing::warn!(amount = %request.amount, reason = %message, "Refund declined");
				Err(EngineError::Gateway(format!(
					"refund declined: {}",
					message
				)))
			},
			Err(e) => {
				let entry = LedgerEntry {
					id: Uuid::new_v4().to_string(),
					kind: LedgerEntryKind::Refund,
					amount: request.amount,
					funding: None,
					reason: request.reason.clone(),
					performed_by: actor,
					at: Utc::now(),
					gateway_reference: None,
					outcome: LedgerOutcome::Indeterminate,
					client_request_id: Some(request.client_request_id.clone()),
				};
				self.remember_result(order_id, "refund", &request.client_request_id, &entry)
					.await?;
				self.append_entry(order_id, entry, None, None).await?;
				tracing::warn!(amount = %request.amount, error = %e, "Refund outcome unknown");
				Err(EngineError::Gateway(format!(
					"refund outcome unknown, pending reconciliation: {}",
					e
				)))
			},
		}
	}

	/// Applies an asynchronous gateway notification. At-least-once
	/// tolerant: duplicates (by gateway event id) are absorbed silently.
	#[instrument(skip_all, fields(event_id = %truncate_id(&notification.event_id)))]
	pub async fn handle_notification(
		&self,
		notification: GatewayNotification,
	) -> Result<(), EngineError> {
		let already_seen = self
			.storage
			.exists(
				StorageKey::GatewayEvents.as_str(),
				&notification.event_id,
			)
			.await
			.map_err(|e| EngineError::Storage(e.to_string()))?;
		if already_seen {
			tracing::debug!("Duplicate gateway notification absorbed");
			return Ok(());
		}

		let order_id: String = self
			.storage
			.retrieve(
				StorageKey::OrderByGatewayRef.as_str(),
				&notification.gateway_reference,
			)
			.await
			.map_err(|e| match e {
				fulfillment_storage::StorageError::NotFound => EngineError::NotFound(format!(
					"no order for gateway reference '{}'",
					notification.gateway_reference
				)),
				other => EngineError::Storage(other.to_string()),
			})?;

		let mutex = self.locks.for_order(&order_id);
		let _guard = mutex.lock().await;

		let reference = notification.gateway_reference.clone();
		let reason = notification.reason.clone();
		let kind = notification.kind;
		let order = self.state_machine.get_order(&order_id).await?;
		match kind {
			GatewayNotificationKind::HoldVerified => {
				if order.payment.status == PaymentStatus::Hold {
					self.state_machine
						.update_order_with(&order_id, |o| {
							o.payment.status = PaymentStatus::ReadyToCharge;
						})
						.await?;
				}
			},
			GatewayNotificationKind::HoldDeclined => {
				let entry = LedgerEntry {
					id: Uuid::new_v4().to_string(),
					kind: LedgerEntryKind::Failure,
					amount: order.payment.authorization_amount,
					funding: None,
					reason: reason.unwrap_or_else(|| "authorization hold declined".to_string()),
					performed_by: Actor::Gateway,
					at: Utc::now(),
					gateway_reference: Some(reference),
					outcome: LedgerOutcome::Failed,
					client_request_id: None,
				};
				self.append_entry(&order_id, entry, Some(PaymentStatus::Failed), None)
					.await?;
			},
			GatewayNotificationKind::ChargeConfirmed
			| GatewayNotificationKind::RefundConfirmed => {
				// Settles a matching indeterminate entry, if one exists.
				self.state_machine
					.update_order_with(&order_id, |o| {
						for entry in o.payment.ledger.iter_mut() {
							if entry.outcome == LedgerOutcome::Indeterminate
								&& entry.gateway_reference.as_deref() == Some(reference.as_str())
							{
								entry.outcome = LedgerOutcome::Succeeded;
							}
						}
						o.payment.recompute_from_ledger();
						if !o.payment.charged_amount.is_zero() {
							o.payment.status = PaymentStatus::Charged;
						}
					})
					.await?;
			},
		}

		self.storage
			.store_with_ttl(
				StorageKey::GatewayEvents.as_str(),
				&notification.event_id,
				&Utc::now(),
				Some(self.idempotency_ttl()),
			)
			.await
			.map_err(|e| EngineError::Storage(e.to_string()))?;

		self.event_bus
			.publish(FulfillmentEvent::Payment(PaymentEvent::NotificationApplied {
				order_id,
				event_id: notification.event_id,
				at: Utc::now(),
			}))
			.ok();
		Ok(())
	}

	/// Resolves indeterminate ledger entries by asking the gateway for the
	/// authoritative outcome. Returns the number of entries settled.
	///
	/// Entries whose original call timed out before a reference arrived are
	/// looked up by their client request id, which the provider indexes
	/// alongside its own references.
	pub async fn reconcile_sweep(&self) -> Result<usize, EngineError> {
		let orders = self.state_machine.list_orders().await?;
		let mut settled = 0;

		for order in orders {
			let has_indeterminate = order
				.payment
				.ledger
				.iter()
				.any(|entry| entry.outcome == LedgerOutcome::Indeterminate);
			if !has_indeterminate {
				continue;
			}

			let mutex = self.locks.for_order(&order.id);
			let _guard = mutex.lock().await;

			// Re-read inside the critical section.
			let fresh = self.state_machine.get_order(&order.id).await?;
			for entry in fresh
				.payment
				.ledger
				.iter()
				.filter(|entry| entry.outcome == LedgerOutcome::Indeterminate)
			{
				let lookup_key = entry
					.gateway_reference
					.clone()
					.or_else(|| entry.client_request_id.clone());
				let Some(lookup_key) = lookup_key else {
					continue;
				};

				let outcome = match self.gateway.query_transaction(&lookup_key).await {
					Ok(TransactionState::Settled) => LedgerOutcome::Succeeded,
					Ok(TransactionState::Failed) => LedgerOutcome::Failed,
					Ok(TransactionState::Pending) => continue,
					Err(GatewayError::UnknownReference(_)) => {
						// The provider never saw the call; it cannot settle.
						LedgerOutcome::Failed
					},
					Err(e) => {
						tracing::warn!(
							order_id = %truncate_id(&order.id),
							error = %e,
							"Reconciliation lookup failed"
						);
						continue;
					},
				};

				let entry_id = entry.id.clone();
				let entry_id_for_update = entry_id.clone();
				self.state_machine
					.update_order_with(&order.id, move |o| {
						let mut settled_hold = false;
						if let Some(target) = o
							.payment
							.ledger
							.iter_mut()
							.find(|candidate| candidate.id == entry_id_for_update)
						{
							target.outcome = outcome;
							settled_hold = target.kind == LedgerEntryKind::Hold;
						}
						o.payment.recompute_from_ledger();
						if !o.payment.charged_amount.is_zero() {
							o.payment.status = PaymentStatus::Charged;
						} else if outcome == LedgerOutcome::Succeeded
							&& settled_hold && o.payment.status == PaymentStatus::Pending
						{
							o.payment.status = PaymentStatus::Hold;
						} else if outcome == LedgerOutcome::Failed
							&& o.payment.status == PaymentStatus::Pending
						{
							o.payment.status = PaymentStatus::Failed;
						}
					})
					.await?;
				settled += 1;

				self.event_bus
					.publish(FulfillmentEvent::Payment(PaymentEvent::Reconciled {
						order_id: order.id.clone(),
						entry_id,
						outcome,
					}))
					.ok();
			}
		}

		if settled > 0 {
			tracing::info!(settled, "Reconciliation sweep settled entries");
		}
		Ok(settled)
	}
}
