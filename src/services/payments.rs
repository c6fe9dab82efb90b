use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthenticatedUser,
    db::{is_unique_violation, DbPool},
    entities::{
        booking::{self, BookingStatus},
        payment::{self, PaymentStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::gateway::{verify_checkout_signature, verify_webhook_signature, PaymentGateway},
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    pub booking_id: Uuid,
    pub amount: Decimal,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
}

fn default_payment_method() -> String {
    "gateway".to_string()
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub payment_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct VerifyPaymentRequest {
    #[validate(length(min = 1))]
    pub order_id: String,
    #[validate(length(min = 1))]
    pub payment_id: String,
    #[validate(length(min = 1))]
    pub signature: String,
    pub booking_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyPaymentResponse {
    pub payment_id: Uuid,
    pub transaction_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefundDetails {
    pub is_refunded: bool,
    pub refund_amount: Decimal,
    pub refund_transaction_id: Option<String>,
    pub refunded_at: Option<chrono::DateTime<Utc>>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub transaction_id: String,
    pub booking_id: Uuid,
    pub customer_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: String,
    pub gateway: String,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub status: PaymentStatus,
    pub refund: RefundDetails,
    pub created_at: chrono::DateTime<Utc>,
}

/// Signed webhook envelope delivered by the gateway. Amounts arrive in
/// minor units.
#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub id: Option<String>,
    pub event: String,
    pub payload: WebhookPayload,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub refund_id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Orchestrates gateway checkout: order creation, synchronous
/// verification, and asynchronous webhook reconciliation.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DbPool>,
    gateway: Arc<dyn PaymentGateway>,
    event_sender: Option<Arc<EventSender>>,
    currency: String,
    gateway_name: String,
    checkout_secret: String,
    webhook_secret: String,
}

impl PaymentService {
    pub fn new(
        db: Arc<DbPool>,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: Option<Arc<EventSender>>,
        currency: String,
        gateway_name: String,
        checkout_secret: String,
        webhook_secret: String,
    ) -> Self {
        Self {
            db,
            gateway,
            event_sender,
            currency,
            gateway_name,
            checkout_secret,
            webhook_secret,
        }
    }

    /// Opens a gateway order for a confirmed booking and records the
    /// payment attempt as `initiated`. The single-success guard runs
    /// again inside the insert transaction.
    #[instrument(skip(self, user), fields(booking_id = %request.booking_id, %request.amount))]
    pub async fn create_order(
        &self,
        user: &AuthenticatedUser,
        request: CreateOrderRequest,
    ) -> Result<CreateOrderResponse, ServiceError> {
        request.validate()?;

        let booking = booking::Entity::find_by_id(request.booking_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Booking {} not found", request.booking_id))
            })?;

        if !user.can_access_customer_record(booking.customer_id) {
            return Err(ServiceError::Forbidden(
                "payments can only be created for your own bookings".into(),
            ));
        }

        if booking.status != BookingStatus::Confirmed {
            return Err(ServiceError::StateConflict(format!(
                "booking must be confirmed before payment, current status is '{}'",
                booking.status
            )));
        }

        if request.amount != booking.total {
            return Err(ServiceError::ValidationError(format!(
                "amount {} does not match booking total {}",
                request.amount, booking.total
            )));
        }

        self.ensure_no_successful_payment(&*self.db, booking.id)
            .await?;

        let order = self
            .gateway
            .create_order(
                request.amount,
                &self.currency,
                &booking.booking_number,
                "DustClear booking payment",
            )
            .await?;

        let now = Utc::now();
        let payment_id = Uuid::new_v4();

        let txn = self.db.begin().await?;
        // Re-check inside the transaction that persists the attempt.
        self.ensure_no_successful_payment(&txn, booking.id).await?;

        let model = payment::ActiveModel {
            id: Set(payment_id),
            transaction_id: Set(generate_transaction_id()),
            booking_id: Set(booking.id),
            customer_id: Set(booking.customer_id),
            amount: Set(request.amount),
            currency: Set(self.currency.clone()),
            payment_method: Set(request.payment_method.clone()),
            gateway: Set(self.gateway_name.clone()),
            gateway_order_id: Set(Some(order.order_id.clone())),
            gateway_payment_id: Set(None),
            status: Set(PaymentStatus::Initiated),
            failure_reason: Set(None),
            is_refunded: Set(false),
            refund_amount: Set(Decimal::ZERO),
            refund_transaction_id: Set(None),
            refunded_at: Set(None),
            refund_reason: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };
        model.insert(&txn).await?;
        txn.commit().await?;

        info!(payment_id = %payment_id, order_id = %order.order_id, "gateway order opened");

        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(Event::PaymentInitiated(payment_id)).await {
                warn!(error = %e, payment_id = %payment_id, "failed to send payment initiated event");
            }
        }

        Ok(CreateOrderResponse {
            order_id: order.order_id,
            amount: request.amount,
            currency: self.currency.clone(),
            payment_id,
        })
    }

    /// Confirms a checkout by recomputing the HMAC over
    /// `order_id|payment_id`. A mismatch mutates nothing. On match the
    /// payment moves to `success` and the booking to `assigned` in one
    /// transaction; re-verification is a no-op.
    #[instrument(skip(self, user, request), fields(order_id = %request.order_id, booking_id = %request.booking_id))]
    pub async fn verify_payment(
        &self,
        user: &AuthenticatedUser,
        request: VerifyPaymentRequest,
    ) -> Result<VerifyPaymentResponse, ServiceError> {
        request.validate()?;

        if !verify_checkout_signature(
            &request.order_id,
            &request.payment_id,
            &request.signature,
            &self.checkout_secret,
        ) {
            warn!(order_id = %request.order_id, "checkout signature mismatch");
            return Err(ServiceError::SignatureVerificationFailed);
        }

        let txn = self.db.begin().await?;

        let model = payment::Entity::find()
            .filter(payment::Column::GatewayOrderId.eq(request.order_id.clone()))
            .filter(payment::Column::BookingId.eq(request.booking_id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "No payment found for order {}",
                    request.order_id
                ))
            })?;

        if !user.can_access_customer_record(model.customer_id) {
            return Err(ServiceError::Forbidden(
                "payments can only be verified by their owner".into(),
            ));
        }

        // Already reconciled (webhook may have arrived first).
        if model.status.rank() >= PaymentStatus::Success.rank() {
            let response = VerifyPaymentResponse {
                payment_id: model.id,
                transaction_id: model.transaction_id.clone(),
            };
            txn.commit().await?;
            return Ok(response);
        }

        // Another payment attempt for this booking may already hold
        // success; the guard runs in the same transaction as the
        // status write.
        self.ensure_no_successful_payment(&txn, model.booking_id)
            .await?;

        let payment_id = model.id;
        let transaction_id = model.transaction_id.clone();
        let booking_id = model.booking_id;
        let now = Utc::now();

        let mut active: payment::ActiveModel = model.into();
        active.status = Set(PaymentStatus::Success);
        active.gateway_payment_id = Set(Some(request.payment_id.clone()));
        active.updated_at = Set(Some(now));
        if let Err(e) = active.update(&txn).await {
            // The partial unique index caught a concurrent capture.
            if is_unique_violation(&e) {
                return Err(ServiceError::PaymentAlreadyCompleted(
                    booking_id.to_string(),
                ));
            }
            return Err(e.into());
        }

        attach_payment_to_booking(&txn, booking_id, payment_id).await?;

        txn.commit().await?;

        info!(payment_id = %payment_id, "payment verified and captured");

        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(Event::PaymentCaptured(payment_id)).await {
                warn!(error = %e, payment_id = %payment_id, "failed to send capture event");
            }
        }

        Ok(VerifyPaymentResponse {
            payment_id,
            transaction_id,
        })
    }

    /// Reconciles a signed gateway webhook. The signature covers the
    /// exact raw body; a mismatch rejects the delivery with no state
    /// change. Handlers are idempotent keyed on the gateway payment id
    /// and only move payment status forward in rank.
    #[instrument(skip_all)]
    pub async fn handle_webhook(
        &self,
        raw_body: &[u8],
        signature: &str,
    ) -> Result<(), ServiceError> {
        if !verify_webhook_signature(raw_body, signature, &self.webhook_secret) {
            warn!("webhook signature verification failed");
            return Err(ServiceError::SignatureVerificationFailed);
        }

        let envelope: WebhookEnvelope = serde_json::from_slice(raw_body)
            .map_err(|e| ServiceError::ValidationError(format!("invalid webhook body: {}", e)))?;

        match envelope.event.as_str() {
            "payment.captured" => self.apply_captured(&envelope.payload).await,
            "payment.failed" => self.apply_failed(&envelope.payload).await,
            "refund.processed" => self.apply_refund_processed(&envelope.payload).await,
            other => {
                info!(event = other, "ignoring unhandled webhook event type");
                Ok(())
            }
        }
    }

    async fn apply_captured(&self, payload: &WebhookPayload) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        let Some(model) = self.find_webhook_payment(&txn, payload).await? else {
            txn.commit().await?;
            return Ok(());
        };

        if model.status.rank() >= PaymentStatus::Success.rank() {
            // Redelivery or verify-then-webhook: nothing left to do.
            txn.commit().await?;
            return Ok(());
        }

        // The booking may already be paid through a different attempt.
        // Acknowledge without transitioning so the gateway stops
        // redelivering; this attempt stays where it is.
        match self
            .ensure_no_successful_payment(&txn, model.booking_id)
            .await
        {
            Ok(()) => {}
            Err(ServiceError::PaymentAlreadyCompleted(_)) => {
                warn!(
                    payment_id = %model.id,
                    booking_id = %model.booking_id,
                    "capture for a booking that already has a successful payment, acknowledging"
                );
                txn.commit().await?;
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        let payment_id = model.id;
        let booking_id = model.booking_id;
        let now = Utc::now();

        let mut active: payment::ActiveModel = model.into();
        active.status = Set(PaymentStatus::Success);
        if let Some(gateway_payment_id) = &payload.payment_id {
            active.gateway_payment_id = Set(Some(gateway_payment_id.clone()));
        }
        active.updated_at = Set(Some(now));
        if let Err(e) = active.update(&txn).await {
            if is_unique_violation(&e) {
                warn!(
                    payment_id = %payment_id,
                    booking_id = %booking_id,
                    "concurrent capture won for this booking, acknowledging"
                );
                return Ok(());
            }
            return Err(e.into());
        }

        attach_payment_to_booking(&txn, booking_id, payment_id).await?;
        txn.commit().await?;

        info!(payment_id = %payment_id, "payment captured via webhook");

        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(Event::PaymentCaptured(payment_id)).await {
                warn!(error = %e, payment_id = %payment_id, "failed to send capture event");
            }
        }
        Ok(())
    }

    async fn apply_failed(&self, payload: &WebhookPayload) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        let Some(model) = self.find_webhook_payment(&txn, payload).await? else {
            txn.commit().await?;
            return Ok(());
        };

        // A failure report never overrides a capture.
        if model.status.rank() >= PaymentStatus::Failed.rank() {
            txn.commit().await?;
            return Ok(());
        }

        let payment_id = model.id;
        let mut active: payment::ActiveModel = model.into();
        active.status = Set(PaymentStatus::Failed);
        active.failure_reason = Set(payload.reason.clone());
        active.updated_at = Set(Some(Utc::now()));
        active.update(&txn).await?;
        txn.commit().await?;

        info!(payment_id = %payment_id, "payment marked failed via webhook");

        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(Event::PaymentFailed(payment_id)).await {
                warn!(error = %e, payment_id = %payment_id, "failed to send failure event");
            }
        }
        Ok(())
    }

    async fn apply_refund_processed(&self, payload: &WebhookPayload) -> Result<(), ServiceError> {
        let Some(refund_id) = &payload.refund_id else {
            return Err(ServiceError::ValidationError(
                "refund.processed event is missing refund_id".into(),
            ));
        };

        let txn = self.db.begin().await?;
        let Some(model) = self.find_webhook_payment(&txn, payload).await? else {
            txn.commit().await?;
            return Ok(());
        };

        // Same refund delivered twice.
        if model.refund_transaction_id.as_deref() == Some(refund_id.as_str()) {
            txn.commit().await?;
            return Ok(());
        }

        let amount = payload
            .amount
            .map(|minor| Decimal::new(minor, 2))
            .unwrap_or(model.remaining_refundable());
        let applied = amount.min(model.remaining_refundable());
        let new_refund_total = model.refund_amount + applied;

        let payment_id = model.id;
        let full = new_refund_total >= model.amount;
        let now = Utc::now();

        let mut active: payment::ActiveModel = model.into();
        active.is_refunded = Set(true);
        active.refund_amount = Set(new_refund_total);
        active.refund_transaction_id = Set(Some(refund_id.clone()));
        active.refunded_at = Set(Some(now));
        active.refund_reason = Set(payload.reason.clone());
        if full {
            active.status = Set(PaymentStatus::Refunded);
        }
        active.updated_at = Set(Some(now));
        active.update(&txn).await?;
        txn.commit().await?;

        info!(payment_id = %payment_id, %applied, "refund reconciled via webhook");

        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender
                .send(Event::PaymentRefunded {
                    payment_id,
                    amount: applied,
                })
                .await
            {
                warn!(error = %e, payment_id = %payment_id, "failed to send refund event");
            }
        }
        Ok(())
    }

    async fn find_webhook_payment<C: sea_orm::ConnectionTrait>(
        &self,
        conn: &C,
        payload: &WebhookPayload,
    ) -> Result<Option<payment::Model>, ServiceError> {
        if payload.payment_id.is_none() && payload.order_id.is_none() {
            return Err(ServiceError::ValidationError(
                "webhook payload carries neither payment_id nor order_id".into(),
            ));
        }

        let mut condition = sea_orm::Condition::any();
        if let Some(gateway_payment_id) = &payload.payment_id {
            condition =
                condition.add(payment::Column::GatewayPaymentId.eq(gateway_payment_id.clone()));
        }
        if let Some(order_id) = &payload.order_id {
            condition = condition.add(payment::Column::GatewayOrderId.eq(order_id.clone()));
        }
        let query = payment::Entity::find().filter(condition);

        let model = query.one(conn).await?;
        if model.is_none() {
            warn!(
                payment_id = ?payload.payment_id,
                order_id = ?payload.order_id,
                "webhook references unknown payment, acknowledging"
            );
        }
        Ok(model)
    }

    async fn ensure_no_successful_payment<C: sea_orm::ConnectionTrait>(
        &self,
        conn: &C,
        booking_id: Uuid,
    ) -> Result<(), ServiceError> {
        let existing = payment::Entity::find()
            .filter(payment::Column::BookingId.eq(booking_id))
            .filter(payment::Column::Status.eq(PaymentStatus::Success))
            .one(conn)
            .await?;

        match existing {
            Some(_) => Err(ServiceError::PaymentAlreadyCompleted(booking_id.to_string())),
            None => Ok(()),
        }
    }

    #[instrument(skip(self, user), fields(payment_id = %payment_id))]
    pub async fn get_payment(
        &self,
        payment_id: Uuid,
        user: &AuthenticatedUser,
    ) -> Result<PaymentResponse, ServiceError> {
        let model = payment::Entity::find_by_id(payment_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Payment {} not found", payment_id)))?;

        if !user.can_access_customer_record(model.customer_id) {
            return Err(ServiceError::Forbidden("no access to this payment".into()));
        }

        Ok(PaymentResponse::from_model(model))
    }

    #[instrument(skip(self, user), fields(booking_id = %booking_id))]
    pub async fn list_payments_for_booking(
        &self,
        booking_id: Uuid,
        user: &AuthenticatedUser,
    ) -> Result<Vec<PaymentResponse>, ServiceError> {
        let booking = booking::Entity::find_by_id(booking_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", booking_id)))?;

        if !user.can_access_customer_record(booking.customer_id) {
            return Err(ServiceError::Forbidden("no access to this booking".into()));
        }

        let payments = payment::Entity::find()
            .filter(payment::Column::BookingId.eq(booking_id))
            .order_by_desc(payment::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(payments
            .into_iter()
            .map(PaymentResponse::from_model)
            .collect())
    }
}

/// Points the booking at its latest payment and advances confirmed
/// bookings to assigned on capture.
async fn attach_payment_to_booking<C: sea_orm::ConnectionTrait>(
    conn: &C,
    booking_id: Uuid,
    payment_id: Uuid,
) -> Result<(), ServiceError> {
    let Some(booking) = booking::Entity::find_by_id(booking_id).one(conn).await? else {
        warn!(booking_id = %booking_id, "payment captured for unknown booking");
        return Ok(());
    };

    let version = booking.version;
    let status = booking.status;
    let mut active: booking::ActiveModel = booking.into();
    active.payment_id = Set(Some(payment_id));
    if status == BookingStatus::Confirmed {
        active.status = Set(BookingStatus::Assigned);
    }
    active.updated_at = Set(Some(Utc::now()));
    active.version = Set(version + 1);
    active.update(conn).await?;
    Ok(())
}

/// `TXN` + millisecond timestamp + 6-char uppercase suffix.
pub fn generate_transaction_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect();
    format!("TXN{}{}", Utc::now().timestamp_millis(), suffix)
}

impl PaymentResponse {
    pub fn from_model(model: payment::Model) -> Self {
        Self {
            id: model.id,
            transaction_id: model.transaction_id,
            booking_id: model.booking_id,
            customer_id: model.customer_id,
            amount: model.amount,
            currency: model.currency,
            payment_method: model.payment_method,
            gateway: model.gateway,
            gateway_order_id: model.gateway_order_id,
            gateway_payment_id: model.gateway_payment_id,
            status: model.status,
            refund: RefundDetails {
                is_refunded: model.is_refunded,
                refund_amount: model.refund_amount,
                refund_transaction_id: model.refund_transaction_id,
                refunded_at: model.refunded_at,
                reason: model.refund_reason,
            },
            created_at: model.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_ids_carry_prefix_and_unique_suffix() {
        let a = generate_transaction_id();
        let b = generate_transaction_id();
        assert!(a.starts_with("TXN"));
        assert_eq!(a.len(), 3 + 13 + 6);
        assert_ne!(a, b);
        assert!(a[3..].chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(a.chars().filter(|c| c.is_ascii_alphabetic()).all(|c| c.is_ascii_uppercase()));
    }

    #[test]
    fn webhook_envelope_parses_gateway_shape() {
        let body = br#"{
            "id": "evt_01",
            "event": "payment.captured",
            "payload": {
                "order_id": "order_abc",
                "payment_id": "pay_xyz",
                "amount": 117882
            }
        }"#;
        let envelope: WebhookEnvelope = serde_json::from_slice(body).unwrap();
        assert_eq!(envelope.event, "payment.captured");
        assert_eq!(envelope.payload.payment_id.as_deref(), Some("pay_xyz"));
        assert_eq!(envelope.payload.amount, Some(117882));
        assert!(envelope.payload.refund_id.is_none());
    }

    #[test]
    fn minor_unit_amounts_convert_back_to_decimal() {
        assert_eq!(Decimal::new(117882, 2).to_string(), "1178.82");
    }
}
