use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{
        booking::{self, BookingStatus},
        payment::{self, PaymentStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{gateway::PaymentGateway, payments::PaymentResponse},
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ProcessRefundRequest {
    pub amount: Decimal,
    #[validate(length(min = 1, max = 500))]
    pub reason: Option<String>,
}

/// Validates refund eligibility, performs the gateway refund, and
/// updates payment and booking as one logical unit. Partial refunds
/// accumulate; the payment only flips to `refunded` once the full
/// amount has been returned.
#[derive(Clone)]
pub struct RefundService {
    db: Arc<DbPool>,
    gateway: Arc<dyn PaymentGateway>,
    event_sender: Option<Arc<EventSender>>,
}

impl RefundService {
    pub fn new(
        db: Arc<DbPool>,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            gateway,
            event_sender,
        }
    }

    #[instrument(skip(self, request), fields(payment_id = %payment_id, requested_by = %requested_by, amount = %request.amount))]
    pub async fn process_refund(
        &self,
        payment_id: Uuid,
        requested_by: Uuid,
        request: ProcessRefundRequest,
    ) -> Result<PaymentResponse, ServiceError> {
        request.validate()?;

        if request.amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "refund amount must be positive".into(),
            ));
        }

        let model = payment::Entity::find_by_id(payment_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Payment {} not found", payment_id)))?;

        if model.status != PaymentStatus::Success {
            return Err(ServiceError::NotRefundable(format!(
                "payment is '{}', only successful payments can be refunded",
                model.status
            )));
        }

        let remaining = model.remaining_refundable();
        if remaining <= Decimal::ZERO {
            return Err(ServiceError::NotRefundable(
                "payment has already been refunded in full".into(),
            ));
        }

        if request.amount > remaining {
            return Err(ServiceError::RefundExceedsPayment(format!(
                "{} exceeds refundable amount {}",
                request.amount, remaining
            )));
        }

        let gateway_payment_id = model.gateway_payment_id.clone().ok_or_else(|| {
            ServiceError::NotRefundable("payment has no gateway capture to refund".into())
        })?;

        // Stable across retries of the same logical refund: a retry
        // after a timeout whose underlying gateway call landed gets the
        // original refund id back instead of moving money again. A
        // subsequent distinct refund sees a different accumulated total
        // and therefore a fresh key.
        let idempotency_key = format!(
            "refund-{}-{}-{}",
            payment_id, model.refund_amount, request.amount
        );

        let refund = self
            .gateway
            .refund(&gateway_payment_id, request.amount, &idempotency_key)
            .await?;

        let now = Utc::now();
        let txn = self.db.begin().await?;

        // Re-read inside the transaction; if the gateway deduplicated a
        // retry, the returned refund id matches the one already stored
        // and the ledger is left untouched.
        let model = payment::Entity::find_by_id(payment_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Payment {} not found", payment_id)))?;

        if model.refund_transaction_id.as_deref() == Some(refund.refund_id.as_str()) {
            let response = PaymentResponse::from_model(model);
            txn.commit().await?;
            info!(payment_id = %payment_id, refund_id = %refund.refund_id, "refund already applied");
            return Ok(response);
        }

        let booking_id = model.booking_id;
        let payment_amount = model.amount;
        let new_refund_total = model.refund_amount + request.amount;
        let full = new_refund_total >= payment_amount;

        let mut active: payment::ActiveModel = model.into();
        active.is_refunded = Set(true);
        active.refund_amount = Set(new_refund_total);
        active.refund_transaction_id = Set(Some(refund.refund_id.clone()));
        active.refunded_at = Set(Some(now));
        active.refund_reason = Set(request.reason.clone());
        if full {
            active.status = Set(PaymentStatus::Refunded);
        }
        active.updated_at = Set(Some(now));
        let updated = active.update(&txn).await?;

        cancel_booking_for_refund(
            &txn,
            booking_id,
            requested_by,
            new_refund_total,
            request.reason.clone(),
        )
        .await?;

        txn.commit().await?;

        info!(
            payment_id = %payment_id,
            refund_id = %refund.refund_id,
            amount = %request.amount,
            full,
            "refund applied"
        );

        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender
                .send(Event::PaymentRefunded {
                    payment_id,
                    amount: request.amount,
                })
                .await
            {
                warn!(error = %e, payment_id = %payment_id, "failed to send refund event");
            }
        }

        Ok(PaymentResponse::from_model(updated))
    }
}

/// Moves the booking into the cancelled terminal state with the refund
/// recorded. Completed bookings keep their status; only the refund
/// amount is written back.
async fn cancel_booking_for_refund<C: sea_orm::ConnectionTrait>(
    conn: &C,
    booking_id: Uuid,
    cancelled_by: Uuid,
    refund_total: Decimal,
    reason: Option<String>,
) -> Result<(), ServiceError> {
    let Some(model) = booking::Entity::find_by_id(booking_id).one(conn).await? else {
        warn!(booking_id = %booking_id, "refunded payment references unknown booking");
        return Ok(());
    };

    let now = Utc::now();
    let version = model.version;
    let status = model.status;
    let mut active: booking::ActiveModel = model.into();

    if status != BookingStatus::Completed && status != BookingStatus::Cancelled {
        active.status = Set(BookingStatus::Cancelled);
        active.cancelled_by = Set(Some(cancelled_by));
        active.cancelled_at = Set(Some(now));
        active.cancellation_reason = Set(reason);
    }
    active.refund_amount = Set(Some(refund_total));
    active.updated_at = Set(Some(now));
    active.version = Set(version + 1);
    active.update(conn).await?;
    Ok(())
}
