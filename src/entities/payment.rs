use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Payment lifecycle. Transitions only move to a higher [`rank`]; webhook
/// redelivery and out-of-order arrival therefore degrade to no-ops.
///
/// [`rank`]: PaymentStatus::rank
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "initiated")]
    Initiated,
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "success")]
    Success,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "refunded")]
    Refunded,
}

impl PaymentStatus {
    /// Monotonic ordering for reconciliation: a status write is applied
    /// only when it strictly increases the rank. `failed` after `success`
    /// is ignored; `success` supersedes `failed`.
    pub fn rank(self) -> u8 {
        match self {
            PaymentStatus::Initiated => 0,
            PaymentStatus::Pending => 1,
            PaymentStatus::Failed | PaymentStatus::Cancelled => 2,
            PaymentStatus::Success => 3,
            PaymentStatus::Refunded => 4,
        }
    }
}

/// One attempt to collect money for a booking.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Internal reference: `TXN` + millisecond timestamp + random suffix.
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
    pub failure_reason: Option<String>,

    pub is_refunded: bool,
    /// Accumulated across partial refunds, never exceeding `amount`.
    pub refund_amount: Decimal,
    pub refund_transaction_id: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub refund_reason: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Portion of the captured amount still eligible for refund.
    pub fn remaining_refundable(&self) -> Decimal {
        (self.amount - self.refund_amount).max(Decimal::ZERO)
    }

    /// A payment blocks further checkout attempts while it holds
    /// `success`. A full refund moves it to `refunded`, reopening the
    /// booking for payment; a partial refund keeps it blocking.
    pub fn blocks_new_payment(&self) -> bool {
        self.status == PaymentStatus::Success
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::booking::Entity",
        from = "Column::BookingId",
        to = "super::booking::Column::Id"
    )]
    Booking,
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Booking.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rank_is_monotonic_over_the_reconciliation_order() {
        use PaymentStatus::*;
        assert!(Initiated.rank() < Pending.rank());
        assert!(Pending.rank() < Failed.rank());
        assert!(Failed.rank() < Success.rank());
        assert!(Success.rank() < Refunded.rank());
        assert_eq!(Failed.rank(), Cancelled.rank());
    }

    #[test]
    fn failed_never_outranks_success() {
        assert!(PaymentStatus::Failed.rank() < PaymentStatus::Success.rank());
    }

    #[test]
    fn remaining_refundable_accumulates() {
        let p = Model {
            id: Uuid::new_v4(),
            transaction_id: "TXN1700000000000AB12CD".into(),
            booking_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            amount: dec!(1178.82),
            currency: "INR".into(),
            payment_method: "upi".into(),
            gateway: "razorpay".into(),
            gateway_order_id: Some("order_123".into()),
            gateway_payment_id: Some("pay_123".into()),
            status: PaymentStatus::Success,
            failure_reason: None,
            is_refunded: true,
            refund_amount: dec!(500),
            refund_transaction_id: Some("rfnd_1".into()),
            refunded_at: None,
            refund_reason: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        assert_eq!(p.remaining_refundable(), dec!(678.82));
        // A partial refund leaves the payment in force.
        assert!(p.blocks_new_payment());
    }
}
