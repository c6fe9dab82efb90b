use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Lifecycle states of a booking. A refunded booking stays `Cancelled`;
/// the money trail lives on the payment's refund sub-record.
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
pub enum BookingStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "assigned")]
    Assigned,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl BookingStatus {
    /// Whether a transition from `self` to `to` is allowed. Same-state
    /// transitions are treated as no-ops by the service layer.
    pub fn can_transition_to(self, to: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, to),
            (Pending, Confirmed)
                | (Confirmed, Assigned)
                | (Assigned, InProgress)
                | (InProgress, Completed)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (Assigned, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

/// Fixed set of bookable visit windows.
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
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum TimeSlot {
    #[sea_orm(string_value = "08:00-10:00")]
    #[serde(rename = "08:00-10:00")]
    EightToTen,
    #[sea_orm(string_value = "10:00-12:00")]
    #[serde(rename = "10:00-12:00")]
    TenToTwelve,
    #[sea_orm(string_value = "12:00-14:00")]
    #[serde(rename = "12:00-14:00")]
    TwelveToFourteen,
    #[sea_orm(string_value = "14:00-16:00")]
    #[serde(rename = "14:00-16:00")]
    FourteenToSixteen,
    #[sea_orm(string_value = "16:00-18:00")]
    #[serde(rename = "16:00-18:00")]
    SixteenToEighteen,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Human-readable number: `DC` + YYYYMMDD + zero-padded daily sequence.
    #[validate(length(min = 1, max = 32))]
    pub booking_number: String,

    pub customer_id: Uuid,
    pub status: BookingStatus,

    pub service_address: String,
    pub scheduled_date: DateTime<Utc>,
    pub scheduled_time_slot: TimeSlot,
    pub special_instructions: Option<String>,

    pub subtotal: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub coupon_code: Option<String>,

    /// Most recent payment attempt for this booking.
    pub payment_id: Option<Uuid>,

    pub cancelled_by: Option<Uuid>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub refund_amount: Option<Decimal>,

    pub completed_at: Option<DateTime<Utc>>,
    pub completion_notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

/// Cancellation window: strictly more than 2 hours before the visit.
const CANCELLATION_WINDOW_HOURS: i64 = 2;
/// Reschedule window: strictly more than 4 hours before the visit.
const RESCHEDULE_WINDOW_HOURS: i64 = 4;

impl Model {
    /// A booking can be cancelled while it is still pending or confirmed
    /// and the visit is more than 2 hours away. Exactly on the boundary
    /// the window is closed.
    pub fn can_cancel(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.status,
            BookingStatus::Pending | BookingStatus::Confirmed
        ) && now < self.scheduled_date - Duration::hours(CANCELLATION_WINDOW_HOURS)
    }

    /// Rescheduling is allowed up to assignment, more than 4 hours out.
    pub fn can_reschedule(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.status,
            BookingStatus::Pending | BookingStatus::Confirmed | BookingStatus::Assigned
        ) && now < self.scheduled_date - Duration::hours(RESCHEDULE_WINDOW_HOURS)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::booking_item::Entity")]
    BookingItem,
    #[sea_orm(has_many = "super::booking_assignment::Entity")]
    BookingAssignment,
    #[sea_orm(has_many = "super::payment::Entity")]
    Payment,
}

impl Related<super::booking_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BookingItem.def()
    }
}

impl Related<super::booking_assignment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BookingAssignment.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn booking(status: BookingStatus, scheduled: DateTime<Utc>) -> Model {
        Model {
            id: Uuid::new_v4(),
            booking_number: "DC202601150001".into(),
            customer_id: Uuid::new_v4(),
            status,
            service_address: "12 Lake View Road".into(),
            scheduled_date: scheduled,
            scheduled_time_slot: TimeSlot::TenToTwelve,
            special_instructions: None,
            subtotal: dec!(999),
            tax: dec!(179.82),
            discount: dec!(0),
            total: dec!(1178.82),
            coupon_code: None,
            payment_id: None,
            cancelled_by: None,
            cancelled_at: None,
            cancellation_reason: None,
            refund_amount: None,
            completed_at: None,
            completion_notes: None,
            created_at: Utc::now(),
            updated_at: None,
            version: 1,
        }
    }

    #[rstest::rstest]
    // Open while pending/confirmed and strictly more than 2h out.
    #[case(BookingStatus::Pending, Duration::hours(3), true)]
    #[case(BookingStatus::Confirmed, Duration::hours(2) + Duration::seconds(1), true)]
    // Exactly on the boundary resolves to closed.
    #[case(BookingStatus::Confirmed, Duration::hours(2), false)]
    #[case(BookingStatus::Confirmed, Duration::hours(2) - Duration::seconds(1), false)]
    // Status gates regardless of time.
    #[case(BookingStatus::Assigned, Duration::days(3), false)]
    #[case(BookingStatus::Completed, Duration::days(3), false)]
    #[case(BookingStatus::Cancelled, Duration::days(3), false)]
    fn cancel_window(
        #[case] status: BookingStatus,
        #[case] until_visit: Duration,
        #[case] expected: bool,
    ) {
        let now = Utc::now();
        let b = booking(status, now + until_visit);
        assert_eq!(b.can_cancel(now), expected);
    }

    #[test]
    fn reschedule_allows_assigned_with_wider_window() {
        let now = Utc::now();
        let b = booking(BookingStatus::Assigned, now + Duration::hours(5));
        assert!(b.can_reschedule(now));
        let b = booking(BookingStatus::Assigned, now + Duration::hours(4));
        assert!(!b.can_reschedule(now));
    }

    #[test]
    fn status_transitions_follow_lifecycle() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Assigned));
        assert!(Assigned.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(Assigned.can_transition_to(Cancelled));

        assert!(!Pending.can_transition_to(Assigned));
        assert!(!InProgress.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
    }
}
