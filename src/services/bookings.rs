use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthenticatedUser,
    db::{is_unique_violation, DbPool},
    entities::{
        booking::{self, BookingStatus, TimeSlot},
        booking_assignment::{self, StaffRole},
        booking_counter,
        booking_item::{self, AddOnSnapshot},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        coupons,
        pricing::{LineItemRequest, PricingEngine},
    },
};

/// Request/Response types for the booking service

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateBookingRequest {
    #[validate(length(min = 1, message = "At least one service is required"))]
    pub services: Vec<LineItemRequest>,
    #[validate(length(min = 5, max = 500, message = "Service address is required"))]
    pub service_address: String,
    pub scheduled_date: DateTime<Utc>,
    pub scheduled_time_slot: TimeSlot,
    pub special_instructions: Option<String>,
    pub coupon_code: Option<String>,
}

/// Customer-writable fields, accepted only while pending/confirmed.
#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateBookingRequest {
    pub scheduled_date: Option<DateTime<Utc>>,
    pub scheduled_time_slot: Option<TimeSlot>,
    #[validate(length(min = 5, max = 500))]
    pub service_address: Option<String>,
    pub special_instructions: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateBookingStatusRequest {
    pub status: BookingStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StaffAssignmentRequest {
    pub staff_id: Uuid,
    pub role: StaffRole,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct AssignStaffRequest {
    #[validate(length(min = 1, message = "At least one staff member is required"))]
    pub assignments: Vec<StaffAssignmentRequest>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct CompleteBookingRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct CancelBookingRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PricingSummary {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BookingItemResponse {
    pub service_id: Uuid,
    pub service_name: String,
    pub quantity: i32,
    pub base_price: Decimal,
    pub add_ons: Vec<AddOnSnapshot>,
    pub subtotal: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AssignmentResponse {
    pub staff_id: Uuid,
    pub role: StaffRole,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CancellationResponse {
    pub cancelled_by: Uuid,
    pub cancelled_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub refund_amount: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BookingResponse {
    pub id: Uuid,
    pub booking_number: String,
    pub customer_id: Uuid,
    pub status: BookingStatus,
    pub service_address: String,
    pub scheduled_date: DateTime<Utc>,
    pub scheduled_time_slot: TimeSlot,
    pub special_instructions: Option<String>,
    pub items: Vec<BookingItemResponse>,
    pub pricing: PricingSummary,
    pub coupon_code: Option<String>,
    pub assigned_staff: Vec<AssignmentResponse>,
    pub payment_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation: Option<CancellationResponse>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BookingListResponse {
    pub bookings: Vec<BookingResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// How many times creation retries when a concurrently allocated
/// booking number collides on the unique index.
const NUMBER_ALLOCATION_ATTEMPTS: usize = 5;
const SEQUENCE_ATTEMPTS: usize = 5;

/// Service for managing bookings over the shared database.
#[derive(Clone)]
pub struct BookingService {
    db: Arc<DbPool>,
    pricing: PricingEngine,
    event_sender: Option<Arc<EventSender>>,
}

impl BookingService {
    pub fn new(
        db: Arc<DbPool>,
        pricing: PricingEngine,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            pricing,
            event_sender,
        }
    }

    /// Creates a booking: validates every line against the catalog,
    /// computes pricing, redeems the coupon (if any) and allocates the
    /// booking number atomically, inserting booking and items in one
    /// transaction.
    #[instrument(skip(self, request), fields(customer_id = %customer_id))]
    pub async fn create_booking(
        &self,
        customer_id: Uuid,
        request: CreateBookingRequest,
    ) -> Result<BookingResponse, ServiceError> {
        request.validate()?;

        let now = Utc::now();
        if request.scheduled_date < now {
            return Err(ServiceError::ValidationError(
                "scheduled date must be in the future".into(),
            ));
        }

        let pricing = self.pricing.compute_pricing(&request.services).await?;
        let day = now.format("%Y%m%d").to_string();

        for attempt in 0..NUMBER_ALLOCATION_ATTEMPTS {
            let txn = self.db.begin().await?;

            let discount = match &request.coupon_code {
                Some(code) => coupons::redeem(&txn, code, pricing.total, now).await?,
                None => Decimal::ZERO,
            };
            let total = pricing.total - discount;

            let seq = next_daily_sequence(&txn, &day).await?;
            let booking_number = format!("DC{}{:04}", day, seq);
            let booking_id = Uuid::new_v4();

            let booking_model = booking::ActiveModel {
                id: Set(booking_id),
                booking_number: Set(booking_number.clone()),
                customer_id: Set(customer_id),
                status: Set(BookingStatus::Pending),
                service_address: Set(request.service_address.clone()),
                scheduled_date: Set(request.scheduled_date),
                scheduled_time_slot: Set(request.scheduled_time_slot),
                special_instructions: Set(request.special_instructions.clone()),
                subtotal: Set(pricing.subtotal),
                tax: Set(pricing.tax),
                discount: Set(discount),
                total: Set(total),
                coupon_code: Set(request.coupon_code.clone()),
                payment_id: Set(None),
                cancelled_by: Set(None),
                cancelled_at: Set(None),
                cancellation_reason: Set(None),
                refund_amount: Set(None),
                completed_at: Set(None),
                completion_notes: Set(None),
                created_at: Set(now),
                updated_at: Set(Some(now)),
                version: Set(1),
            };

            let inserted = match booking_model.insert(&txn).await {
                Ok(model) => model,
                Err(e) if is_unique_violation(&e) => {
                    // Another request won this sequence number; start over.
                    txn.rollback().await?;
                    warn!(
                        booking_number,
                        attempt, "booking number collision, retrying allocation"
                    );
                    continue;
                }
                Err(e) => {
                    error!(error = %e, "failed to insert booking");
                    return Err(e.into());
                }
            };

            let mut item_models = Vec::with_capacity(pricing.lines.len());
            for (position, line) in pricing.lines.iter().enumerate() {
                let item = booking_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    booking_id: Set(booking_id),
                    service_id: Set(line.service_id),
                    service_name: Set(line.service_name.clone()),
                    quantity: Set(line.quantity),
                    base_price: Set(line.base_price),
                    add_ons: Set(serde_json::to_value(&line.add_ons).map_err(|e| {
                        ServiceError::InternalError(format!("add-on serialization: {}", e))
                    })?),
                    subtotal: Set(line.subtotal),
                    position: Set(position as i32),
                };
                item_models.push(item.insert(&txn).await?);
            }

            txn.commit().await?;

            info!(
                booking_id = %booking_id,
                booking_number,
                %total,
                "booking created"
            );

            if let Some(sender) = &self.event_sender {
                if let Err(e) = sender.send(Event::BookingCreated(booking_id)).await {
                    warn!(error = %e, booking_id = %booking_id, "failed to send booking created event");
                }
            }

            return Ok(model_to_response(inserted, item_models, vec![]));
        }

        Err(ServiceError::StateConflict(
            "could not allocate a booking number, please retry".into(),
        ))
    }

    /// Retrieves a booking, enforcing role scoping: customers see their
    /// own, staff see bookings they are assigned to, admin sees all.
    #[instrument(skip(self, user), fields(booking_id = %booking_id))]
    pub async fn get_booking(
        &self,
        booking_id: Uuid,
        user: &AuthenticatedUser,
    ) -> Result<BookingResponse, ServiceError> {
        let (model, items, assignments) = self.load_booking(booking_id).await?;
        authorize_view(user, &model, &assignments)?;
        Ok(model_to_response(model, items, assignments))
    }

    #[instrument(skip(self, user))]
    pub async fn get_booking_by_number(
        &self,
        booking_number: &str,
        user: &AuthenticatedUser,
    ) -> Result<BookingResponse, ServiceError> {
        let model = booking::Entity::find()
            .filter(booking::Column::BookingNumber.eq(booking_number))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Booking {} not found", booking_number))
            })?;

        let items = self.load_items(model.id).await?;
        let assignments = self.load_assignments(model.id).await?;
        authorize_view(user, &model, &assignments)?;
        Ok(model_to_response(model, items, assignments))
    }

    /// Lists bookings visible to the caller, newest first.
    #[instrument(skip(self, user))]
    pub async fn list_bookings(
        &self,
        user: &AuthenticatedUser,
        page: u64,
        per_page: u64,
        status: Option<BookingStatus>,
    ) -> Result<BookingListResponse, ServiceError> {
        let mut query = booking::Entity::find();

        match user.role {
            crate::auth::UserRole::Customer => {
                query = query.filter(booking::Column::CustomerId.eq(user.id));
            }
            crate::auth::UserRole::Staff => {
                let assigned: Vec<Uuid> = booking_assignment::Entity::find()
                    .filter(booking_assignment::Column::StaffId.eq(user.id))
                    .all(&*self.db)
                    .await?
                    .into_iter()
                    .map(|a| a.booking_id)
                    .collect();
                query = query.filter(booking::Column::Id.is_in(assigned));
            }
            crate::auth::UserRole::Admin => {}
        }

        if let Some(status) = status {
            query = query.filter(booking::Column::Status.eq(status));
        }

        let paginator = query
            .order_by_desc(booking::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page.saturating_sub(1)).await?;

        let mut bookings = Vec::with_capacity(models.len());
        for model in models {
            let items = self.load_items(model.id).await?;
            let assignments = self.load_assignments(model.id).await?;
            bookings.push(model_to_response(model, items, assignments));
        }

        Ok(BookingListResponse {
            bookings,
            total,
            page,
            per_page,
        })
    }

    /// Applies customer-writable field updates. Date/slot changes count
    /// as a reschedule and must fall inside the reschedule window.
    #[instrument(skip(self, user, request), fields(booking_id = %booking_id))]
    pub async fn update_booking(
        &self,
        booking_id: Uuid,
        user: &AuthenticatedUser,
        request: UpdateBookingRequest,
    ) -> Result<BookingResponse, ServiceError> {
        request.validate()?;

        let now = Utc::now();
        let txn = self.db.begin().await?;

        let model = booking::Entity::find_by_id(booking_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", booking_id)))?;

        if !user.can_access_customer_record(model.customer_id) {
            return Err(ServiceError::Forbidden(
                "bookings may only be modified by their owner".into(),
            ));
        }

        if !matches!(
            model.status,
            BookingStatus::Pending | BookingStatus::Confirmed
        ) {
            return Err(ServiceError::StateConflict(format!(
                "booking in status '{}' can no longer be edited",
                model.status
            )));
        }

        let reschedules = request.scheduled_date.is_some() || request.scheduled_time_slot.is_some();
        if reschedules && !user.is_admin() && !model.can_reschedule(now) {
            return Err(ServiceError::StateConflict(
                "reschedule window has closed for this booking".into(),
            ));
        }

        if let Some(date) = request.scheduled_date {
            if date < now {
                return Err(ServiceError::ValidationError(
                    "scheduled date must be in the future".into(),
                ));
            }
        }

        let version = model.version;
        let mut active: booking::ActiveModel = model.into();
        if let Some(date) = request.scheduled_date {
            active.scheduled_date = Set(date);
        }
        if let Some(slot) = request.scheduled_time_slot {
            active.scheduled_time_slot = Set(slot);
        }
        if let Some(address) = request.service_address {
            active.service_address = Set(address);
        }
        if let Some(instructions) = request.special_instructions {
            active.special_instructions = Set(Some(instructions));
        }
        active.updated_at = Set(Some(now));
        active.version = Set(version + 1);

        let updated = active.update(&txn).await?;
        txn.commit().await?;

        if reschedules {
            if let Some(sender) = &self.event_sender {
                if let Err(e) = sender.send(Event::BookingRescheduled(booking_id)).await {
                    warn!(error = %e, booking_id = %booking_id, "failed to send reschedule event");
                }
            }
        }

        let items = self.load_items(booking_id).await?;
        let assignments = self.load_assignments(booking_id).await?;
        Ok(model_to_response(updated, items, assignments))
    }

    /// Staff/admin status transition along the lifecycle. Same-status
    /// requests are no-ops; invalid transitions are conflicts.
    #[instrument(skip(self, user), fields(booking_id = %booking_id, new_status = %request.status))]
    pub async fn update_status(
        &self,
        booking_id: Uuid,
        user: &AuthenticatedUser,
        request: UpdateBookingStatusRequest,
    ) -> Result<BookingResponse, ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let model = booking::Entity::find_by_id(booking_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", booking_id)))?;

        if user.is_staff() {
            let assignments = self.load_assignments(booking_id).await?;
            if !assignments.iter().any(|a| a.staff_id == user.id) {
                return Err(ServiceError::Forbidden(
                    "staff can only update bookings they are assigned to".into(),
                ));
            }
        }

        let old_status = model.status;
        if old_status == request.status {
            txn.commit().await?;
            let items = self.load_items(booking_id).await?;
            let assignments = self.load_assignments(booking_id).await?;
            return Ok(model_to_response(model, items, assignments));
        }

        if !old_status.can_transition_to(request.status) {
            return Err(ServiceError::StateConflict(format!(
                "cannot transition booking from '{}' to '{}'",
                old_status, request.status
            )));
        }

        let version = model.version;
        let mut active: booking::ActiveModel = model.into();
        active.status = Set(request.status);
        match request.status {
            BookingStatus::Cancelled => {
                active.cancelled_by = Set(Some(user.id));
                active.cancelled_at = Set(Some(now));
                active.cancellation_reason = Set(request.reason.clone());
            }
            BookingStatus::Completed => {
                active.completed_at = Set(Some(now));
            }
            _ => {}
        }
        active.updated_at = Set(Some(now));
        active.version = Set(version + 1);

        let updated = active.update(&txn).await?;
        txn.commit().await?;

        info!(
            booking_id = %booking_id,
            old_status = %old_status,
            new_status = %request.status,
            "booking status updated"
        );

        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender
                .send(Event::BookingStatusChanged {
                    booking_id,
                    old_status: old_status.to_string(),
                    new_status: request.status.to_string(),
                })
                .await
            {
                warn!(error = %e, booking_id = %booking_id, "failed to send status change event");
            }
        }

        let items = self.load_items(booking_id).await?;
        let assignments = self.load_assignments(booking_id).await?;
        Ok(model_to_response(updated, items, assignments))
    }

    /// Customer cancellation, gated by the 2-hour window. Admins force
    /// a cancel through [`update_status`] instead.
    #[instrument(skip(self, user), fields(booking_id = %booking_id))]
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        user: &AuthenticatedUser,
        request: CancelBookingRequest,
    ) -> Result<BookingResponse, ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let model = booking::Entity::find_by_id(booking_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", booking_id)))?;

        if !user.can_access_customer_record(model.customer_id) {
            return Err(ServiceError::Forbidden(
                "bookings may only be cancelled by their owner".into(),
            ));
        }

        if !model.can_cancel(now) {
            return Err(ServiceError::StateConflict(
                "booking can no longer be cancelled: the cancellation window closes 2 hours before the visit".into(),
            ));
        }

        let version = model.version;
        let mut active: booking::ActiveModel = model.into();
        active.status = Set(BookingStatus::Cancelled);
        active.cancelled_by = Set(Some(user.id));
        active.cancelled_at = Set(Some(now));
        active.cancellation_reason = Set(request.reason.clone());
        active.updated_at = Set(Some(now));
        active.version = Set(version + 1);

        let updated = active.update(&txn).await?;
        txn.commit().await?;

        info!(booking_id = %booking_id, "booking cancelled");

        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender
                .send(Event::BookingCancelled {
                    booking_id,
                    refund_amount: None,
                })
                .await
            {
                warn!(error = %e, booking_id = %booking_id, "failed to send cancel event");
            }
        }

        let items = self.load_items(booking_id).await?;
        let assignments = self.load_assignments(booking_id).await?;
        Ok(model_to_response(updated, items, assignments))
    }

    /// Replaces the staff assignment set (admin). Moves confirmed
    /// bookings to assigned.
    #[instrument(skip(self, request), fields(booking_id = %booking_id))]
    pub async fn assign_staff(
        &self,
        booking_id: Uuid,
        request: AssignStaffRequest,
    ) -> Result<BookingResponse, ServiceError> {
        request.validate()?;

        let now = Utc::now();
        let txn = self.db.begin().await?;

        let model = booking::Entity::find_by_id(booking_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", booking_id)))?;

        if !matches!(
            model.status,
            BookingStatus::Confirmed | BookingStatus::Assigned
        ) {
            return Err(ServiceError::StateConflict(format!(
                "staff can only be assigned to confirmed bookings, not '{}'",
                model.status
            )));
        }

        booking_assignment::Entity::delete_many()
            .filter(booking_assignment::Column::BookingId.eq(booking_id))
            .exec(&txn)
            .await?;

        for assignment in &request.assignments {
            booking_assignment::ActiveModel {
                id: Set(Uuid::new_v4()),
                booking_id: Set(booking_id),
                staff_id: Set(assignment.staff_id),
                role: Set(assignment.role),
                assigned_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }

        let old_status = model.status;
        let version = model.version;
        let mut active: booking::ActiveModel = model.into();
        active.status = Set(BookingStatus::Assigned);
        active.updated_at = Set(Some(now));
        active.version = Set(version + 1);
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        if old_status != BookingStatus::Assigned {
            if let Some(sender) = &self.event_sender {
                if let Err(e) = sender
                    .send(Event::BookingStatusChanged {
                        booking_id,
                        old_status: old_status.to_string(),
                        new_status: BookingStatus::Assigned.to_string(),
                    })
                    .await
                {
                    warn!(error = %e, booking_id = %booking_id, "failed to send status change event");
                }
            }
        }

        let items = self.load_items(booking_id).await?;
        let assignments = self.load_assignments(booking_id).await?;
        Ok(model_to_response(updated, items, assignments))
    }

    /// Records completion of an in-progress visit. Staff callers must
    /// be on the assignment list.
    #[instrument(skip(self, user, request), fields(booking_id = %booking_id))]
    pub async fn complete_booking(
        &self,
        booking_id: Uuid,
        user: &AuthenticatedUser,
        request: CompleteBookingRequest,
    ) -> Result<BookingResponse, ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let model = booking::Entity::find_by_id(booking_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", booking_id)))?;

        let assignments = self.load_assignments(booking_id).await?;
        if user.is_staff() && !assignments.iter().any(|a| a.staff_id == user.id) {
            return Err(ServiceError::Forbidden(
                "only assigned staff can complete this booking".into(),
            ));
        }

        if model.status != BookingStatus::InProgress {
            return Err(ServiceError::StateConflict(format!(
                "only in-progress bookings can be completed, booking is '{}'",
                model.status
            )));
        }

        let old_status = model.status;
        let version = model.version;
        let mut active: booking::ActiveModel = model.into();
        active.status = Set(BookingStatus::Completed);
        active.completed_at = Set(Some(now));
        active.completion_notes = Set(request.notes.clone());
        active.updated_at = Set(Some(now));
        active.version = Set(version + 1);
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender
                .send(Event::BookingStatusChanged {
                    booking_id,
                    old_status: old_status.to_string(),
                    new_status: BookingStatus::Completed.to_string(),
                })
                .await
            {
                warn!(error = %e, booking_id = %booking_id, "failed to send completion event");
            }
        }

        let items = self.load_items(booking_id).await?;
        Ok(model_to_response(updated, items, assignments))
    }

    async fn load_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<
        (
            booking::Model,
            Vec<booking_item::Model>,
            Vec<booking_assignment::Model>,
        ),
        ServiceError,
    > {
        let model = booking::Entity::find_by_id(booking_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking {} not found", booking_id)))?;
        let items = self.load_items(booking_id).await?;
        let assignments = self.load_assignments(booking_id).await?;
        Ok((model, items, assignments))
    }

    async fn load_items(&self, booking_id: Uuid) -> Result<Vec<booking_item::Model>, ServiceError> {
        Ok(booking_item::Entity::find()
            .filter(booking_item::Column::BookingId.eq(booking_id))
            .order_by_asc(booking_item::Column::Position)
            .all(&*self.db)
            .await?)
    }

    async fn load_assignments(
        &self,
        booking_id: Uuid,
    ) -> Result<Vec<booking_assignment::Model>, ServiceError> {
        Ok(booking_assignment::Entity::find()
            .filter(booking_assignment::Column::BookingId.eq(booking_id))
            .all(&*self.db)
            .await?)
    }
}

fn authorize_view(
    user: &AuthenticatedUser,
    model: &booking::Model,
    assignments: &[booking_assignment::Model],
) -> Result<(), ServiceError> {
    let allowed = match user.role {
        crate::auth::UserRole::Admin => true,
        crate::auth::UserRole::Customer => model.customer_id == user.id,
        crate::auth::UserRole::Staff => assignments.iter().any(|a| a.staff_id == user.id),
    };
    if allowed {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(
            "no access to this booking".into(),
        ))
    }
}

/// Allocates the next same-day sequence with a guarded increment on the
/// per-day counter row. The insert race on a day's first booking is
/// retried like any other lost update.
async fn next_daily_sequence<C: sea_orm::ConnectionTrait>(
    conn: &C,
    day: &str,
) -> Result<i32, ServiceError> {
    for _ in 0..SEQUENCE_ATTEMPTS {
        match booking_counter::Entity::find_by_id(day.to_string())
            .one(conn)
            .await?
        {
            Some(row) => {
                let next = row.seq + 1;
                let result = booking_counter::Entity::update_many()
                    .col_expr(booking_counter::Column::Seq, Expr::value(next))
                    .filter(booking_counter::Column::Day.eq(day))
                    .filter(booking_counter::Column::Seq.eq(row.seq))
                    .exec(conn)
                    .await?;
                if result.rows_affected == 1 {
                    return Ok(next);
                }
            }
            None => {
                let insert = booking_counter::ActiveModel {
                    day: Set(day.to_string()),
                    seq: Set(1),
                }
                .insert(conn)
                .await;
                match insert {
                    Ok(_) => return Ok(1),
                    Err(e) if is_unique_violation(&e) => continue,
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }

    Err(ServiceError::StateConflict(
        "daily booking sequence is contended, please retry".into(),
    ))
}

fn model_to_response(
    model: booking::Model,
    items: Vec<booking_item::Model>,
    assignments: Vec<booking_assignment::Model>,
) -> BookingResponse {
    let cancellation = match (model.cancelled_by, model.cancelled_at) {
        (Some(by), Some(at)) => Some(CancellationResponse {
            cancelled_by: by,
            cancelled_at: at,
            reason: model.cancellation_reason.clone(),
            refund_amount: model.refund_amount,
        }),
        _ => None,
    };

    BookingResponse {
        id: model.id,
        booking_number: model.booking_number,
        customer_id: model.customer_id,
        status: model.status,
        service_address: model.service_address,
        scheduled_date: model.scheduled_date,
        scheduled_time_slot: model.scheduled_time_slot,
        special_instructions: model.special_instructions,
        items: items
            .into_iter()
            .map(|item| BookingItemResponse {
                service_id: item.service_id,
                service_name: item.service_name.clone(),
                quantity: item.quantity,
                base_price: item.base_price,
                add_ons: item.add_on_snapshots(),
                subtotal: item.subtotal,
            })
            .collect(),
        pricing: PricingSummary {
            subtotal: model.subtotal,
            tax: model.tax,
            discount: model.discount,
            total: model.total,
        },
        coupon_code: model.coupon_code,
        assigned_staff: assignments
            .into_iter()
            .map(|a| AssignmentResponse {
                staff_id: a.staff_id,
                role: a.role,
                assigned_at: a.assigned_at,
            })
            .collect(),
        payment_id: model.payment_id,
        cancellation,
        completed_at: model.completed_at,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn booking_number_format_pads_sequence() {
        let number = format!("DC{}{:04}", "20260115", 7);
        assert_eq!(number, "DC202601150007");
        assert_eq!(number.len(), 2 + 8 + 4);

        let large = format!("DC{}{:04}", "20260115", 1234);
        assert_eq!(large, "DC202601151234");
    }

    #[test]
    fn model_to_response_carries_pricing_and_cancellation() {
        let now = Utc::now();
        let booking_id = Uuid::new_v4();
        let actor = Uuid::new_v4();

        let model = booking::Model {
            id: booking_id,
            booking_number: "DC202601150001".into(),
            customer_id: Uuid::new_v4(),
            status: BookingStatus::Cancelled,
            service_address: "12 Lake View Road".into(),
            scheduled_date: now,
            scheduled_time_slot: TimeSlot::EightToTen,
            special_instructions: None,
            subtotal: dec!(999),
            tax: dec!(179.82),
            discount: dec!(100),
            total: dec!(1078.82),
            coupon_code: Some("FESTIVE20".into()),
            payment_id: None,
            cancelled_by: Some(actor),
            cancelled_at: Some(now),
            cancellation_reason: Some("customer request".into()),
            refund_amount: Some(dec!(1078.82)),
            completed_at: None,
            completion_notes: None,
            created_at: now,
            updated_at: Some(now),
            version: 2,
        };

        let response = model_to_response(model, vec![], vec![]);
        assert_eq!(response.pricing.total, dec!(1078.82));
        assert_eq!(
            response.pricing.total,
            response.pricing.subtotal + response.pricing.tax - response.pricing.discount
        );
        let cancellation = response.cancellation.expect("cancellation record");
        assert_eq!(cancellation.cancelled_by, actor);
        assert_eq!(cancellation.refund_amount, Some(dec!(1078.82)));
    }
}
