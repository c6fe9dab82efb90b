use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Router,
};
use uuid::Uuid;

use super::common::{BookingStatusFilter, PaginationParams};
use crate::auth::AuthenticatedUser;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::bookings::{
    AssignStaffRequest, BookingListResponse, BookingResponse, CancelBookingRequest,
    CompleteBookingRequest, CreateBookingRequest, UpdateBookingRequest,
    UpdateBookingStatusRequest,
};
use crate::ApiResponse;

/// Create a booking
#[utoipa::path(
    post,
    path = "/api/v1/bookings",
    request_body = CreateBookingRequest,
    responses(
        (status = 201, description = "Booking created", body = ApiResponse<BookingResponse>),
        (status = 400, description = "Validation error", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthenticated", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Bookings"
)]
pub async fn create_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BookingResponse>>), ServiceError> {
    let booking = state
        .services
        .bookings
        .create_booking(user.id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(booking))))
}

/// List bookings visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/bookings",
    params(PaginationParams, BookingStatusFilter),
    responses(
        (status = 200, description = "Bookings list", body = ApiResponse<BookingListResponse>)
    ),
    security(("bearer_auth" = [])),
    tag = "Bookings"
)]
pub async fn list_bookings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(params): Query<PaginationParams>,
    Query(filter): Query<BookingStatusFilter>,
) -> Result<Json<ApiResponse<BookingListResponse>>, ServiceError> {
    let bookings = state
        .services
        .bookings
        .list_bookings(&user, params.page, params.per_page, filter.status)
        .await?;
    Ok(Json(ApiResponse::success(bookings)))
}

/// Get a booking by id
#[utoipa::path(
    get,
    path = "/api/v1/bookings/{id}",
    params(("id" = Uuid, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking details", body = ApiResponse<BookingResponse>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Bookings"
)]
pub async fn get_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BookingResponse>>, ServiceError> {
    let booking = state.services.bookings.get_booking(id, &user).await?;
    Ok(Json(ApiResponse::success(booking)))
}

/// Get a booking by its human-readable number
#[utoipa::path(
    get,
    path = "/api/v1/bookings/by-number/{booking_number}",
    params(("booking_number" = String, Path, description = "Booking number, e.g. DC202601150001")),
    responses(
        (status = 200, description = "Booking details", body = ApiResponse<BookingResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Bookings"
)]
pub async fn get_booking_by_number(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(booking_number): Path<String>,
) -> Result<Json<ApiResponse<BookingResponse>>, ServiceError> {
    let booking = state
        .services
        .bookings
        .get_booking_by_number(&booking_number, &user)
        .await?;
    Ok(Json(ApiResponse::success(booking)))
}

/// Update customer-writable booking fields
#[utoipa::path(
    put,
    path = "/api/v1/bookings/{id}",
    params(("id" = Uuid, Path, description = "Booking ID")),
    request_body = UpdateBookingRequest,
    responses(
        (status = 200, description = "Booking updated", body = ApiResponse<BookingResponse>),
        (status = 409, description = "Outside edit window", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Bookings"
)]
pub async fn update_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateBookingRequest>,
) -> Result<Json<ApiResponse<BookingResponse>>, ServiceError> {
    let booking = state
        .services
        .bookings
        .update_booking(id, &user, request)
        .await?;
    Ok(Json(ApiResponse::success(booking)))
}

/// Cancel a booking (owner, inside the 2-hour window). Also exposed as
/// `DELETE /bookings/{id}`; cancellation is a state, not a removal.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/cancel",
    params(("id" = Uuid, Path, description = "Booking ID")),
    request_body = CancelBookingRequest,
    responses(
        (status = 200, description = "Booking cancelled", body = ApiResponse<BookingResponse>),
        (status = 409, description = "Window closed", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Bookings"
)]
pub async fn cancel_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    request: Option<Json<CancelBookingRequest>>,
) -> Result<Json<ApiResponse<BookingResponse>>, ServiceError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let booking = state
        .services
        .bookings
        .cancel_booking(id, &user, request)
        .await?;
    Ok(Json(ApiResponse::success(booking)))
}

/// Update booking status (staff/admin)
#[utoipa::path(
    put,
    path = "/api/v1/bookings/{id}/status",
    params(("id" = Uuid, Path, description = "Booking ID")),
    request_body = UpdateBookingStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<BookingResponse>),
        (status = 409, description = "Invalid transition", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Bookings"
)]
pub async fn update_booking_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateBookingStatusRequest>,
) -> Result<Json<ApiResponse<BookingResponse>>, ServiceError> {
    if !user.is_admin() && !user.is_staff() {
        return Err(ServiceError::Forbidden(
            "only staff or admin can change booking status".into(),
        ));
    }
    let booking = state
        .services
        .bookings
        .update_status(id, &user, request)
        .await?;
    Ok(Json(ApiResponse::success(booking)))
}

/// Replace staff assignments (admin)
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/assign",
    params(("id" = Uuid, Path, description = "Booking ID")),
    request_body = AssignStaffRequest,
    responses(
        (status = 200, description = "Staff assigned", body = ApiResponse<BookingResponse>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Bookings"
)]
pub async fn assign_staff(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignStaffRequest>,
) -> Result<Json<ApiResponse<BookingResponse>>, ServiceError> {
    if !user.is_admin() {
        return Err(ServiceError::Forbidden(
            "only admin can assign staff".into(),
        ));
    }
    let booking = state.services.bookings.assign_staff(id, request).await?;
    Ok(Json(ApiResponse::success(booking)))
}

/// Record completion of an in-progress visit (assigned staff or admin)
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/complete",
    params(("id" = Uuid, Path, description = "Booking ID")),
    request_body = CompleteBookingRequest,
    responses(
        (status = 200, description = "Booking completed", body = ApiResponse<BookingResponse>),
        (status = 409, description = "Not in progress", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Bookings"
)]
pub async fn complete_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    request: Option<Json<CompleteBookingRequest>>,
) -> Result<Json<ApiResponse<BookingResponse>>, ServiceError> {
    if !user.is_admin() && !user.is_staff() {
        return Err(ServiceError::Forbidden(
            "only staff or admin can complete bookings".into(),
        ));
    }
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let booking = state
        .services
        .bookings
        .complete_booking(id, &user, request)
        .await?;
    Ok(Json(ApiResponse::success(booking)))
}

/// Booking routes
pub fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_booking).get(list_bookings))
        .route(
            "/:id",
            get(get_booking).put(update_booking).delete(cancel_booking),
        )
        .route("/by-number/:booking_number", get(get_booking_by_number))
        .route("/:id/cancel", post(cancel_booking))
        .route("/:id/status", put(update_booking_status))
        .route("/:id/assign", post(assign_staff))
        .route("/:id/complete", post(complete_booking))
}
