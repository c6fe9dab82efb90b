use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::payments::{
    CreateOrderRequest, CreateOrderResponse, PaymentResponse, VerifyPaymentRequest,
    VerifyPaymentResponse,
};
use crate::services::refunds::ProcessRefundRequest;
use crate::ApiResponse;

/// Open a gateway order for a confirmed booking
#[utoipa::path(
    post,
    path = "/api/v1/payments/create-order",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order opened", body = ApiResponse<CreateOrderResponse>),
        (status = 409, description = "Payment already completed", body = crate::errors::ErrorResponse),
        (status = 502, description = "Gateway unavailable", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreateOrderResponse>>), ServiceError> {
    let order = state.services.payments.create_order(&user, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

/// Verify a checkout confirmation signature
#[utoipa::path(
    post,
    path = "/api/v1/payments/verify",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment captured", body = ApiResponse<VerifyPaymentResponse>),
        (status = 400, description = "Signature verification failed", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<ApiResponse<VerifyPaymentResponse>>, ServiceError> {
    let verified = state
        .services
        .payments
        .verify_payment(&user, request)
        .await?;
    Ok(Json(ApiResponse::success(verified)))
}

/// Get a payment by id
#[utoipa::path(
    get,
    path = "/api/v1/payments/{id}",
    params(("id" = Uuid, Path, description = "Payment ID")),
    responses(
        (status = 200, description = "Payment details", body = ApiResponse<PaymentResponse>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn get_payment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PaymentResponse>>, ServiceError> {
    let payment = state.services.payments.get_payment(id, &user).await?;
    Ok(Json(ApiResponse::success(payment)))
}

/// List payments for a booking
#[utoipa::path(
    get,
    path = "/api/v1/payments/booking/{booking_id}",
    params(("booking_id" = Uuid, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Payments for booking", body = ApiResponse<Vec<PaymentResponse>>)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn list_payments_for_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<PaymentResponse>>>, ServiceError> {
    let payments = state
        .services
        .payments
        .list_payments_for_booking(booking_id, &user)
        .await?;
    Ok(Json(ApiResponse::success(payments)))
}

/// Refund a payment, in full or in part (admin)
#[utoipa::path(
    post,
    path = "/api/v1/payments/{id}/refund",
    params(("id" = Uuid, Path, description = "Payment ID")),
    request_body = ProcessRefundRequest,
    responses(
        (status = 200, description = "Refund applied", body = ApiResponse<PaymentResponse>),
        (status = 400, description = "Not refundable or amount too large", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn refund_payment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<ProcessRefundRequest>,
) -> Result<Json<ApiResponse<PaymentResponse>>, ServiceError> {
    if !user.is_admin() {
        return Err(ServiceError::Forbidden(
            "only admin can process refunds".into(),
        ));
    }
    let refunded = state
        .services
        .refunds
        .process_refund(id, user.id, request)
        .await?;
    Ok(Json(ApiResponse::success(refunded)))
}

/// Payment routes. The webhook route lives in
/// [`super::payment_webhooks`] because it bypasses bearer auth.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/create-order", post(create_order))
        .route("/verify", post(verify_payment))
        .route("/:id", get(get_payment))
        .route("/:id/refund", post(refund_payment))
        .route("/booking/:booking_id", get(list_payments_for_booking))
}
