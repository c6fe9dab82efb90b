use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use bytes::Bytes;
use tracing::warn;

use crate::{errors::ServiceError, AppState};

const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Gateway-originated webhook. Authenticated by the HMAC signature over
/// the exact raw body, not by a bearer token. Any verification failure
/// is a 400 with no state change; handled events are idempotent.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = String,
    responses(
        (status = 200, description = "Webhook accepted"),
        (status = 400, description = "Invalid signature or payload", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            warn!("webhook delivery without signature header");
            ServiceError::SignatureVerificationFailed
        })?;

    state
        .services
        .payments
        .handle_webhook(&body, signature)
        .await?;

    Ok((StatusCode::OK, "OK"))
}
