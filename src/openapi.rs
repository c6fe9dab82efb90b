use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::UserRole,
    entities::{
        booking::{BookingStatus, TimeSlot},
        booking_assignment::StaffRole,
        booking_item::AddOnSnapshot,
        payment::PaymentStatus,
    },
    errors::ErrorResponse,
    services::{
        bookings::{
            AssignStaffRequest, AssignmentResponse, BookingItemResponse, BookingListResponse,
            BookingResponse, CancelBookingRequest, CancellationResponse, CompleteBookingRequest,
            CreateBookingRequest, PricingSummary, StaffAssignmentRequest, UpdateBookingRequest,
            UpdateBookingStatusRequest,
        },
        payments::{
            CreateOrderRequest, CreateOrderResponse, PaymentResponse, RefundDetails,
            VerifyPaymentRequest, VerifyPaymentResponse,
        },
        pricing::LineItemRequest,
        refunds::ProcessRefundRequest,
    },
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "DustClear API",
        description = "House-cleaning booking platform: catalog-priced bookings, gateway checkout, webhook reconciliation, refunds",
        version = "0.3.0"
    ),
    paths(
        crate::handlers::bookings::create_booking,
        crate::handlers::bookings::list_bookings,
        crate::handlers::bookings::get_booking,
        crate::handlers::bookings::get_booking_by_number,
        crate::handlers::bookings::update_booking,
        crate::handlers::bookings::cancel_booking,
        crate::handlers::bookings::update_booking_status,
        crate::handlers::bookings::assign_staff,
        crate::handlers::bookings::complete_booking,
        crate::handlers::payments::create_order,
        crate::handlers::payments::verify_payment,
        crate::handlers::payments::get_payment,
        crate::handlers::payments::list_payments_for_booking,
        crate::handlers::payments::refund_payment,
        crate::handlers::payment_webhooks::payment_webhook,
    ),
    components(schemas(
        BookingStatus,
        TimeSlot,
        StaffRole,
        PaymentStatus,
        UserRole,
        AddOnSnapshot,
        LineItemRequest,
        CreateBookingRequest,
        UpdateBookingRequest,
        UpdateBookingStatusRequest,
        AssignStaffRequest,
        StaffAssignmentRequest,
        CompleteBookingRequest,
        CancelBookingRequest,
        BookingResponse,
        BookingListResponse,
        BookingItemResponse,
        AssignmentResponse,
        CancellationResponse,
        PricingSummary,
        CreateOrderRequest,
        CreateOrderResponse,
        VerifyPaymentRequest,
        VerifyPaymentResponse,
        PaymentResponse,
        RefundDetails,
        ProcessRefundRequest,
        ErrorResponse,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "Bookings", description = "Booking creation and lifecycle"),
        (name = "Payments", description = "Gateway checkout, webhooks, refunds")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Swagger UI router, mounted by `main`.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
