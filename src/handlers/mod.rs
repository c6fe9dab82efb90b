pub mod bookings;
pub mod common;
pub mod payment_webhooks;
pub mod payments;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::DbPool,
    errors::ServiceError,
    events::EventSender,
    services::{
        bookings::BookingService,
        catalog::DbCatalog,
        gateway::{HttpPaymentGateway, PaymentGateway},
        payments::PaymentService,
        pricing::PricingEngine,
        refunds::RefundService,
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub bookings: Arc<BookingService>,
    pub payments: Arc<PaymentService>,
    pub refunds: Arc<RefundService>,
}

impl AppServices {
    /// Wires the service graph against the production gateway client.
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        config: &AppConfig,
    ) -> Result<Self, ServiceError> {
        let gateway: Arc<dyn PaymentGateway> = Arc::new(HttpPaymentGateway::new(config)?);
        Ok(Self::with_gateway(db, event_sender, config, gateway))
    }

    /// Same wiring with an injected gateway; integration tests pass a
    /// mock here.
    pub fn with_gateway(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        config: &AppConfig,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let catalog = Arc::new(DbCatalog::new(db.clone()));
        let pricing = PricingEngine::new(catalog, config.tax_rate);

        let bookings = Arc::new(BookingService::new(
            db.clone(),
            pricing,
            Some(event_sender.clone()),
        ));
        let payments = Arc::new(PaymentService::new(
            db.clone(),
            gateway.clone(),
            Some(event_sender.clone()),
            config.currency.clone(),
            config.gateway.clone(),
            config.gateway_key_secret.clone(),
            config.gateway_webhook_secret.clone(),
        ));
        let refunds = Arc::new(RefundService::new(db, gateway, Some(event_sender)));

        Self {
            bookings,
            payments,
            refunds,
        }
    }
}
