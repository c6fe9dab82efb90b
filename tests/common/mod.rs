use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, Response},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use dustclear_api::{
    auth::{Claims, UserRole},
    config::AppConfig,
    db,
    entities::service_offering,
    errors::ServiceError,
    events::{self, EventSender},
    handlers::AppServices,
    services::gateway::{GatewayOrder, GatewayRefund, PaymentGateway},
    AppState,
};

pub const TEST_JWT_SECRET: &str =
    "integration_test_secret_key_that_is_definitely_longer_than_64_characters_ok";
pub const TEST_CHECKOUT_SECRET: &str = "rzp_test_secret";
pub const TEST_WEBHOOK_SECRET: &str = "whsec_test";

/// Deterministic in-process gateway double. Order ids are unique per
/// call; refund ids are derived from the idempotency key, so a retried
/// refund deduplicates exactly like the real gateway.
#[derive(Default)]
pub struct StubGateway {
    order_seq: AtomicU64,
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_order(
        &self,
        _amount: Decimal,
        _currency: &str,
        receipt: &str,
        _notes: &str,
    ) -> Result<GatewayOrder, ServiceError> {
        let seq = self.order_seq.fetch_add(1, Ordering::SeqCst);
        Ok(GatewayOrder {
            order_id: format!("order_{}_{}", receipt, seq),
        })
    }

    async fn refund(
        &self,
        _gateway_payment_id: &str,
        _amount: Decimal,
        idempotency_key: &str,
    ) -> Result<GatewayRefund, ServiceError> {
        Ok(GatewayRefund {
            refund_id: format!("rfnd_{}", idempotency_key),
            status: "processed".to_string(),
        })
    }
}

/// Harness spinning up the app against a fresh SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_file = format!("dustclear_test_{}.db", Uuid::new_v4().simple());
        let cfg = AppConfig {
            database_url: format!("sqlite://{db_file}?mode=rwc"),
            jwt_secret: TEST_JWT_SECRET.to_string(),
            host: "127.0.0.1".to_string(),
            port: 18_080,
            environment: "test".to_string(),
            log_level: "warn".to_string(),
            log_json: false,
            auto_migrate: true,
            cors_allowed_origins: None,
            db_max_connections: 1,
            db_min_connections: 1,
            db_connect_timeout_secs: 5,
            db_idle_timeout_secs: 60,
            db_acquire_timeout_secs: 5,
            tax_rate: dec!(0.18),
            currency: "INR".to_string(),
            gateway: "razorpay".to_string(),
            gateway_base_url: "http://127.0.0.1:9".to_string(),
            gateway_key_id: "rzp_test_key".to_string(),
            gateway_key_secret: TEST_CHECKOUT_SECRET.to_string(),
            gateway_webhook_secret: TEST_WEBHOOK_SECRET.to_string(),
            gateway_timeout_secs: 1,
        };

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = AppServices::with_gateway(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            &cfg,
            Arc::new(StubGateway::default()),
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = dustclear_api::app_router().with_state(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Mints a bearer token for the given role; returns (user id, token).
    pub fn token_for(&self, role: UserRole) -> (Uuid, String) {
        let id = Uuid::new_v4();
        let claims = Claims {
            sub: id,
            role,
            exp: (Utc::now().timestamp() + 3600) as usize,
        };
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
        )
        .expect("token encoding");
        (id, token)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        self.router.clone().oneshot(request).await.expect("response")
    }

    /// Posts a signed webhook body the way the gateway would.
    pub async fn deliver_webhook(&self, body: &str, signature: &str) -> Response<Body> {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/payments/webhook")
            .header("content-type", "application/json")
            .header("x-webhook-signature", signature)
            .body(Body::from(body.to_string()))
            .expect("request");
        self.router.clone().oneshot(request).await.expect("response")
    }

    /// Seeds a bookable catalog entry and returns its id.
    pub async fn seed_service(&self, name: &str, base_price: Decimal) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        service_offering::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            slug: Set(dustclear_api::services::catalog::slugify(name)),
            category: Set(Some("home".to_string())),
            active: Set(true),
            base_price: Set(base_price),
            add_ons: Set(serde_json::json!([
                {"name": "Fridge Interior", "price": "199"},
                {"name": "Balcony Wash", "price": "149"}
            ])),
            duration_minutes: Set(120),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed service offering");
        id
    }
}

pub async fn response_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// HMAC-SHA256 over the raw body, hex-encoded, as the gateway signs
/// webhook deliveries.
pub fn webhook_signature(body: &str) -> String {
    use hmac::{Hmac, Mac};
    let mut mac = Hmac::<sha2::Sha256>::new_from_slice(TEST_WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
