use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use std::time::Duration;
use tracing::{error, instrument};

use crate::{config::AppConfig, errors::ServiceError};

type HmacSha256 = Hmac<Sha256>;

/// Gateway order opened before the customer pays.
#[derive(Clone, Debug, Deserialize)]
pub struct GatewayOrder {
    #[serde(rename = "id")]
    pub order_id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GatewayRefund {
    #[serde(rename = "id")]
    pub refund_id: String,
    pub status: String,
}

/// Outbound seam to the payment gateway. Failures are surfaced, never
/// retried here; retry policy belongs to the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(
        &self,
        amount: Decimal,
        currency: &str,
        receipt: &str,
        notes: &str,
    ) -> Result<GatewayOrder, ServiceError>;

    /// `idempotency_key` must be stable across retries of the same
    /// logical refund: the gateway deduplicates on it and returns the
    /// original refund id instead of moving money twice.
    async fn refund(
        &self,
        gateway_payment_id: &str,
        amount: Decimal,
        idempotency_key: &str,
    ) -> Result<GatewayRefund, ServiceError>;
}

/// REST client for the gateway, authenticated with key id/secret.
/// Amounts go over the wire in minor units.
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl HttpPaymentGateway {
    pub fn new(cfg: &AppConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.gateway_timeout_secs))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("gateway client: {}", e)))?;

        Ok(Self {
            client,
            base_url: cfg.gateway_base_url.clone(),
            key_id: cfg.gateway_key_id.clone(),
            key_secret: cfg.gateway_key_secret.clone(),
        })
    }

    fn map_transport_error(e: reqwest::Error) -> ServiceError {
        if e.is_timeout() {
            ServiceError::GatewayTimeout(e.to_string())
        } else {
            ServiceError::GatewayUnavailable(e.to_string())
        }
    }
}

fn amount_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    (amount * Decimal::from(100))
        .round()
        .to_i64()
        .ok_or_else(|| ServiceError::ValidationError(format!("amount out of range: {}", amount)))
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self))]
    async fn create_order(
        &self,
        amount: Decimal,
        currency: &str,
        receipt: &str,
        notes: &str,
    ) -> Result<GatewayOrder, ServiceError> {
        let body = json!({
            "amount": amount_minor_units(amount)?,
            "currency": currency,
            "receipt": receipt,
            "notes": { "description": notes },
        });

        let response = self
            .client
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            error!(%status, "gateway order creation rejected");
            return Err(ServiceError::GatewayUnavailable(format!(
                "order creation returned {}",
                status
            )));
        }

        response
            .json::<GatewayOrder>()
            .await
            .map_err(|e| ServiceError::GatewayUnavailable(format!("malformed order response: {}", e)))
    }

    #[instrument(skip(self))]
    async fn refund(
        &self,
        gateway_payment_id: &str,
        amount: Decimal,
        idempotency_key: &str,
    ) -> Result<GatewayRefund, ServiceError> {
        let body = json!({ "amount": amount_minor_units(amount)? });

        let response = self
            .client
            .post(format!(
                "{}/payments/{}/refund",
                self.base_url, gateway_payment_id
            ))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .header("idempotency-key", idempotency_key)
            .json(&body)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            error!(%status, "gateway refund rejected");
            return Err(ServiceError::GatewayUnavailable(format!(
                "refund returned {}",
                status
            )));
        }

        response
            .json::<GatewayRefund>()
            .await
            .map_err(|e| ServiceError::GatewayUnavailable(format!("malformed refund response: {}", e)))
    }
}

/// Signature the gateway sends back after checkout:
/// HMAC-SHA256 over `"{order_id}|{payment_id}"`, hex-encoded.
pub fn sign_checkout(order_id: &str, payment_id: &str, secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

pub fn verify_checkout_signature(
    order_id: &str,
    payment_id: &str,
    signature: &str,
    secret: &str,
) -> bool {
    constant_time_eq(&sign_checkout(order_id, payment_id, secret), signature)
}

/// Webhook signatures cover the exact raw request body.
pub fn verify_webhook_signature(body: &[u8], signature: &str, secret: &str) -> bool {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(&expected, signature)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SECRET: &str = "whsec_unit_test";

    #[test]
    fn checkout_signature_round_trips() {
        let sig = sign_checkout("order_abc", "pay_xyz", SECRET);
        assert!(verify_checkout_signature("order_abc", "pay_xyz", &sig, SECRET));
    }

    #[test]
    fn checkout_signature_rejects_tampered_ids() {
        let sig = sign_checkout("order_abc", "pay_xyz", SECRET);
        assert!(!verify_checkout_signature("order_abc", "pay_other", &sig, SECRET));
        assert!(!verify_checkout_signature("order_other", "pay_xyz", &sig, SECRET));
    }

    #[test]
    fn checkout_signature_rejects_wrong_secret() {
        let sig = sign_checkout("order_abc", "pay_xyz", "another_secret");
        assert!(!verify_checkout_signature("order_abc", "pay_xyz", &sig, SECRET));
    }

    #[test]
    fn webhook_signature_covers_exact_body() {
        let body = br#"{"event":"payment.captured","payload":{"payment_id":"pay_1"}}"#;
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(body);
        let sig = hex::encode(mac.finalize().into_bytes());

        assert!(verify_webhook_signature(body, &sig, SECRET));
        // A single flipped byte invalidates it.
        let mut tampered = body.to_vec();
        tampered[10] ^= 1;
        assert!(!verify_webhook_signature(&tampered, &sig, SECRET));
    }

    #[test]
    fn constant_time_eq_handles_length_mismatch() {
        assert!(!constant_time_eq("abc", "abcd"));
        assert!(constant_time_eq("abc", "abc"));
    }

    #[test]
    fn amounts_convert_to_minor_units() {
        assert_eq!(amount_minor_units(dec!(1178.82)).unwrap(), 117882);
        assert_eq!(amount_minor_units(dec!(0)).unwrap(), 0);
        assert_eq!(amount_minor_units(dec!(999)).unwrap(), 99900);
    }
}
