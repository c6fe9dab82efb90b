use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;

/// Roles carried in the bearer token. Token issuance happens in the
/// identity service; this API only verifies.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UserRole {
    Customer,
    Staff,
    Admin,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub role: UserRole,
    /// Expiry (seconds since epoch)
    pub exp: usize,
}

/// The verified caller: {id, role}.
#[derive(Clone, Copy, Debug)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub role: UserRole,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_staff(&self) -> bool {
        self.role == UserRole::Staff
    }

    /// Admin passes everywhere; otherwise the caller must own the record.
    pub fn can_access_customer_record(&self, owner: Uuid) -> bool {
        self.is_admin() || self.id == owner
    }
}

/// Verifies an HS256 bearer token and returns the caller identity.
pub fn verify_bearer(token: &str, secret: &str) -> Result<AuthenticatedUser, ServiceError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| ServiceError::Unauthorized(format!("invalid token: {}", e)))?;

    Ok(AuthenticatedUser {
        id: data.claims.sub,
        role: data.claims.role,
    })
}

#[axum::async_trait]
impl FromRequestParts<crate::AppState> for AuthenticatedUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &crate::AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ServiceError::Unauthorized("missing authorization header".into()))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| ServiceError::Unauthorized("expected bearer token".into()))?;

        verify_bearer(token, &state.config.jwt_secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "unit-test-secret-unit-test-secret-unit-test-secret-unit-test-secret";

    fn token_for(role: UserRole, exp_offset_secs: i64) -> (Uuid, String) {
        let id = Uuid::new_v4();
        let claims = Claims {
            sub: id,
            role,
            exp: (chrono::Utc::now().timestamp() + exp_offset_secs) as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        (id, token)
    }

    #[test]
    fn verifies_valid_token_and_recovers_identity() {
        let (id, token) = token_for(UserRole::Customer, 3600);
        let user = verify_bearer(&token, SECRET).unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.role, UserRole::Customer);
    }

    #[test]
    fn rejects_expired_token() {
        let (_, token) = token_for(UserRole::Admin, -3600);
        assert!(verify_bearer(&token, SECRET).is_err());
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let (_, token) = token_for(UserRole::Admin, 3600);
        assert!(verify_bearer(&token, "another-secret-another-secret-another-secret-another-secret!!").is_err());
    }

    #[test]
    fn customer_record_access_rules() {
        let owner = Uuid::new_v4();
        let customer = AuthenticatedUser {
            id: owner,
            role: UserRole::Customer,
        };
        let other = AuthenticatedUser {
            id: Uuid::new_v4(),
            role: UserRole::Customer,
        };
        let admin = AuthenticatedUser {
            id: Uuid::new_v4(),
            role: UserRole::Admin,
        };
        assert!(customer.can_access_customer_record(owner));
        assert!(!other.can_access_customer_record(owner));
        assert!(admin.can_access_customer_record(owner));
    }
}
