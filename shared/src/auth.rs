//! JWT authentication helpers
//!
//! HS256 bearer tokens shared across services. End users authenticate with
//! tokens issued by the auth service; the payment service signs short-lived
//! `service` tokens with the same secret for its order-status PATCH, since
//! no end-user token exists at gateway-callback time.

use axum::http::{header, HeaderMap};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Role for internal service-to-service calls
pub const ROLE_SERVICE: &str = "service";

/// Token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub email: String,
    pub username: String,
    pub role: String,
    /// Expiry (Unix seconds)
    pub exp: i64,
}

impl Claims {
    pub fn is_service(&self) -> bool {
        self.role == ROLE_SERVICE
    }
}

/// Sign a token valid for `ttl_secs`
pub fn sign_token(
    sub: &str,
    email: &str,
    username: &str,
    role: &str,
    ttl_secs: i64,
    secret: &str,
) -> Result<String, AppError> {
    let claims = Claims {
        sub: sub.to_string(),
        email: email.to_string(),
        username: username.to_string(),
        role: role.to_string(),
        exp: Utc::now().timestamp() + ttl_secs,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::internal(format!("token signing failed: {e}")))
}

/// Short-lived internal token for service-to-service calls
pub fn service_token(service_name: &str, secret: &str) -> Result<String, AppError> {
    sign_token(service_name, "", service_name, ROLE_SERVICE, 60, secret)
}

/// Verify a token and return its claims
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::unauthorized())
}

/// Extract the bearer token from request headers
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Authenticate a request: extract and verify the bearer token
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<Claims, AppError> {
    let token = bearer_token(headers).ok_or_else(AppError::unauthorized)?;
    verify_token(token, secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "test-secret";

    #[test]
    fn sign_verify_round_trip() {
        let token = sign_token("u1", "u1@example.com", "alice", "user", 60, SECRET).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.email, "u1@example.com");
        assert!(!claims.is_service());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = sign_token("u1", "a@b.c", "alice", "user", 60, SECRET).unwrap();
        assert!(verify_token(&token, "other-secret").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = sign_token("u1", "a@b.c", "alice", "user", -120, SECRET).unwrap();
        assert!(verify_token(&token, SECRET).is_err());
    }

    #[test]
    fn authenticate_reads_bearer_header() {
        let token = sign_token("u1", "a@b.c", "alice", "user", 60, SECRET).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        assert!(authenticate(&headers, SECRET).is_ok());

        let empty = HeaderMap::new();
        assert!(authenticate(&empty, SECRET).is_err());
    }

    #[test]
    fn service_token_carries_service_role() {
        let token = service_token("payment-service", SECRET).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();
        assert!(claims.is_service());
    }
}
