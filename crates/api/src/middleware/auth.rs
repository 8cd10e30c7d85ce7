//! Admin JWT authentication.
//!
//! Provides JWT encoding/decoding, admin credential checks, and an
//! `AdminUser` Axum extractor that guards admin-only routes.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use empire_common::config::AppConfig;
use empire_common::error::AppError;

use crate::state::AppState;

/// JWT claims stored in the token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject, the admin username
    pub sub: String,
    /// Whether the bearer may use admin routes
    #[serde(default)]
    pub is_admin: bool,
    /// Expiration time (UNIX timestamp)
    pub exp: i64,
    /// Issued at (UNIX timestamp)
    pub iat: i64,
}

/// Authenticated admin extracted from a JWT.
///
/// ```ignore
/// async fn handler(admin: AdminUser) -> impl IntoResponse {
///     // admin.username is the token subject
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub username: String,
    pub claims: Claims,
}

/// Encode a JWT for `subject`.
pub fn encode_jwt(
    subject: &str,
    secret: &str,
    expiry_minutes: u64,
    is_admin: bool,
) -> Result<String, AppError> {
    let now = Utc::now();
    let exp = now + Duration::minutes(expiry_minutes as i64);

    let claims = Claims {
        sub: subject.to_string(),
        is_admin,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Auth(format!("Failed to encode JWT: {}", e)))
}

/// Decode and validate a JWT.
pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::Auth(format!("Invalid token: {}", e)))?;

    Ok(token_data.claims)
}

/// Hex SHA-256 of a password, the format `ADMIN_PW_SHA256` is stored in.
pub fn password_digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Check admin credentials against the configuration.
///
/// Fails closed when either `ADMIN_USER` or `ADMIN_PW_SHA256` is unset.
pub fn verify_admin(config: &AppConfig, username: &str, password: &str) -> bool {
    let (Some(admin), Some(expected_hex)) = (&config.admin_user, &config.admin_pw_sha256) else {
        return false;
    };
    let Ok(expected) = hex::decode(expected_hex) else {
        tracing::error!("ADMIN_PW_SHA256 is not valid hex");
        return false;
    };
    let actual = Sha256::digest(password.as_bytes());

    let user_ok = constant_time_eq(admin.as_bytes(), username.as_bytes());
    let pw_ok = constant_time_eq(&expected, actual.as_slice());
    user_ok & pw_ok
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Extracts and validates the JWT from the `Authorization: Bearer <token>`
/// header. Valid tokens without the admin claim are forbidden.
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let secret = state.config.jwt_secret.clone();

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        async move {
            let token = auth_header
                .as_deref()
                .and_then(|h| h.strip_prefix("Bearer "))
                .ok_or_else(|| {
                    AppError::Auth(
                        "Missing or invalid Authorization header. Use 'Bearer <JWT>'".to_string(),
                    )
                })?;

            let claims = decode_jwt(token, &secret)?;
            if !claims.is_admin {
                return Err(AppError::Forbidden("Admin privileges required".to_string()));
            }

            Ok(AdminUser {
                username: claims.sub.clone(),
                claims,
            })
        }
    }
}
