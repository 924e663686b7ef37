use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::ServiceError,
    repository::StoreState,
    roles::{Right, Role},
    services,
};

/// Claims
///
/// Payload of an HS256 access token signed with `JWT_SECRET`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): id of the `User` the token was issued to.
    pub sub: Uuid,
    /// Expiration Time (exp): seconds since the epoch after which the token is refused.
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

impl Claims {
    pub fn new(sub: Uuid, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub,
            exp: (now + ttl).timestamp().max(0) as usize,
            iat: now.timestamp().max(0) as usize,
        }
    }
}

/// issue_token
///
/// Signs an access token for `user_id`. Used by operators and the test-suite; the API itself
/// never mints tokens.
pub fn issue_token(secret: &str, user_id: Uuid, ttl: Duration) -> Result<String, ServiceError> {
    encode(
        &Header::default(),
        &Claims::new(user_id, ttl),
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("failed to sign token: {:?}", e);
        ServiceError::Storage("Failed to sign token".to_string())
    })
}

/// AuthUser Extractor Result
///
/// The resolved identity of an authenticated request. Handlers check rights with
/// [`AuthUser::require`] and pass the value to the services, which apply ownership scoping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl AuthUser {
    /// Fails with `PermissionDenied` (403) unless the caller's role grants `right`.
    pub fn require(&self, right: Right) -> Result<(), ServiceError> {
        if self.role.has_right(right) {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.id, right = right.as_str(), "permission denied");
            Err(ServiceError::PermissionDenied("Forbidden".to_string()))
        }
    }
}

fn unauthorized() -> ServiceError {
    ServiceError::Unauthorized("Please authenticate".to_string())
}

/// AuthUser Extractor Implementation
///
/// 1. Local bypass: with `Env::Local`, an `x-user-id` header naming an existing user is
///    accepted without a token.
/// 2. Bearer token extraction and HS256 decoding with expiry validation.
/// 3. Store lookup, so a deleted user's still-valid token is refused and role changes apply
///    immediately.
///
/// Rejection: `ServiceError::Unauthorized` (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    StoreState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let store = StoreState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| Uuid::parse_str(raw).ok());
            if let Some(user_id) = bypass {
                if let Some(user) = services::get_user(store.as_ref(), user_id).await? {
                    return Ok(AuthUser {
                        id: user.id,
                        role: user.role,
                    });
                }
            }
        }
        // Falls through to the token flow in production or when the bypass did not resolve.

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(unauthorized)?;

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("rejected expired token"),
                other => tracing::debug!("rejected token: {:?}", other),
            }
            unauthorized()
        })?;

        let user = services::get_user(store.as_ref(), token_data.claims.sub)
            .await?
            .ok_or_else(unauthorized)?;

        Ok(AuthUser {
            id: user.id,
            role: user.role,
        })
    }
}
