//! Signed bearer tokens for the admin API.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::{GuardianError, GuardianResult};

pub const SECRET_ENV_VAR: &str = "JWT_SECRET";
pub const TTL_ENV_VAR: &str = "JWT_EXP_HOURS";
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// Issues and verifies HS256 tokens whose subject is a user id.
#[derive(Clone)]
pub struct AccessTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    sub: Uuid,
    iat: i64,
    exp: i64,
}

impl AccessTokens {
    pub fn new(secret: &[u8], ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn from_env() -> GuardianResult<Self> {
        let secret = std::env::var(SECRET_ENV_VAR)
            .map_err(|_| GuardianError::configuration(format!("{SECRET_ENV_VAR} not set")))?;
        let ttl_hours = match std::env::var(TTL_ENV_VAR) {
            Ok(raw) => raw
                .parse()
                .map_err(|_| GuardianError::configuration(format!("{TTL_ENV_VAR} must be a whole number of hours")))?,
            Err(_) => DEFAULT_TTL_HOURS,
        };
        Ok(Self::new(secret.as_bytes(), ttl_hours))
    }

    pub fn issue(&self, user_id: Uuid) -> GuardianResult<String> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: user_id,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| GuardianError::token(err.to_string()))
    }

    /// The user id the token was issued for. Expired or foreign tokens fail.
    pub fn verify(&self, token: &str) -> GuardianResult<Uuid> {
        jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims.sub)
            .map_err(|err| GuardianError::token(err.to_string()))
    }
}

/// Token part of an `Authorization: Bearer <token>` header. The scheme is
/// matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// The authenticated caller of an admin API request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = GuardianError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| GuardianError::unauthorized("Authorization header missing"))?;
        let user_id = state.tokens.verify(token)?;
        Ok(AuthUser { user_id })
    }
}
