use argon2::{
    Argon2,
    password_hash::{
        self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;

/// Lifetime of every access token, counted from issuance.
pub const ACCESS_TOKEN_TTL: Duration = Duration::minutes(15);

// --- Credentials ---

/// CredentialError
///
/// Keeps a wrong password apart from a broken hash or hasher failure, so the
/// login flow can answer 401 for the former and 500 for the latter.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("password does not match")]
    Mismatch,
    #[error("stored password hash is malformed: {0}")]
    MalformedHash(password_hash::Error),
    #[error("password hashing failed: {0}")]
    Hashing(password_hash::Error),
}

/// hash_password
///
/// Produces an Argon2id PHC string with a fresh random salt.
pub fn hash_password(plaintext: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(CredentialError::Hashing)?;
    Ok(hash.to_string())
}

/// check_password
///
/// Verifies `plaintext` against a PHC string. The comparison inside
/// `argon2` is constant-time.
pub fn check_password(hash: &str, plaintext: &str) -> Result<(), CredentialError> {
    let parsed = PasswordHash::new(hash).map_err(CredentialError::MalformedHash)?;
    match Argon2::default().verify_password(plaintext.as_bytes(), &parsed) {
        Ok(()) => Ok(()),
        Err(password_hash::Error::Password) => Err(CredentialError::Mismatch),
        Err(e) => Err(CredentialError::Hashing(e)),
    }
}

// --- Tokens ---

/// Claims
///
/// The payload carried inside every access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the id of the authenticated user.
    pub sub: i32,
    /// Role tag copied from the user record at login (e.g. "admin").
    pub role: String,
    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
    /// Unique token id.
    pub jti: String,
}

/// TokenError
///
/// Every rejection of a presented token collapses into `Invalid`; the wrapped
/// source is kept for logs only.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid(#[source] jsonwebtoken::errors::Error),
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// TokenService
///
/// Issues and verifies HS256 access tokens. The secret is fixed at
/// construction and cannot be changed afterwards; clones share the same keys.
#[derive(Clone)]
pub struct TokenService {
    keys: Arc<TokenKeys>,
    validation: Validation,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;

        Self {
            keys: Arc::new(TokenKeys {
                encoding: EncodingKey::from_secret(secret.as_bytes()),
                decoding: DecodingKey::from_secret(secret.as_bytes()),
            }),
            validation,
        }
    }

    /// Signs a token for `user_id` valid for [`ACCESS_TOKEN_TTL`] from now.
    pub fn generate_access_token(&self, user_id: i32, role: &str) -> Result<String, TokenError> {
        self.generate_access_token_at(user_id, role, Utc::now())
    }

    /// Signs a token as if issued at `issued_at`.
    pub fn generate_access_token_at(
        &self,
        user_id: i32,
        role: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: user_id,
            role: role.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + ACCESS_TOKEN_TTL).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.keys.encoding)
            .map_err(TokenError::Signing)
    }

    /// Verifies signature, structure, and expiry.
    pub fn parse_token(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.keys.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(TokenError::Invalid)
    }
}

// --- Request Identity ---

/// AuthUser
///
/// The verified identity of the caller. The bearer middleware inserts it into
/// the request extensions after a token passes `parse_token`; handlers on
/// mutating routes take it as an argument to receive it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i32,
    pub role: String,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        AuthUser {
            id: claims.sub,
            role: claims.role,
        }
    }
}

/// Reads the identity placed by the middleware. Absence means the route was
/// mounted without the middleware, which is rejected like any other
/// unauthenticated call.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("authentication required"))
    }
}
