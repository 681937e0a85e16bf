use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::{
    auth::{AuthUser, TokenService},
    error::AppError,
};

const BEARER_PREFIX: &str = "Bearer ";

/// require_bearer
///
/// Guards the mutating book routes. The request only reaches the handler once
/// the `Authorization: Bearer <token>` header carries a token that passes
/// `TokenService::parse_token`; the resolved [`AuthUser`] is then placed in the
/// request extensions for the `AuthUser` extractor to pick up.
///
/// Every rejection is a 401 in the standard error envelope.
pub async fn require_bearer(
    State(tokens): State<TokenService>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    tracing::debug!(%method, %path, "authorization check");

    let user = authenticate(&tokens, &request).inspect_err(|e| {
        tracing::info!(%method, %path, reason = %e, "request rejected");
    })?;

    tracing::debug!(%method, %path, user_id = user.id, "request authorized");
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

fn authenticate(tokens: &TokenService, request: &Request) -> Result<AuthUser, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::unauthorized("missing authorization header"))?;

    let value = header
        .to_str()
        .map_err(|_| AppError::unauthorized("authorization header must use the Bearer scheme"))?;

    // HTTP parsers drop trailing whitespace, so "Bearer " arrives as "Bearer".
    if value.trim_end() == BEARER_PREFIX.trim_end() {
        return Err(AppError::unauthorized("empty bearer token"));
    }

    let token = value
        .strip_prefix(BEARER_PREFIX)
        .ok_or_else(|| AppError::unauthorized("authorization header must use the Bearer scheme"))?
        .trim();

    if token.is_empty() {
        return Err(AppError::unauthorized("empty bearer token"));
    }

    match tokens.parse_token(token) {
        Ok(claims) => Ok(AuthUser::from(claims)),
        Err(e) => {
            tracing::warn!(token = %token, error = ?e, "token verification failed");
            Err(AppError::unauthorized("invalid token"))
        }
    }
}
