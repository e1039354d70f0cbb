use axum::body::Body;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;

use storymint_database::SqlxFilterQuery;
use storymint_runtime::User;

use crate::jwt::TokenKind;
use crate::response::AppError;
use crate::utils::{extract_bearer_token, extract_cookie};
use crate::GlobalState;

pub const SESSION_COOKIE: &str = "sessionid";

/// Identity attached to the request by [`authenticate`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub via: TokenKind,
}

/// Accepts an access token as `Authorization: Bearer`, or a session token in
/// the `sessionid` cookie, both checked against the key that issued them.
pub async fn authenticate(
    State(state): State<GlobalState>, mut req: Request, next: Next
) -> Result<Response<Body>, AppError> {
    let claims = match extract_bearer_token(req.headers()) {
        Ok(token) => state.jwt.verify(&token, TokenKind::Access)?,
        Err(bearer_err) => match extract_cookie(req.headers(), SESSION_COOKIE) {
            Some(token) => state.jwt.verify(&token, TokenKind::Session)?,
            None => return Err(bearer_err),
        },
    };

    req.extensions_mut().insert(AuthenticatedUser {
        user_id: claims.user_id()?,
        via: claims.token_type,
    });
    Ok(next.run(req).await)
}

/// Loads the authenticated user; unknown or deactivated users are turned away.
pub async fn ensure_user(state: &GlobalState, auth: &AuthenticatedUser) -> Result<User, AppError> {
    User::find_by_id(auth.user_id, state.pool()).await?
        .filter(|user| user.is_active)
        .ok_or_else(|| AppError::unauthorized("user not found or inactive"))
}
