use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use storymint_runtime::{SignInChallenge, WalletAuthenticator, WalletCredentials};

use crate::jwt::{TokenKind, TokenPair};
use crate::middleware::{authenticate, ensure_user, AuthenticatedUser, SESSION_COOKIE};
use crate::response::{AppError, AppSuccess};
use crate::GlobalState;

const INVALID_SIGNATURE: &str = "Invalid signature";

pub fn auth_routes(state: &GlobalState) -> Router<GlobalState> {
    Router::new()
        .route("/api/auth/signin/", get(signin))
        .route("/api/auth/verify/", post(verify))
        .route("/api/auth/refresh/", post(refresh))

        .route("/api/auth/session/",
            get(session)
            .route_layer(middleware::from_fn_with_state(state.clone(), authenticate))
        )
}

async fn signin() -> Json<SignInChallenge> {
    Json(SignInChallenge::new())
}

async fn verify(
    State(state): State<GlobalState>,
    payload: Result<Json<WalletCredentials>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(credentials) = payload.map_err(|e| {
        tracing::debug!("[verify] unreadable credentials: {}", e.body_text());
        AppError::invalid(INVALID_SIGNATURE)
    })?;

    let user = WalletAuthenticator::authenticate(state.pool(), &credentials).await?
        .ok_or_else(|| AppError::invalid(INVALID_SIGNATURE))?;

    let tokens: TokenPair = state.jwt.issue_pair(user.id)?;
    let session = state.jwt.issue(user.id, TokenKind::Session)?;
    let cookie = format!(
        "{}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, session, state.jwt.ttl(TokenKind::Session)
    );

    tracing::info!("[verify] user {} signed in", user.id);
    Ok(([(header::SET_COOKIE, cookie)], Json(tokens)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

async fn refresh(
    State(state): State<GlobalState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Json(payload) = payload
        .map_err(|_| AppError::invalid("refresh: This field is required."))?;
    let access = state.jwt.refresh(&payload.refresh)?;
    Ok(Json(json!({ "access": access })))
}

async fn session(
    State(state): State<GlobalState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_user(&state, &auth).await?;
    Ok(AppSuccess::new(StatusCode::OK, "Session data", json!({
        "user": user,
        "authenticated_via": auth.via,
    })))
}
