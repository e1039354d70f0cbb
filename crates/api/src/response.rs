use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use storymint_runtime::ValidationError;

use crate::jwt::TokenError;

pub const TOKEN_INVALID_DETAIL: &str = "Token is invalid or expired";

pub type AppSuccess = GenericResponse;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenericResponse {
    pub status: u16,
    pub message: String,
    pub data: serde_json::Value,
}

impl GenericResponse {
    pub fn new(status: StatusCode, message: &str, data: serde_json::Value) -> Self {
        Self {
            status: status.as_u16(),
            message: message.to_string(),
            data,
        }
    }
}

impl IntoResponse for GenericResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        (status, Json::from(self)).into_response()
    }
}

/// An error with the status it should be answered with.
#[derive(Debug)]
pub struct AppError(pub StatusCode, pub anyhow::Error);

impl AppError {
    pub fn new(status: StatusCode, err: anyhow::Error) -> Self {
        Self(status, err)
    }

    pub fn not_found(what: &str) -> Self {
        Self(StatusCode::NOT_FOUND, anyhow::anyhow!("{} not found", what))
    }

    pub fn unauthorized(reason: &str) -> Self {
        Self(StatusCode::UNAUTHORIZED, anyhow::anyhow!("{}", reason))
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self(StatusCode::BAD_REQUEST, ValidationError::single(message).into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // validation messages go out as a bare JSON array
        if let Some(ValidationError(messages)) = self.1.downcast_ref::<ValidationError>() {
            tracing::debug!("CODE: {}, VALIDATION: {:?}", self.0.as_u16(), messages);
            return (self.0, Json(messages.clone())).into_response();
        }
        if let Some(e) = self.1.downcast_ref::<TokenError>() {
            tracing::debug!("CODE: 401, TOKEN: {}", e);
            return (StatusCode::UNAUTHORIZED, Json(json!({ "detail": TOKEN_INVALID_DETAIL }))).into_response();
        }

        if self.0.is_server_error() {
            tracing::error!("CODE: {}, MESSAGE: {:#}", self.0.as_u16(), self.1);
        } else {
            tracing::warn!("CODE: {}, MESSAGE: {}", self.0.as_u16(), self.1);
        }
        GenericResponse::new(self.0, &self.1.to_string(), json!({})).into_response()
    }
}

/// Unwraps a JSON request body. Unreadable bodies are answered like any other
/// validation failure, as a 400 message array.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::invalid(rejection.body_text()))
}

/// Lets handlers use `?` on anything convertible to `anyhow::Error`. The
/// status follows the error type; anything unrecognised is a server error.
impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        let status = if err.is::<ValidationError>() {
            StatusCode::BAD_REQUEST
        } else if err.is::<TokenError>() {
            StatusCode::UNAUTHORIZED
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self(status, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_errors_render_as_message_array() {
        let err: AppError = anyhow::Error::from(ValidationError::single("Invalid signature")).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!(["Invalid signature"]));
    }

    #[tokio::test]
    async fn token_errors_render_as_detail() {
        let err: AppError = TokenError::Expired.into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await, json!({ "detail": TOKEN_INVALID_DETAIL }));
    }

    #[tokio::test]
    async fn other_errors_use_the_envelope() {
        let response = AppError::not_found("World").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["status"], 404);
        assert_eq!(body["message"], "World not found");
    }
}
