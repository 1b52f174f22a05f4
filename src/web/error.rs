use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::error::ApiError;

#[derive(Debug, Error)]
pub enum WebError {
    #[error("Not authenticated")]
    Unauthenticated,

    /// A guild-scoped request the user may not make; carries the reason.
    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Bot is not connected to Discord yet")]
    BotNotReady,

    #[error("OAuth2 token exchange failed: {0}")]
    OAuth(String),

    #[error(transparent)]
    Upstream(#[from] ApiError),

    #[error(transparent)]
    Session(#[from] tower_sessions::session::Error),

    /// Boxed, `serenity::Error` is large.
    #[error(transparent)]
    Discord(#[from] Box<serenity::Error>),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<serenity::Error> for WebError {
    fn from(err: serenity::Error) -> Self {
        WebError::Discord(Box::new(err))
    }
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        match self {
            WebError::Unauthenticated => StatusCode::UNAUTHORIZED,
            WebError::Forbidden(_) => StatusCode::FORBIDDEN,
            WebError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WebError::NotFound(_) => StatusCode::NOT_FOUND,
            WebError::BotNotReady => StatusCode::SERVICE_UNAVAILABLE,
            WebError::OAuth(_) => StatusCode::BAD_GATEWAY,
            // An expired or revoked user token: the client has to log in again.
            WebError::Upstream(e) if e.status() == Some(401) => StatusCode::UNAUTHORIZED,
            WebError::Upstream(_) => StatusCode::BAD_GATEWAY,
            WebError::Session(_) | WebError::Discord(_) | WebError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            WebError::Upstream(e) => {
                error!("Discord API failure: {}", e);
                json!({ "error": "Discord API request failed", "details": e.to_string() })
            }
            WebError::OAuth(msg) => {
                error!("OAuth2 failure: {}", msg);
                json!({ "error": self.to_string() })
            }
            WebError::Session(_) | WebError::Discord(_) | WebError::Internal(_) => {
                error!("Internal error: {:#}", self);
                json!({ "error": "Internal server error" })
            }
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
