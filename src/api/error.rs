//! Boundary error mapping: every rejection becomes a status code and a
//! `{"error": "..."}` body. Nothing propagates past the handler.

use crate::{
    broker::{challenge, exchange},
    providers::ProviderError,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Debug)]
pub struct ErrorBody {
    error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unavailable(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Provider(ProviderError::Rejected(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Provider(ProviderError::Unreachable(_)) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Provider(err @ ProviderError::Unreachable(_)) => {
                error!("provider call failed: {err}");
                "provider unreachable".to_string()
            }
            Self::Internal(err) => {
                error!("internal error: {err:#}");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<challenge::Rejected> for ApiError {
    fn from(rejected: challenge::Rejected) -> Self {
        match rejected {
            challenge::Rejected::MalformedInput(_) => Self::BadRequest(rejected.to_string()),
            challenge::Rejected::NoOrExpiredNonce | challenge::Rejected::BadSignature => {
                Self::Forbidden(rejected.to_string())
            }
        }
    }
}

impl From<exchange::Rejected> for ApiError {
    fn from(rejected: exchange::Rejected) -> Self {
        match rejected {
            exchange::Rejected::MissingCode => Self::BadRequest(rejected.to_string()),
            exchange::Rejected::Unauthorized | exchange::Rejected::InvalidOrExpired => {
                Self::Forbidden(rejected.to_string())
            }
        }
    }
}
