// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping of engine errors onto HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use parley_core::{AuthFailure, ParleyError};
use serde::Serialize;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A [`ParleyError`] on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub ParleyError);

impl From<ParleyError> for ApiError {
    fn from(e: ParleyError) -> Self {
        Self(e)
    }
}

/// Status code for an engine error.
pub fn status_for(error: &ParleyError) -> StatusCode {
    match error {
        ParleyError::Validation(_) => StatusCode::BAD_REQUEST,
        ParleyError::NotFound(_)
        | ParleyError::Configuration(_)
        | ParleyError::UnknownProvider { .. } => StatusCode::NOT_FOUND,
        ParleyError::Auth(AuthFailure::Token) => StatusCode::UNAUTHORIZED,
        ParleyError::Auth(AuthFailure::Header) | ParleyError::Blacklisted { .. } => {
            StatusCode::FORBIDDEN
        }
        ParleyError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        ParleyError::Provider { .. } | ParleyError::Timeout { .. } => StatusCode::BAD_GATEWAY,
        ParleyError::Storage { .. } | ParleyError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        // Store and internal details stay in the log.
        let error = if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
            "internal error".to_string()
        } else {
            self.0.to_string()
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_errors_map_to_4xx() {
        assert_eq!(
            status_for(&ParleyError::Validation("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ParleyError::UnknownProvider { name: "x".into() }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&ParleyError::Blacklisted { address: "+1".into() }),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(&ParleyError::RateLimited {
                tenant_id: 1,
                window_minutes: 1,
                max_messages: 5
            }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_for(&ParleyError::Auth(AuthFailure::Token)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(&ParleyError::Auth(AuthFailure::Header)),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn upstream_failures_map_to_bad_gateway() {
        assert_eq!(status_for(&ParleyError::provider("down")), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_for(&ParleyError::Timeout {
                duration: std::time::Duration::from_secs(5)
            }),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn internal_details_are_not_leaked() {
        let response = ApiError(ParleyError::Internal("db path /secret".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
