// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// API error type and its HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use printdesk_core::error::{ErrorClass, PrintdeskError};
use printdesk_core::human_errors::humanize_error;

use super::response::Failure;

/// Errors returned by API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A lifecycle, validation or store error.
    #[error(transparent)]
    Desk(#[from] PrintdeskError),

    /// The request body or form could not be read.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("payload too large")]
    PayloadTooLarge,

    #[error("route not found")]
    RouteNotFound,
}

impl ApiError {
    /// HTTP status for this error.
    ///
    /// - Malformed input: 400 Bad Request
    /// - Unknown job or route: 404 Not Found
    /// - Illegal or lost-race transition: 409 Conflict
    /// - Upload over the limit: 413 Payload Too Large
    /// - Anything from the stores or printer: 500 Internal Server Error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Desk(PrintdeskError::NotFound(_)) | Self::RouteNotFound => StatusCode::NOT_FOUND,
            Self::Desk(err) => match err.class() {
                ErrorClass::Client => StatusCode::BAD_REQUEST,
                ErrorClass::Conflict => StatusCode::CONFLICT,
                ErrorClass::Transient | ErrorClass::Permanent => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// Message safe to send to the client.
    pub fn public_message(&self) -> String {
        match self {
            Self::Desk(err) => humanize_error(err).message,
            Self::BadRequest(detail) => detail.clone(),
            Self::PayloadTooLarge => "Uploaded file is too large".to_owned(),
            Self::RouteNotFound => "Route not found".to_owned(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "request rejected");
        }

        let message = self.public_message();
        let body = Failure {
            success: false,
            error: &message,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use printdesk_core::types::{JobId, JobStatus};

    use super::*;

    #[test]
    fn error_status_codes() {
        let id = JobId::new();
        assert_eq!(
            ApiError::from(PrintdeskError::NotFound(id)).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(PrintdeskError::InvalidInput("bad copies".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(PrintdeskError::InvalidTransition {
                from: JobStatus::Done,
                to: JobStatus::Approved,
            })
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(PrintdeskError::ConcurrentConflict {
                id,
                expected: JobStatus::Pending,
            })
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(PrintdeskError::TransientStore("database is locked".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(PrintdeskError::Database("disk full".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::RouteNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::PayloadTooLarge.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn error_responses_do_not_leak_details() {
        let err = ApiError::from(PrintdeskError::Database("no such table: jobs".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        let message = json["error"].as_str().unwrap();
        assert!(!message.contains("jobs"));
        assert!(!message.contains("table"));
    }
}
