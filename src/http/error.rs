//! Error normalization for the HTTP surface.
//!
//! Every failure leaves as `{"error": <key>, "error_description": <message>}`
//! with a matching status. Validation failures add `"errors": [...]`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::composite::CompositeError;
use crate::throttling::{RateLimitHeaders, ThrottleError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("The request body is invalid.")]
    Validation(Vec<String>),

    #[error(transparent)]
    Throttle(#[from] ThrottleError),

    #[error(transparent)]
    Composite(#[from] CompositeError),
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    error_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a [String]>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Throttle(e) => match e {
                ThrottleError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
                ThrottleError::MissingKey(_) => StatusCode::BAD_REQUEST,
                ThrottleError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
                ThrottleError::UnsupportedRate { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Composite(e) => match e {
                CompositeError::UnresolvedToken { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Machine-readable error key.
    pub fn error_key(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "bad_request",
            ApiError::Throttle(e) => match e {
                ThrottleError::TooManyRequests { .. } => "too_many_requests",
                ThrottleError::MissingKey(_) => "invalid_request",
                ThrottleError::Store(_) => "service_unavailable",
                ThrottleError::UnsupportedRate { .. } => "internal_error",
            },
            ApiError::Composite(e) => match e {
                CompositeError::UnresolvedToken { .. } => "unresolved_token",
                _ => "internal_error",
            },
        }
    }

    fn rate_limit_headers(&self) -> Option<&RateLimitHeaders> {
        match self {
            ApiError::Throttle(ThrottleError::TooManyRequests { headers, .. }) => Some(headers),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        }

        let body = ErrorBody {
            error: self.error_key(),
            error_description: self.to_string(),
            errors: match &self {
                ApiError::Validation(errors) => Some(errors.as_slice()),
                _ => None,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(headers) = self.rate_limit_headers() {
            headers.apply(response.headers_mut());
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::throttling::ThrottleKind;
    use serde_json::{json, Value};

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_validation_lists_errors() {
        let response = ApiError::Validation(vec!["/a: method is required".into()]).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({
                "error": "bad_request",
                "error_description": "The request body is invalid.",
                "errors": ["/a: method is required"],
            })
        );
    }

    #[tokio::test]
    async fn test_too_many_requests_carries_headers() {
        let error = ThrottleError::TooManyRequests {
            throttle_type: ThrottleKind::Ip,
            headers: RateLimitHeaders::new(60, 0, Some(60), 1_000),
        };
        let response = ApiError::from(error).into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "60");
        assert_eq!(response.headers()["x-ratelimit-reset"], "1060");
        assert_eq!(
            body_json(response).await,
            json!({"error": "too_many_requests", "error_description": "Too Many Requests."})
        );
    }

    #[test]
    fn test_status_mapping() {
        let unresolved = ApiError::from(CompositeError::UnresolvedToken {
            reference_id: "item".into(),
            path: "search.data.0.id".into(),
        });
        assert_eq!(unresolved.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(unresolved.error_key(), "unresolved_token");

        let missing_ref = ApiError::from(CompositeError::MissingReferenceId { uri: "/x".into() });
        assert_eq!(missing_ref.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let store = ApiError::from(ThrottleError::Store("down".into()));
        assert_eq!(store.status(), StatusCode::SERVICE_UNAVAILABLE);

        let missing_key = ApiError::from(ThrottleError::MissingKey("authorization header".into()));
        assert_eq!(missing_key.status(), StatusCode::BAD_REQUEST);
        assert_eq!(missing_key.error_key(), "invalid_request");
    }
}
