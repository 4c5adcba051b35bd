//! HTTP response helpers and body handling

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{HeaderMap, Response, StatusCode};
use serde::Serialize;
use tracing::error;

use crate::{Result, SinkError};

/// Response type produced by every handler
pub type SinkResponse = Response<Full<Bytes>>;

fn application_json() -> HeaderValue {
    HeaderValue::from_static("application/json")
}

/// Error envelope: `{"errors":[{"message": ...}]}`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Reported errors
    pub errors: Vec<ErrorDetail>,
}

/// Individual error detail
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Human readable message
    pub message: String,
}

/// Stateless helpers shared by the handlers
pub struct HttpHandler;

impl HttpHandler {
    /// Create a response with a raw body
    #[must_use]
    pub fn create_response(status: StatusCode, body: impl Into<Bytes>) -> SinkResponse {
        let mut response = Response::new(Full::new(body.into()));
        *response.status_mut() = status;
        response
    }

    /// Create an empty JSON response
    #[must_use]
    pub fn empty_response(status: StatusCode) -> SinkResponse {
        let mut response = Self::create_response(status, Bytes::new());
        response.headers_mut().insert(CONTENT_TYPE, application_json());
        response
    }

    /// Serialize `value` as the JSON body of a response
    #[must_use]
    pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> SinkResponse {
        match serde_json::to_vec(value) {
            Ok(body) => {
                let mut response = Self::create_response(status, body);
                response.headers_mut().insert(CONTENT_TYPE, application_json());
                response
            }
            Err(e) => {
                error!("Failed to encode response: {}", e);
                Self::error_response(&SinkError::Other(format!("failed to encode response: {e}")))
            }
        }
    }

    /// Create an error response with the JSON envelope
    #[must_use]
    pub fn error_response(error: &SinkError) -> SinkResponse {
        let envelope = ErrorResponse {
            errors: vec![ErrorDetail {
                message: error.to_string(),
            }],
        };

        // the envelope itself always encodes
        let body = serde_json::to_vec(&envelope).unwrap_or_default();
        let mut response = Self::create_response(error.status(), body);
        response.headers_mut().insert(CONTENT_TYPE, application_json());
        response
    }

    /// Reject a request whose declared length exceeds the limit
    ///
    /// # Errors
    ///
    /// Returns error if the content length is over `max_size`
    pub fn validate_request(headers: &HeaderMap, max_size: usize) -> Result<()> {
        if let Some(content_length) = headers.get(CONTENT_LENGTH) {
            if let Ok(length_str) = content_length.to_str() {
                if let Ok(length) = length_str.parse::<usize>() {
                    if length > max_size {
                        return Err(SinkError::DataTooLarge {
                            size: length,
                            limit: max_size,
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// Read request body with size limit
    ///
    /// # Errors
    ///
    /// Returns error if body is too large or read fails
    pub async fn read_body<B>(body: B, max_size: usize) -> Result<Bytes>
    where
        B: hyper::body::Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let collected = http_body_util::Limited::new(body, max_size)
            .collect()
            .await
            .map_err(|e| {
                if e.downcast_ref::<http_body_util::LengthLimitError>().is_some() {
                    SinkError::DataTooLarge {
                        size: max_size + 1,
                        limit: max_size,
                    }
                } else {
                    SinkError::Other(format!("Failed to read body: {e}"))
                }
            })?;

        Ok(collected.to_bytes())
    }
}
