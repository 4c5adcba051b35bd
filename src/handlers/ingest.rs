//! Capture of inbound requests

use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Request, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::CannedResponse;
use crate::mirror::MirrorRequest;
use crate::network::{HttpHandler, SinkResponse};
use crate::recipients::extract_recipients;
use crate::store::{CapturedHeaders, CapturedRequest};
use crate::SinkError;

use super::AppState;

/// Acknowledgement for an accepted capture
#[derive(Debug, Serialize)]
struct Ack {
    message: &'static str,
    index: u64,
}

/// Canned response converted to HTTP parts once at startup
#[derive(Debug, Clone)]
pub struct CannedReply {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl CannedReply {
    fn to_response(&self) -> SinkResponse {
        let mut response = HttpHandler::create_response(self.status, self.body.clone());
        response.headers_mut().extend(self.headers.clone());
        response
    }
}

impl TryFrom<&CannedResponse> for CannedReply {
    type Error = SinkError;

    fn try_from(config: &CannedResponse) -> Result<Self, Self::Error> {
        let status = StatusCode::from_u16(config.status).map_err(|e| {
            SinkError::ConfigError(format!("Invalid response status {}: {e}", config.status))
        })?;

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::try_from(name.as_str()).map_err(|e| {
                SinkError::ConfigError(format!("Invalid response header name '{name}': {e}"))
            })?;
            let value = HeaderValue::try_from(value.as_str()).map_err(|e| {
                SinkError::ConfigError(format!("Invalid response header value '{value}': {e}"))
            })?;
            headers.append(name, value);
        }

        Ok(Self {
            status,
            headers,
            body: Bytes::from(config.body.clone()),
        })
    }
}

/// Capture one inbound request
///
/// The body is fully buffered before anything else so the same bytes can be
/// stored and mirrored. A rejected capture leaves the store untouched.
pub async fn handle_ingest<B>(req: Request<B>, state: &AppState) -> SinkResponse
where
    B: hyper::body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = req.into_parts();

    if let Err(e) = HttpHandler::validate_request(&parts.headers, state.max_request_size) {
        warn!("Rejecting {} {}: {}", parts.method, parts.uri, e);
        return HttpHandler::error_response(&e);
    }

    let body = match HttpHandler::read_body(body, state.max_request_size).await {
        Ok(body) => body,
        Err(e) => {
            warn!("Rejecting {} {}: {}", parts.method, parts.uri, e);
            return HttpHandler::error_response(&e);
        }
    };

    let path_and_query = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path().to_string(), |pq| pq.as_str().to_string());

    let captured = CapturedRequest::new(
        parts.method.as_str(),
        path_and_query.clone(),
        CapturedHeaders::from_header_map(&parts.headers),
        body.clone(),
        extract_recipients(parts.uri.query(), &parts.headers),
    );

    let index = match state.store.append(captured).await {
        Ok(index) => index,
        Err(e) => return HttpHandler::error_response(&e),
    };

    if let Some(mirror) = &state.mirror {
        debug!("Mirroring request {} to {}", index, mirror.base_url());
        // detached, the response does not wait for it
        mirror.send(MirrorRequest {
            method: parts.method,
            path_and_query,
            headers: parts.headers,
            body,
        });
    }

    match &state.canned {
        Some(canned) => canned.to_response(),
        None => HttpHandler::json_response(
            StatusCode::OK,
            &Ack {
                message: "success",
                index,
            },
        ),
    }
}
