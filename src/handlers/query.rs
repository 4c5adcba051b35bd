//! Read-only introspection handlers

use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::StatusCode;
use serde::Serialize;

use crate::network::{HttpHandler, SinkResponse};
use crate::recipients::query_pairs;
use crate::store::CapturedRequest;
use crate::SinkError;

use super::AppState;

/// Query parameter naming the index for `GET /requests`
pub const INDEX_PARAM: &str = "index";

/// Body of `GET /requests/recipient/:address`
#[derive(Debug, Serialize)]
pub struct RecipientResponse {
    /// Matching captures in arrival order
    pub requests: Vec<CapturedRequest>,
}

/// `GET /request/:index`
pub async fn handle_get(state: &AppState, raw_index: &str) -> SinkResponse {
    let index = match raw_index.parse::<i64>() {
        Ok(index) => index,
        Err(_) => {
            return HttpHandler::error_response(&SinkError::NotAnInteger(raw_index.to_string()))
        }
    };

    match state.store.get(index).await {
        Ok(request) => HttpHandler::json_response(StatusCode::OK, &request),
        Err(e) => HttpHandler::error_response(&e),
    }
}

/// `GET /request/:index/body`
///
/// Raw captured body, served with the captured content type when it had one.
pub async fn handle_get_body(state: &AppState, raw_index: &str) -> SinkResponse {
    let index = match raw_index.parse::<i64>() {
        Ok(index) => index,
        Err(_) => {
            return HttpHandler::error_response(&SinkError::NotAnInteger(raw_index.to_string()))
        }
    };

    let request = match state.store.get(index).await {
        Ok(request) => request,
        Err(e) => return HttpHandler::error_response(&e),
    };

    let content_type = request
        .headers()
        .first(CONTENT_TYPE.as_str())
        .and_then(|value| HeaderValue::from_str(value).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));

    let mut response = HttpHandler::create_response(StatusCode::OK, request.body().clone());
    response.headers_mut().insert(CONTENT_TYPE, content_type);
    response
}

/// `GET /requests?index=N`
pub async fn handle_get_by_query(state: &AppState, query: Option<&str>) -> SinkResponse {
    let raw_index = query
        .map(query_pairs)
        .unwrap_or_default()
        .into_iter()
        .find(|(key, _)| key == INDEX_PARAM)
        .map(|(_, value)| value)
        .unwrap_or_default();

    handle_get(state, &raw_index).await
}

/// `GET /requests/last`
pub async fn handle_last(state: &AppState) -> SinkResponse {
    match state.store.last().await {
        Ok(request) => HttpHandler::json_response(StatusCode::OK, &request),
        Err(e) => HttpHandler::error_response(&e),
    }
}

/// `GET /requests/recipient/:address`
pub async fn handle_by_recipient(state: &AppState, raw_address: &str) -> SinkResponse {
    let address = urlencoding::decode(raw_address)
        .map_or_else(|_| raw_address.to_string(), |decoded| decoded.into_owned());

    if address.trim().is_empty() {
        return HttpHandler::error_response(&SinkError::MissingParameter("recipient"));
    }

    let requests = state.store.by_recipient(&address).await;
    HttpHandler::json_response(StatusCode::OK, &RecipientResponse { requests })
}

/// `DELETE /requests`
pub async fn handle_clear(state: &AppState) -> SinkResponse {
    state.store.clear().await;
    HttpHandler::empty_response(StatusCode::NO_CONTENT)
}

/// `GET /healthcheck`
pub fn handle_healthcheck() -> SinkResponse {
    HttpHandler::empty_response(StatusCode::NO_CONTENT)
}
