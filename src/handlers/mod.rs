//! Request routing for the sink
//!
//! Introspection calls are matched on exact method and path shape; every
//! other request is captured.

mod ingest;
mod query;

pub use ingest::{handle_ingest, CannedReply};
pub use query::{
    handle_by_recipient, handle_clear, handle_get, handle_get_body, handle_get_by_query,
    handle_healthcheck, handle_last, RecipientResponse,
};

use std::convert::Infallible;
use std::sync::Arc;

use hyper::{Method, Request};
use tracing::debug;

use crate::config::Config;
use crate::mirror::Mirror;
use crate::network::SinkResponse;
use crate::store::CaptureStore;
use crate::Result;

/// Shared state injected into every handler
pub struct AppState {
    /// Capture store
    pub store: Arc<CaptureStore>,
    /// Downstream mirror, when a proxy URL is configured
    pub mirror: Option<Mirror>,
    /// Fixed reply for accepted captures
    pub canned: Option<CannedReply>,
    /// Maximum request body size in bytes
    pub max_request_size: usize,
}

impl AppState {
    /// Build handler state from configuration around an existing store
    ///
    /// # Errors
    ///
    /// Returns error if the canned response cannot be turned into HTTP parts
    pub fn from_config(config: &Config, store: Arc<CaptureStore>) -> Result<Self> {
        let mirror = config
            .proxy
            .as_deref()
            .map(|proxy| Mirror::new(proxy, config.mirror_timeout));

        let canned = config
            .response
            .as_ref()
            .map(CannedReply::try_from)
            .transpose()?;

        Ok(Self {
            store,
            mirror,
            canned,
            max_request_size: config.limits.max_request_size,
        })
    }
}

/// Parsed introspection route
#[derive(Debug, PartialEq, Eq)]
enum Route<'a> {
    /// GET /healthcheck
    Healthcheck,
    /// DELETE /requests
    Clear,
    /// GET /requests?index=N
    IndexQuery,
    /// GET /request/:index
    Index(&'a str),
    /// GET /request/:index/body
    Body(&'a str),
    /// GET /requests/last
    Last,
    /// GET /requests/recipient/:address
    Recipient(&'a str),
    /// Anything else
    Ingest,
}

impl<'a> Route<'a> {
    fn parse(method: &Method, path: &'a str) -> Self {
        match (method, path) {
            (&Method::GET, "/healthcheck") => return Route::Healthcheck,
            (&Method::DELETE, "/requests") => return Route::Clear,
            (&Method::GET, "/requests") => return Route::IndexQuery,
            (&Method::GET, "/requests/last") => return Route::Last,
            (&Method::GET, "/requests/recipient") => return Route::Recipient(""),
            _ => {}
        }

        if *method != Method::GET {
            return Route::Ingest;
        }

        if let Some(rest) = path.strip_prefix("/request/") {
            match rest.split_once('/') {
                None if !rest.is_empty() => return Route::Index(rest),
                Some((index, "body")) if !index.is_empty() => return Route::Body(index),
                _ => {}
            }
        }

        if let Some(address) = path.strip_prefix("/requests/recipient/") {
            if !address.contains('/') {
                return Route::Recipient(address);
            }
        }

        Route::Ingest
    }
}

/// Main request router
///
/// # Errors
///
/// Never fails; every outcome is rendered as an HTTP response
pub async fn route_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> std::result::Result<SinkResponse, Infallible>
where
    B: hyper::body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let route = Route::parse(&method, &path);
    debug!("{} {} -> {:?}", method, path, route);

    let response = match route {
        Route::Healthcheck => handle_healthcheck(),
        Route::Clear => handle_clear(&state).await,
        Route::IndexQuery => handle_get_by_query(&state, req.uri().query()).await,
        Route::Index(index) => handle_get(&state, index).await,
        Route::Body(index) => handle_get_body(&state, index).await,
        Route::Last => handle_last(&state).await,
        Route::Recipient(address) => handle_by_recipient(&state, address).await,
        Route::Ingest => handle_ingest(req, &state).await,
    };

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_parse_introspection() {
        assert_eq!(
            Route::parse(&Method::GET, "/healthcheck"),
            Route::Healthcheck
        );
        assert_eq!(Route::parse(&Method::DELETE, "/requests"), Route::Clear);
        assert_eq!(Route::parse(&Method::GET, "/requests"), Route::IndexQuery);
        assert_eq!(Route::parse(&Method::GET, "/requests/last"), Route::Last);
        assert_eq!(Route::parse(&Method::GET, "/request/12"), Route::Index("12"));
        assert_eq!(
            Route::parse(&Method::GET, "/request/12/body"),
            Route::Body("12")
        );
        assert_eq!(
            Route::parse(&Method::GET, "/requests/recipient/a@x.com"),
            Route::Recipient("a@x.com")
        );
        assert_eq!(
            Route::parse(&Method::GET, "/requests/recipient/"),
            Route::Recipient("")
        );
        assert_eq!(
            Route::parse(&Method::GET, "/requests/recipient"),
            Route::Recipient("")
        );
    }

    #[test]
    fn test_route_parse_ingest() {
        assert_eq!(Route::parse(&Method::POST, "/requests"), Route::Ingest);
        assert_eq!(Route::parse(&Method::POST, "/request/1"), Route::Ingest);
        assert_eq!(Route::parse(&Method::DELETE, "/request/1"), Route::Ingest);
        assert_eq!(Route::parse(&Method::GET, "/request/1/extra"), Route::Ingest);
        assert_eq!(Route::parse(&Method::GET, "/request/"), Route::Ingest);
        assert_eq!(Route::parse(&Method::GET, "/request//body"), Route::Ingest);
        assert_eq!(Route::parse(&Method::POST, "/request/1/body"), Route::Ingest);
        assert_eq!(Route::parse(&Method::GET, "/v3/mail/send"), Route::Ingest);
        assert_eq!(Route::parse(&Method::PUT, "/healthcheck"), Route::Ingest);
        assert_eq!(Route::parse(&Method::GET, "/"), Route::Ingest);
    }
}
