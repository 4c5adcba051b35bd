//! Fire-and-forget mirroring of captured requests to a downstream service

use std::sync::Arc;
use std::time::Duration;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::HOST;
use hyper::{HeaderMap, Method, Request, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{Result, SinkError};

/// A captured request to replay downstream
#[derive(Debug, Clone)]
pub struct MirrorRequest {
    /// HTTP method
    pub method: Method,
    /// Path plus raw query string, e.g. `/v3/mail/send?to=a`
    pub path_and_query: String,
    /// Original request headers
    pub headers: HeaderMap,
    /// Fully buffered body
    pub body: Bytes,
}

/// Best-effort forwarder to a configured base URL
///
/// Every send is attempted at most once. Failures are logged and never
/// reach the original caller.
#[derive(Clone)]
pub struct Mirror {
    client: Client<HttpConnector, Full<Bytes>>,
    base_url: Arc<str>,
    timeout: Option<Duration>,
}

impl Mirror {
    /// Create a mirror targeting `base_url`
    #[must_use]
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build_http();

        Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            timeout,
        }
    }

    /// Downstream base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Mirror a request on a detached task
    ///
    /// The returned handle may be dropped; the send still runs to completion.
    pub fn send(&self, request: MirrorRequest) -> JoinHandle<()> {
        let mirror = self.clone();

        tokio::spawn(async move {
            match mirror.forward(request).await {
                Ok(status) => info!("proxy response status code: {}", status.as_u16()),
                Err(e) => warn!("proxy error: {}", e),
            }
        })
    }

    /// Deliver one request downstream and report its status
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::MirrorDelivery`] if the request cannot be built,
    /// sent, or does not complete within the configured timeout
    pub async fn forward(&self, request: MirrorRequest) -> Result<StatusCode> {
        let uri = build_uri(&self.base_url, &request.path_and_query)?;
        debug!("Mirroring {} to {}", request.method, uri);

        let mut builder = Request::builder().method(request.method).uri(uri);
        for (name, value) in &request.headers {
            // the downstream host comes from the base URL
            if *name != HOST {
                builder = builder.header(name, value);
            }
        }

        let outgoing = builder
            .body(Full::new(request.body))
            .map_err(|e| SinkError::MirrorDelivery(format!("Failed to build request: {e}")))?;

        let pending = self.client.request(outgoing);
        let response = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, pending).await.map_err(|_| {
                SinkError::MirrorDelivery(format!(
                    "timed out after {}",
                    humantime::format_duration(timeout)
                ))
            })?,
            None => pending.await,
        }
        .map_err(|e| SinkError::MirrorDelivery(format!("Request failed: {e}")))?;

        let status = response.status();

        // drain so the connection returns to the pool
        if let Err(e) = response.into_body().collect().await {
            debug!("Failed to read mirror response body: {}", e);
        }

        Ok(status)
    }
}

/// Join the base URL and the captured path
fn build_uri(base_url: &str, path_and_query: &str) -> Result<Uri> {
    let uri = if path_and_query.starts_with('/') || path_and_query.is_empty() {
        format!("{base_url}{path_and_query}")
    } else {
        format!("{base_url}/{path_and_query}")
    };

    uri.parse::<Uri>()
        .map_err(|e| SinkError::MirrorDelivery(format!("Invalid URI '{uri}': {e}")))
}
