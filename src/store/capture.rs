//! Captured request record

use std::time::Instant;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use hyper::HeaderMap;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

use crate::recipients::normalize;

/// Header multi-map in first-seen order, names lower-cased
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedHeaders(Vec<(String, Vec<String>)>);

impl CapturedHeaders {
    /// Copy every header of a request, keeping repeated values in order
    #[must_use]
    pub fn from_header_map(headers: &HeaderMap) -> Self {
        let entries = headers
            .keys()
            .map(|name| {
                let values = headers
                    .get_all(name)
                    .iter()
                    .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
                    .collect();
                (name.as_str().to_string(), values)
            })
            .collect();

        Self(entries)
    }

    /// All values of a header, matched case-insensitively
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
    }

    /// First value of a header
    #[must_use]
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Number of distinct header names
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no headers were captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for CapturedHeaders {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, values) in &self.0 {
            map.serialize_entry(name, values)?;
        }
        map.end()
    }
}

/// One captured inbound request
///
/// Immutable once handed to the store. `id` is assigned by
/// [`CaptureStore::append`](super::CaptureStore::append).
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub(crate) id: u64,
    method: String,
    url: String,
    headers: CapturedHeaders,
    body: Bytes,
    recipients: Vec<String>,
    received_at: Instant,
}

impl CapturedRequest {
    /// Create a record stamped with the current instant
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        headers: CapturedHeaders,
        body: Bytes,
        recipients: Vec<String>,
    ) -> Self {
        Self {
            id: 0,
            method: method.into(),
            url: url.into(),
            headers,
            body,
            recipients: recipients.iter().map(|r| normalize(r)).collect(),
            received_at: Instant::now(),
        }
    }

    /// Override the capture instant
    #[must_use]
    pub fn received_at(mut self, at: Instant) -> Self {
        self.received_at = at;
        self
    }

    /// Stable 1-based id, 0 until stored
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// HTTP method
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Path including the raw query string
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Captured headers
    #[must_use]
    pub fn headers(&self) -> &CapturedHeaders {
        &self.headers
    }

    /// Raw body bytes
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Recipients extracted at ingest, lower-cased
    #[must_use]
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// Whether `address` is one of the recipients, ignoring case
    #[must_use]
    pub fn has_recipient(&self, address: &str) -> bool {
        let address = normalize(address);
        self.recipients.iter().any(|recipient| *recipient == address)
    }

    /// Instant the request was captured
    #[must_use]
    pub fn captured_at(&self) -> Instant {
        self.received_at
    }
}

impl Serialize for CapturedRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CapturedRequest", 5)?;
        state.serialize_field("index", &self.id)?;
        state.serialize_field("url", &self.url)?;
        state.serialize_field("method", &self.method)?;
        state.serialize_field("body", &STANDARD.encode(&self.body))?;
        state.serialize_field("headers", &self.headers)?;
        state.end()
    }
}
