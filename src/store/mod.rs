//! Bounded, TTL-evicting store of captured requests
//!
//! A single reader/writer lock guards the live sequence. `append`, `clear`
//! and `evict_expired` take it exclusively, lookups share it.

mod capture;
mod sweeper;

pub use capture::{CapturedHeaders, CapturedRequest};
pub use sweeper::Sweeper;

use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{Result, SinkError};

struct Inner {
    requests: Vec<CapturedRequest>,
    /// Last id handed out; survives `clear` so ids are never reused
    last_id: u64,
}

/// Concurrency-safe store of captured requests
pub struct CaptureStore {
    inner: RwLock<Inner>,
    capacity: usize,
    ttl: Option<Duration>,
}

impl CaptureStore {
    /// Create a store
    ///
    /// `capacity` of 0 means unbounded; a `ttl` of `None` or zero disables eviction.
    #[must_use]
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                requests: Vec::new(),
                last_id: 0,
            }),
            capacity,
            ttl: ttl.filter(|ttl| !ttl.is_zero()),
        }
    }

    /// Create an unbounded store without eviction
    #[must_use]
    pub fn unbounded() -> Self {
        Self::new(0, None)
    }

    /// Configured capacity, 0 when unbounded
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Configured TTL
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Store a request and return its stable id
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::CapacityExceeded`] if the store is full
    pub async fn append(&self, mut request: CapturedRequest) -> Result<u64> {
        let mut inner = self.inner.write().await;

        if self.capacity != 0 && inner.requests.len() >= self.capacity {
            warn!("sink at capacity ({})", self.capacity);
            return Err(SinkError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        inner.last_id += 1;
        request.id = inner.last_id;
        inner.requests.push(request);

        info!("storing request {}", inner.last_id);
        Ok(inner.last_id)
    }

    /// Look up a live request by its 1-based id
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::IndexOutOfRange`] if no live request has that id
    pub async fn get(&self, index: i64) -> Result<CapturedRequest> {
        let Ok(id) = u64::try_from(index) else {
            return Err(SinkError::IndexOutOfRange(index));
        };
        if id == 0 {
            return Err(SinkError::IndexOutOfRange(index));
        }

        let inner = self.inner.read().await;
        debug!("getting index {}", id);

        // ids are strictly increasing in storage order
        inner
            .requests
            .binary_search_by_key(&id, CapturedRequest::id)
            .map(|position| inner.requests[position].clone())
            .map_err(|_| SinkError::IndexOutOfRange(index))
    }

    /// Most recently stored live request
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Empty`] if nothing is stored
    pub async fn last(&self) -> Result<CapturedRequest> {
        let inner = self.inner.read().await;
        inner.requests.last().cloned().ok_or(SinkError::Empty)
    }

    /// All live requests addressed to `address`, in arrival order
    pub async fn by_recipient(&self, address: &str) -> Vec<CapturedRequest> {
        let inner = self.inner.read().await;
        inner
            .requests
            .iter()
            .filter(|request| request.has_recipient(address))
            .cloned()
            .collect()
    }

    /// Drop every live request, returning how many were removed
    ///
    /// The id counter keeps running.
    pub async fn clear(&self) -> usize {
        let mut inner = self.inner.write().await;
        let removed = inner.requests.len();
        inner.requests.clear();

        info!("clearing {} request(s)", removed);
        removed
    }

    /// Evict requests older than the configured TTL
    pub async fn evict_expired(&self, now: Instant) -> usize {
        match self.ttl {
            Some(ttl) => self.evict_expired_with(now, ttl).await,
            None => 0,
        }
    }

    /// Evict every request with `received_at + ttl < now`
    ///
    /// A zero `ttl` is a no-op.
    pub async fn evict_expired_with(&self, now: Instant, ttl: Duration) -> usize {
        if ttl.is_zero() {
            return 0;
        }

        let mut inner = self.inner.write().await;
        let before = inner.requests.len();
        inner.requests.retain(|request| {
            request
                .captured_at()
                .checked_add(ttl)
                .map_or(true, |deadline| deadline >= now)
        });

        let evicted = before - inner.requests.len();
        if evicted > 0 {
            info!("evicted {} expired request(s)", evicted);
        }
        evicted
    }

    /// Number of live requests
    pub async fn len(&self) -> usize {
        self.inner.read().await.requests.len()
    }

    /// Whether the store holds no live requests
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.requests.is_empty()
    }
}

impl Default for CaptureStore {
    fn default() -> Self {
        Self::unbounded()
    }
}
