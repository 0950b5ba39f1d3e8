//! Current-position lookup.
//!
//! The platform position facility is callback based. Each lookup gets a
//! unique `PositionToken`; the waiting caller holds a oneshot receiver and
//! the platform side resolves it with `PositionRequests::complete`.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::geocode::ReverseGeocoder;
use crate::types::{Coordinates, Location, LocationError};

type PositionResult = Result<Coordinates, LocationError>;

/// Correlates a position request with its completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositionToken(u64);

impl std::fmt::Display for PositionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position-{}", self.0)
    }
}

/// Outstanding position requests keyed by token.
#[derive(Debug, Default)]
pub struct PositionRequests {
    next: AtomicU64,
    pending: Mutex<HashMap<PositionToken, oneshot::Sender<PositionResult>>>,
}

impl PositionRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new request.
    pub fn request(&self) -> (PositionToken, oneshot::Receiver<PositionResult>) {
        let token = PositionToken(self.next.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(token, tx);
        (token, rx)
    }

    /// Resolve a request. Returns false for unknown or already completed tokens.
    pub fn complete(&self, token: PositionToken, result: PositionResult) -> bool {
        let Some(tx) = self.pending.lock().remove(&token) else {
            tracing::debug!("Ignoring completion for unknown {}", token);
            return false;
        };
        // The waiter may have timed out and dropped its receiver
        tx.send(result).is_ok()
    }

    /// Drop a request without resolving it.
    pub fn abandon(&self, token: PositionToken) {
        self.pending.lock().remove(&token);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

/// Platform position facility.
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Start a one-shot position lookup for `token`.
    ///
    /// The result is delivered later through `requests.complete(token, ..)`.
    /// An error here (e.g. permission denied) fails the lookup immediately.
    async fn begin(
        &self,
        token: PositionToken,
        requests: Arc<PositionRequests>,
    ) -> Result<(), LocationError>;
}

/// Wait for one position fix.
pub async fn request_position<S: PositionSource + ?Sized>(
    requests: &Arc<PositionRequests>,
    source: &S,
    timeout: Duration,
) -> Result<Coordinates, LocationError> {
    let (token, rx) = requests.request();
    if let Err(e) = source.begin(token, Arc::clone(requests)).await {
        requests.abandon(token);
        return Err(e);
    }

    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(LocationError::ServiceUnavailable),
        Err(_) => {
            tracing::warn!("Position request {} timed out after {:?}", token, timeout);
            requests.abandon(token);
            Err(LocationError::Timeout)
        }
    }
}

/// Current position as a `Location`, reverse geocoded when possible.
pub async fn current_location<S: PositionSource + ?Sized>(
    requests: &Arc<PositionRequests>,
    source: &S,
    geocoder: &ReverseGeocoder,
    timeout: Duration,
    fallback_name: &str,
) -> Result<Location, LocationError> {
    let coords = request_position(requests, source, timeout).await?;
    tracing::info!(
        "Got position {:.4},{:.4}",
        coords.latitude,
        coords.longitude
    );
    Ok(geocoder.locate(coords, fallback_name).await)
}
