//! The local notification facility.
//!
//! `NotificationCenter` is the narrow interface the scheduler talks to.
//! `InMemoryNotificationCenter` keeps requests in memory and can replay
//! deliveries for a time window, which is enough for tests and headless use.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;

use crate::content::NotificationContent;
use crate::trigger::FireSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    /// The user has never been asked
    NotDetermined,
    Denied,
    Authorized,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRequest {
    pub identifier: String,
    pub content: NotificationContent,
    pub fire: FireSpec,
    pub repeats: bool,
}

#[derive(Debug, Error)]
pub enum CenterError {
    #[error("Invalid trigger for {identifier}: {reason}")]
    InvalidTrigger { identifier: String, reason: String },
    #[error("Notification service unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait NotificationCenter: Send + Sync {
    async fn authorization_status(&self) -> AuthorizationStatus;

    /// Ask the user; returns whether permission was granted.
    async fn request_authorization(&self) -> Result<bool, CenterError>;

    /// Register a request, replacing any pending one with the same identifier.
    async fn add(&self, request: NotificationRequest) -> Result<(), CenterError>;

    async fn remove_pending(&self, identifiers: &[String]);

    async fn remove_delivered(&self, identifiers: &[String]);

    async fn pending(&self) -> Vec<NotificationRequest>;
}

#[derive(Debug)]
pub struct InMemoryNotificationCenter {
    status: Mutex<AuthorizationStatus>,
    grant_on_request: bool,
    authorization_requests: AtomicU32,
    pending: Mutex<Vec<NotificationRequest>>,
    delivered: Mutex<Vec<NotificationRequest>>,
    rejected: Mutex<HashSet<String>>,
}

impl Default for InMemoryNotificationCenter {
    fn default() -> Self {
        Self::new(AuthorizationStatus::Authorized)
    }
}

impl InMemoryNotificationCenter {
    pub fn new(status: AuthorizationStatus) -> Self {
        Self {
            status: Mutex::new(status),
            grant_on_request: true,
            authorization_requests: AtomicU32::new(0),
            pending: Mutex::new(Vec::new()),
            delivered: Mutex::new(Vec::new()),
            rejected: Mutex::new(HashSet::new()),
        }
    }

    /// Answer for the next authorization prompt.
    pub fn granting(mut self, grant: bool) -> Self {
        self.grant_on_request = grant;
        self
    }

    /// Refuse any future `add` for `identifier`.
    pub fn reject(&self, identifier: impl Into<String>) {
        self.rejected.lock().insert(identifier.into());
    }

    pub fn authorization_requests(&self) -> u32 {
        self.authorization_requests.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> Vec<NotificationRequest> {
        self.delivered.lock().clone()
    }

    /// Deliver every request with a fire time in `(since, until]`.
    ///
    /// One-shot requests leave the pending list once delivered; repeating
    /// ones stay. Returns the delivered identifiers.
    pub fn deliver_due(&self, since: NaiveDateTime, until: NaiveDateTime) -> Vec<String> {
        let mut pending = self.pending.lock();
        let mut delivered = self.delivered.lock();
        let mut fired = Vec::new();

        pending.retain(|request| {
            let due = request
                .fire
                .next_fire_after(since)
                .is_some_and(|at| at <= until);
            if !due {
                return true;
            }
            tracing::debug!("Delivering {}", request.identifier);
            fired.push(request.identifier.clone());
            delivered.retain(|d| d.identifier != request.identifier);
            delivered.push(request.clone());
            request.repeats
        });

        fired
    }
}

#[async_trait]
impl NotificationCenter for InMemoryNotificationCenter {
    async fn authorization_status(&self) -> AuthorizationStatus {
        *self.status.lock()
    }

    async fn request_authorization(&self) -> Result<bool, CenterError> {
        self.authorization_requests.fetch_add(1, Ordering::SeqCst);
        let mut status = self.status.lock();
        if *status == AuthorizationStatus::NotDetermined {
            *status = if self.grant_on_request {
                AuthorizationStatus::Authorized
            } else {
                AuthorizationStatus::Denied
            };
        }
        Ok(*status == AuthorizationStatus::Authorized)
    }

    async fn add(&self, request: NotificationRequest) -> Result<(), CenterError> {
        if self.rejected.lock().contains(&request.identifier) {
            return Err(CenterError::Unavailable(format!(
                "{} was refused",
                request.identifier
            )));
        }
        if !request.fire.is_valid() {
            return Err(CenterError::InvalidTrigger {
                identifier: request.identifier,
                reason: format!("{:?} is not a valid time", request.fire),
            });
        }

        let mut pending = self.pending.lock();
        pending.retain(|p| p.identifier != request.identifier);
        pending.push(request);
        Ok(())
    }

    async fn remove_pending(&self, identifiers: &[String]) {
        self.pending
            .lock()
            .retain(|p| !identifiers.contains(&p.identifier));
    }

    async fn remove_delivered(&self, identifiers: &[String]) {
        self.delivered
            .lock()
            .retain(|d| !identifiers.contains(&d.identifier));
    }

    async fn pending(&self) -> Vec<NotificationRequest> {
        self.pending.lock().clone()
    }
}
