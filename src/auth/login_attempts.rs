//! Background writer for the login-attempt audit log
//!
//! Handlers hand records to a bounded channel and return immediately; a
//! single task drains the channel into the repository. A full queue drops
//! the record rather than delaying the login response.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::HeaderMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::LoginAttempt;
use crate::persist::LoginAttemptRepository;

/// Headers never written to the audit log
const REDACTED_HEADERS: [&str; 2] = ["authorization", "cookie"];

/// Request details attached to a login attempt
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub host_addr: Option<String>,
    pub headers: BTreeMap<String, Vec<String>>,
}

impl RequestMeta {
    pub fn from_headers(host_addr: Option<String>, headers: &HeaderMap) -> Self {
        let mut collected: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in headers {
            if REDACTED_HEADERS.contains(&name.as_str()) {
                continue;
            }
            if let Ok(value) = value.to_str() {
                collected
                    .entry(name.as_str().to_string())
                    .or_default()
                    .push(value.to_string());
            }
        }

        Self {
            host_addr,
            headers: collected,
        }
    }
}

/// Sending half of the audit channel
#[derive(Clone)]
pub struct LoginAttemptRecorder {
    sender: mpsc::Sender<LoginAttempt>,
}

/// Owns the drain task; await `shutdown` to flush queued records
pub struct LoginAttemptWorker {
    handle: JoinHandle<()>,
}

impl LoginAttemptRecorder {
    /// Spawn the drain task on the current runtime
    pub fn spawn(
        repository: Arc<dyn LoginAttemptRepository>,
        capacity: usize,
    ) -> (Self, LoginAttemptWorker) {
        let (sender, mut receiver) = mpsc::channel::<LoginAttempt>(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(attempt) = receiver.recv().await {
                let address = attempt.address.clone();
                if let Err(e) = repository.create(attempt).await {
                    tracing::error!(%address, error = %e, "Failed to store login attempt");
                }
            }
            tracing::debug!("Login attempt recorder drained");
        });

        (Self { sender }, LoginAttemptWorker { handle })
    }

    /// Queue a record without waiting
    pub fn record(&self, attempt: LoginAttempt) {
        match self.sender.try_send(attempt) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(attempt)) => {
                tracing::warn!(address = %attempt.address, "Login attempt queue full, dropping record");
            }
            Err(mpsc::error::TrySendError::Closed(attempt)) => {
                tracing::warn!(address = %attempt.address, "Login attempt recorder stopped, dropping record");
            }
        }
    }
}

impl LoginAttemptWorker {
    /// Wait for queued records to be written.
    ///
    /// The task ends once every `LoginAttemptRecorder` clone is dropped.
    pub async fn shutdown(self) {
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "Login attempt recorder task failed");
        }
    }
}
