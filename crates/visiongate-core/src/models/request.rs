use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::error::ErrorKind;

/// Correlation id assigned to every inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOutcome {
    pub status: u16,
    pub error_kind: Option<ErrorKind>,
}

/// Per-request state threaded through the middleware chain. Never persisted.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub started_at: Instant,
    pub received_at: DateTime<Utc>,
    /// Key used for admission control (usually `ip:<addr>`).
    pub client_key: String,
    pub outcome: Option<RequestOutcome>,
}

impl RequestContext {
    pub fn new(client_key: impl Into<String>) -> Self {
        Self {
            request_id: RequestId::generate(),
            started_at: Instant::now(),
            received_at: Utc::now(),
            client_key: client_key.into(),
            outcome: None,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn complete(&mut self, status: u16, error_kind: Option<ErrorKind>) -> RequestOutcome {
        let outcome = RequestOutcome { status, error_kind };
        self.outcome = Some(outcome);
        outcome
    }
}
