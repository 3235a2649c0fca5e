//! Request-scoped deadline propagated through every stage.
//!
//! A single `Deadline` is created per construction request and handed to
//! every collaborator call that crosses a process boundary. A slow external
//! dependency degrades results (partial data) rather than hanging the
//! pipeline.

use std::time::Duration;
use tokio::time::Instant;

/// An absolute point in time after which external calls must give up.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// A deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }

    /// Time left before the deadline, zero if already past.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Run a future against this deadline. `None` means the deadline won.
    pub async fn bound<F, T>(&self, fut: F) -> Option<T>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::time::timeout(self.remaining(), fut).await.ok()
    }
}
