use std::{future::Future, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::graphql_client::error::{ClientError, cancelled};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Latency-sensitive; never paced by the server-status monitor.
    #[default]
    Interactive,
    /// Non-interactive work that yields to interactive callers.
    Background,
}

/// Cancellation, deadline and priority for one logical operation.
///
/// Every suspension point in the dispatcher goes through [`RequestContext::run`].
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
    priority: Priority,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn background() -> Self {
        Self::default().with_priority(Priority::Background)
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn is_background(&self) -> bool {
        self.priority == Priority::Background
    }

    /// Drives `fut` until it completes, the token is cancelled or the deadline passes.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, ClientError> {
        if self.cancel.is_cancelled() {
            return Err(cancelled("request cancelled"));
        }

        let deadline = async {
            match self.deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(cancelled("request cancelled")),
            _ = deadline => Err(cancelled("request deadline exceeded")),
            output = fut => Ok(output),
        }
    }
}
