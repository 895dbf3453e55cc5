//! Cooperative cancellation for reconciliation runs.
//!
//! Cancellation is checked between pipeline stages and between batches;
//! in-flight adapter calls are allowed to complete. There is no mid-flight
//! abort across the LLM boundary.

use tokio_util::sync::CancellationToken;

/// Context owning the cancellation token for one run.
#[derive(Debug, Clone, Default)]
pub struct CancellationContext {
    token: CancellationToken,
}

impl CancellationContext {
    /// Creates a new context.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Wraps an existing token.
    pub fn from_token(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Gets a reference to the cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Requests cancellation of the associated run.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Checks whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Creates a child token cancelled together with this context.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}
