use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a [`VerifyContext`] stopped accepting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextEnd {
    Cancelled,
    DeadlineExceeded,
}

impl fmt::Display for ContextEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextEnd::Cancelled => f.write_str("context cancelled"),
            ContextEnd::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

/// Cancellation signal plus optional deadline supplied by whoever drives a verification.
///
/// Clones share the same token; derived contexts are cancelled together with their parent.
#[derive(Debug, Clone)]
pub struct VerifyContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for VerifyContext {
    fn default() -> Self {
        Self::background()
    }
}

impl VerifyContext {
    pub fn background() -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Derives a context that ends no later than `deadline` and is cancelled with `self`.
    pub fn child_with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        Self {
            cancel: self.cancel.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns the reason this context has already ended, if it has.
    pub fn end(&self) -> Option<ContextEnd> {
        if self.cancel.is_cancelled() {
            Some(ContextEnd::Cancelled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(ContextEnd::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> ContextEnd {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => ContextEnd::Cancelled,
                _ = tokio::time::sleep_until(deadline) => ContextEnd::DeadlineExceeded,
            },
            None => {
                self.cancel.cancelled().await;
                ContextEnd::Cancelled
            }
        }
    }
}

/// Working context for one responder query.
///
/// `caller_deadline_applies` is fixed when the scope is derived: it is true only when the
/// caller's own deadline is at or before the internal cutoff, so that hitting the bound
/// is the caller's doing rather than ours.
#[derive(Debug, Clone)]
pub struct RequestScope {
    pub context: VerifyContext,
    pub caller_deadline_applies: bool,
}

impl RequestScope {
    pub fn derive(caller: &VerifyContext, internal_timeout: Duration) -> Self {
        let cutoff = Instant::now() + internal_timeout;
        match caller.deadline() {
            Some(deadline) if deadline <= cutoff => Self {
                context: caller.clone(),
                caller_deadline_applies: true,
            },
            _ => Self {
                context: caller.child_with_deadline(cutoff),
                caller_deadline_applies: false,
            },
        }
    }
}
