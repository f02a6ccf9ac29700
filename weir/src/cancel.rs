use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;

/// Token for cancelling a run and everything spawned beneath it.
///
/// One token is shared by a top-level run and all of its nested sub-runs.
/// The engine checks it before starting each series step and before feeding
/// each job into a bounded pool; it never interrupts a job that has already
/// started. Jobs that want finer-grained cancellation check their
/// [`Context`](crate::Context) cooperatively.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    inner: Arc<CancelTokenInner>,
}

#[derive(Debug, Default)]
struct CancelTokenInner {
    cancelled: AtomicBool,
    reason: Mutex<Option<String>>,
    notify: Notify,
}

impl CancelToken {
    /// Create a new, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.finish(None);
    }

    /// Signal cancellation, recording why.
    ///
    /// The first recorded reason wins; later calls still cancel but do not
    /// replace it.
    pub fn cancel_with(&self, reason: impl Into<String>) {
        self.finish(Some(reason.into()));
    }

    fn finish(&self, reason: Option<String>) {
        if let Some(reason) = reason {
            let mut guard = self.inner.reason.lock();
            if guard.is_none() {
                *guard = Some(reason);
            }
        }
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Check if cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// The reason recorded by [`cancel_with`](Self::cancel_with), if any.
    pub fn reason(&self) -> Option<String> {
        self.inner.reason.lock().clone()
    }

    /// The cancellation outcome as an ordinary error value, or `None` while
    /// the token is live.
    pub fn error(&self) -> Option<Cancelled> {
        if self.is_cancelled() {
            Some(Cancelled {
                reason: self.reason(),
            })
        } else {
            None
        }
    }

    /// Wait until cancelled.
    pub async fn cancelled(&self) {
        let notified = self.inner.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// Error value reported by runs that were cancelled rather than failed.
///
/// A [`Sequence`](crate::Sequence) returns this as its own result when its
/// members all finished clean but the token was set while they ran.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("job run cancelled")]
pub struct Cancelled {
    /// The reason passed to [`CancelToken::cancel_with`], if one was given.
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cancel_sets_flag_and_error() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.error().is_none());

        token.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.error(), Some(Cancelled { reason: None }));
    }

    #[test]
    fn test_first_reason_wins() {
        let token = CancelToken::new();
        token.cancel_with("operator request");
        token.cancel_with("too late");
        assert_eq!(token.reason().as_deref(), Some("operator request"));
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiters() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter should wake after cancel")
            .expect("waiter task should not panic");
    }

    #[tokio::test]
    async fn test_cancelled_returns_immediately_when_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        token.cancelled().await;
    }
}
