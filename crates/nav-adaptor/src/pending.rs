//! Discarding results a caller no longer wants

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Caller's interest in a pending resolution
///
/// Abandoning does not cancel the work: fetches complete and populate the
/// shared caches, only delivery to the caller is suppressed.
#[derive(Debug, Clone, Default)]
pub struct Interest(Arc<AtomicBool>);

impl Interest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark results arriving from now on as unwanted
    pub fn abandon(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Drive `work` to completion, `None` if interest was abandoned meanwhile
    pub async fn deliver<F: Future>(&self, work: F) -> Option<F::Output> {
        let output = work.await;
        (!self.is_abandoned()).then_some(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn abandoned_results_are_dropped() {
        let interest = Interest::new();
        let handle = interest.clone();
        let pending = tokio::spawn(async move {
            handle
                .deliver(async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    42
                })
                .await
        });
        interest.abandon();
        assert_eq!(pending.await.unwrap(), None);
    }

    #[tokio::test]
    async fn kept_interest_delivers() {
        let interest = Interest::new();
        assert_eq!(interest.deliver(async { "node" }).await, Some("node"));
        assert!(!interest.is_abandoned());
    }
}
