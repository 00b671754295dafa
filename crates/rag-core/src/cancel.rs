//! Cooperative cancellation for in-flight queries.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{RagError, Result};

/// Cloneable cancellation handle.
///
/// Every clone observes the same flag. Pipeline stages race their
/// suspension points (provider calls, backoff sleeps) against
/// [`CancelToken::cancelled`], so a cancelled query stops at the next await.
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Return `Err(Cancelled)` if cancellation has been requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(RagError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolve once cancellation is requested.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            // The sender lives as long as any clone, so this only fails if
            // every handle is gone; nobody can cancel us then.
            if receiver.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Run `fut` unless cancellation wins the race.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(RagError::Cancelled),
            result = fut => result,
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());
        assert!(matches!(clone.check(), Err(RagError::Cancelled)));
    }

    #[tokio::test]
    async fn test_run_completes_when_not_cancelled() {
        let token = CancelToken::new();
        let value = token.run(async { Ok(42) }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_run_stops_pending_future() {
        let token = CancelToken::new();
        let canceller = token.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result: Result<()> = token
            .run(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(RagError::Cancelled)));
    }

    #[tokio::test]
    async fn test_already_cancelled_wins() {
        let token = CancelToken::new();
        token.cancel();
        let result = token.run(async { Ok(1) }).await;
        assert!(matches!(result, Err(RagError::Cancelled)));
    }
}
