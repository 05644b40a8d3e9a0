//! Per-call context: optional deadline and cancellation.
//!
//! Every client call runs inside a [`CallContext`]. The default context has no
//! deadline and cannot be cancelled, so calls wait until the transport answers.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Deadline and cancellation attached to a client call.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl CallContext {
    /// Context with no deadline and no cancellation.
    pub fn background() -> Self {
        Self::default()
    }

    /// Set a deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Set an absolute deadline. An earlier existing deadline wins.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the attached token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    /// Run a call under this context.
    ///
    /// Returns [`Error::Timeout`] when the deadline passes first and
    /// [`Error::Cancelled`] when the token fires first. The call future is
    /// dropped in both cases; work already applied remotely is not undone.
    pub async fn run<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            res = call => res,
            _ = cancelled => Err(Error::Cancelled),
            _ = expired => Err(Error::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn background_passes_result_through() {
        let ctx = CallContext::background();
        let value = ctx.run(async { Ok::<_, Error>(5) }).await.unwrap();
        assert_eq!(value, 5);
        assert!(ctx.deadline().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires() {
        let ctx = CallContext::background().with_timeout(Duration::from_millis(50));
        let res = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, Error>(())
            })
            .await;
        assert!(matches!(res, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn cancellation_aborts_call() {
        let token = CancellationToken::new();
        let ctx = CallContext::background().with_cancellation(token.clone());

        let handle = tokio::spawn(async move {
            ctx.run(std::future::pending::<Result<()>>()).await
        });
        token.cancel();

        let res = handle.await.unwrap();
        assert!(matches!(res, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn already_cancelled_fails_fast() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = CallContext::background().with_cancellation(token);
        assert!(ctx.is_cancelled());

        let res = ctx.run(async { Ok::<_, Error>(1) }).await;
        assert!(matches!(res, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn earlier_deadline_wins() {
        let soon = Instant::now() + Duration::from_secs(1);
        let later = Instant::now() + Duration::from_secs(60);
        let ctx = CallContext::background()
            .with_deadline(soon)
            .with_deadline(later);
        assert_eq!(ctx.deadline(), Some(soon));
    }
}
