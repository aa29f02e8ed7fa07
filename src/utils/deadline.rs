//! Run a future under an optional deadline and a cancellation token.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// How a guarded future ended.
#[derive(Debug, PartialEq, Eq)]
pub enum Deadline<T> {
    Finished(T),
    TimedOut(Duration),
    Cancelled,
}

/// Await `fut` unless `limit` elapses or `cancel` fires first.
///
/// Cancellation wins when both are ready at the same poll.
pub async fn run_with_deadline<F>(
    fut: F,
    limit: Option<Duration>,
    cancel: &CancellationToken,
) -> Deadline<F::Output>
where
    F: Future,
{
    let timed = async move {
        match limit {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(value) => Deadline::Finished(value),
                Err(_) => Deadline::TimedOut(limit),
            },
            None => Deadline::Finished(fut.await),
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Deadline::Cancelled,
        outcome = timed => outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_finishes_without_limit() {
        let token = CancellationToken::new();
        let outcome = run_with_deadline(async { 7 }, None, &token).await;
        assert_eq!(outcome, Deadline::Finished(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let token = CancellationToken::new();
        let outcome = run_with_deadline(
            tokio::time::sleep(Duration::from_secs(60)),
            Some(Duration::from_secs(1)),
            &token,
        )
        .await;
        assert_eq!(outcome, Deadline::TimedOut(Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_cancelled_token_wins() {
        let token = CancellationToken::new();
        token.cancel();
        let outcome = run_with_deadline(async { 1 }, None, &token).await;
        assert_eq!(outcome, Deadline::Cancelled);
    }
}
