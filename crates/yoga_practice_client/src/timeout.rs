//! Deadlines and caller-side cancellation for remote calls.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

use crate::YogaError;

/// Run `fut` until it completes, `limit` elapses, or `cancel` flips to `true`.
///
/// A dropped cancel sender is not a cancellation; the call then simply runs
/// against the deadline.
pub async fn with_deadline<F, T>(
    fut: F,
    limit: Duration,
    cancel: Option<watch::Receiver<bool>>,
) -> Result<T, YogaError>
where
    F: Future<Output = Result<T, YogaError>>,
{
    let guarded = async {
        match tokio::time::timeout(limit, fut).await {
            Ok(res) => res,
            Err(_) => Err(YogaError::Timeout(limit)),
        }
    };

    let Some(mut cancel_rx) = cancel else {
        return guarded.await;
    };
    if *cancel_rx.borrow() {
        return Err(YogaError::Cancelled);
    }

    let cancelled = async move {
        loop {
            if cancel_rx.changed().await.is_err() {
                // Sender gone: never resolve.
                std::future::pending::<()>().await;
            }
            if *cancel_rx.borrow() {
                return;
            }
        }
    };

    tokio::select! {
        res = guarded => res,
        _ = cancelled => Err(YogaError::Cancelled),
    }
}
