//! Timeouts that may change while the guarded work runs.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Run `work` until it finishes or the current limit, counted from
/// `started`, passes. Returns `None` on timeout.
///
/// The limit is re-read whenever it changes; a new limit that already
/// passed fires at once.
pub async fn run_until_deadline<F: Future>(
    work: F,
    started: Instant,
    mut limit: watch::Receiver<Option<Duration>>,
) -> Option<F::Output> {
    tokio::pin!(work);
    loop {
        let current = *limit.borrow_and_update();
        let expired = async move {
            match current {
                Some(limit) => tokio::time::sleep_until(started + limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            output = &mut work => return Some(output),
            () = expired => return None,
            changed = limit.changed() => {
                if changed.is_err() {
                    // Nobody can change it any more.
                    return match current {
                        Some(limit) => tokio::time::timeout_at(started + limit, work).await.ok(),
                        None => Some(work.await),
                    };
                }
            }
        }
    }
}
