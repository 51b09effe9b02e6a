/// Bounded polling
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Run `check` every `interval` until it yields a value or `timeout` elapses.
///
/// The check runs once immediately and once more at the deadline, so a wait of
/// zero still looks at the page. Returns `None` on timeout.
pub async fn poll_until<T, F, Fut>(interval: Duration, timeout: Duration, mut check: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + timeout;

    loop {
        if let Some(value) = check().await {
            return Some(value);
        }

        let now = Instant::now();
        if now >= deadline {
            return None;
        }

        sleep(interval.min(deadline - now)).await;
    }
}
