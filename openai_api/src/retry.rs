use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

/// Bounded polling: run an operation at a fixed interval until it yields a
/// value or the deadline is exhausted. The loop is always bounded; an
/// external job that never settles cannot block a caller forever.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            interval: Duration::from_secs(1),
            deadline: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Polls `op` until it returns `Some`, it fails, or the deadline passes.
    /// `Ok(None)` means the deadline was exhausted without a value.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<Option<T>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        let start = Instant::now();
        loop {
            if let Some(value) = op().await? {
                return Ok(Some(value));
            }
            if start.elapsed() >= self.deadline {
                return Ok(None);
            }
            sleep(self.interval).await;
        }
    }
}
