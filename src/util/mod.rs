//! Utility module
//!
//! This module provides common utilities and helper functions used
//! throughout the library.

pub mod words;

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::task::{AbortHandle, JoinSet};
use tracing::debug;

/// Applies a uniform `± spread` jitter to `base`
pub fn jitter<R: Rng + ?Sized>(base: Duration, spread: Duration, rng: &mut R) -> Duration {
    let spread_ms = spread.as_millis() as i64;
    if spread_ms == 0 {
        return base;
    }
    let offset = rng.gen_range(-spread_ms..=spread_ms);
    let ms = (base.as_millis() as i64 + offset).max(0);
    Duration::from_millis(ms as u64)
}

/// Doubles `current`, capped at `max`
pub fn backoff(current: Duration, max: Duration) -> Duration {
    current.saturating_mul(2).min(max)
}

/// Every background task owned by one role
///
/// Shutting the group down aborts and awaits all of them, so nothing
/// outlives the role that spawned it. Dropping the group aborts as well.
pub struct TaskGroup {
    name: &'static str,
    tasks: JoinSet<()>,
}

impl TaskGroup {
    pub fn new(name: &'static str) -> Self {
        TaskGroup {
            name,
            tasks: JoinSet::new(),
        }
    }

    pub fn spawn<F>(&mut self, task: F) -> AbortHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(task)
    }

    /// Number of tasks not yet reaped
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Aborts every task and waits for them to finish
    pub async fn shutdown(&mut self) {
        if !self.tasks.is_empty() {
            debug!("Shutting down {} task(s) of {}", self.tasks.len(), self.name);
        }
        self.tasks.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_jitter_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let base = Duration::from_millis(3000);
        let spread = Duration::from_millis(250);
        for _ in 0..200 {
            let d = jitter(base, spread, &mut rng);
            assert!(d >= Duration::from_millis(2750) && d <= Duration::from_millis(3250));
        }
        assert_eq!(jitter(base, Duration::ZERO, &mut rng), base);
    }

    #[test]
    fn test_backoff_is_capped() {
        let max = Duration::from_secs(30);
        assert_eq!(backoff(Duration::from_secs(3), max), Duration::from_secs(6));
        assert_eq!(backoff(Duration::from_secs(20), max), max);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_every_task() {
        let mut group = TaskGroup::new("test");
        let finished = Arc::new(AtomicBool::new(false));

        for _ in 0..3 {
            let finished = finished.clone();
            group.spawn(async move {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                finished.store(true, Ordering::SeqCst);
            });
        }
        assert_eq!(group.len(), 3);

        group.shutdown().await;
        assert!(group.is_empty());
        assert!(!finished.load(Ordering::SeqCst));
    }
}
