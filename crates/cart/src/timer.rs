//! Abandoned-cart timer.
//!
//! A deferred, cancellable single-shot callback owned by the cart engine -
//! not by any UI lifecycle - so its behavior is testable without a
//! rendering layer.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Single-shot timer.
///
/// Arming replaces any previously armed shot. `cancel` is an idempotent
/// no-op when nothing is armed, and the pending shot is aborted on drop so
/// a torn-down engine cannot fire.
#[derive(Debug, Default)]
pub struct AbandonedCartTimer {
    handle: Option<JoinHandle<()>>,
}

impl AbandonedCartTimer {
    /// Create an unarmed timer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer: after `delay`, run `on_fire`.
    ///
    /// Any previously armed shot is cancelled first, so at most one shot is
    /// ever pending.
    pub fn arm<F>(&mut self, delay: Duration, on_fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire.await;
        }));
    }

    /// Cancel the pending shot, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Whether a shot is currently pending.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for AbandonedCartTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();

        let mut timer = AbandonedCartTimer::new();
        timer.arm(Duration::from_secs(60), async move {
            flag.store(true, Ordering::SeqCst);
        });
        assert!(timer.is_armed());

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(fired.load(Ordering::SeqCst));
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();

        let mut timer = AbandonedCartTimer::new();
        timer.arm(Duration::from_secs(60), async move {
            flag.store(true, Ordering::SeqCst);
        });
        timer.cancel();

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let mut timer = AbandonedCartTimer::new();
        // No shot armed; cancelling must be a harmless no-op.
        timer.cancel();
        timer.cancel();
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_pending_shot() {
        let count = Arc::new(std::sync::atomic::AtomicU32::new(0));

        let mut timer = AbandonedCartTimer::new();
        for _ in 0..3 {
            let counter = count.clone();
            timer.arm(Duration::from_secs(60), async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_secs(120)).await;
        // Only the last armed shot survives.
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_pending_shot() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();

        {
            let mut timer = AbandonedCartTimer::new();
            timer.arm(Duration::from_secs(60), async move {
                flag.store(true, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }
}
