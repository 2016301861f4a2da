//! Cancellable one-shot timer for use inside `select!` loops.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep, Instant, Sleep};

/// A one-shot deadline that is either armed or idle.
///
/// [`Timer::fired`] pends forever while idle, so an idle timer can sit in a
/// `select!` branch without a guard. Firing disarms the timer; dropping it
/// releases the deadline.
#[derive(Debug, Default)]
pub struct Timer {
    deadline: Option<Pin<Box<Sleep>>>,
}

impl Timer {
    #[must_use]
    pub const fn idle() -> Self {
        Self { deadline: None }
    }

    /// Arm the timer to fire after `after`, replacing any pending deadline.
    pub fn arm(&mut self, after: Duration) {
        self.deadline = Some(Box::pin(sleep(after)));
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    #[cfg(test)]
    fn deadline(&self) -> Option<Instant> {
        self.deadline.as_ref().map(|sleep| sleep.deadline())
    }

    /// Wait until the armed deadline passes, then disarm.
    ///
    /// Cancel safe: dropping the future leaves the deadline armed.
    pub async fn fired(&mut self) {
        match self.deadline.as_mut() {
            Some(sleep) => {
                sleep.await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[tokio::test(start_paused = true)]
    async fn test_idle_timer_never_fires() {
        let mut timer = Timer::idle();
        let mut fired = task::spawn(timer.fired());
        assert_pending!(fired.poll());
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_pending!(fired.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn test_armed_timer_fires_once_then_disarms() {
        let mut timer = Timer::idle();
        timer.arm(Duration::from_millis(500));
        assert!(timer.is_armed());

        {
            let mut fired = task::spawn(timer.fired());
            assert_pending!(fired.poll());
            tokio::time::advance(Duration::from_millis(500)).await;
            assert_ready!(fired.poll());
        }
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_disarms() {
        let mut timer = Timer::idle();
        timer.arm(Duration::from_millis(100));
        timer.cancel();
        assert!(timer.deadline().is_none());

        let mut fired = task::spawn(timer.fired());
        tokio::time::advance(Duration::from_millis(200)).await;
        assert_pending!(fired.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_deadline() {
        let mut timer = Timer::idle();
        timer.arm(Duration::from_millis(100));
        timer.arm(Duration::from_millis(1000));
        let expected = Instant::now() + Duration::from_millis(1000);
        assert_eq!(timer.deadline(), Some(expected));
    }
}
