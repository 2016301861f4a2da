//! Escalation once the retry loop gives up on an address.
//!
//! The coordinator owns the *plan* (which addresses to try next) and the
//! degraded-mode recovery timer. It never opens connections itself; the
//! supervisor asks it for the next address and reports outcomes back.
//!
//! # Modes
//!
//! - **Inactive**: normal operation, no plan
//! - **Escalating**: walking the other addresses once after the retry loop
//!   exhausted one of them
//! - **Degraded**: every address failed; recovery timer armed
//! - **Recovering**: a recovery pass is walking every address, primary first

use std::collections::VecDeque;
use std::time::Duration;

use super::metrics::Metrics;
use super::timer::Timer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Inactive,
    Escalating,
    Degraded,
    Recovering,
}

#[derive(Debug)]
pub struct FallbackCoordinator {
    mode: Mode,
    plan: VecDeque<usize>,
    attempted: usize,
    recovery: Timer,
    recovery_interval: Duration,
}

impl FallbackCoordinator {
    #[must_use]
    pub fn new(recovery_interval: Duration) -> Self {
        Self {
            mode: Mode::Inactive,
            plan: VecDeque::new(),
            attempted: 0,
            recovery: Timer::idle(),
            recovery_interval,
        }
    }

    /// Start an escalation after address `exhausted` ran out of attempts.
    ///
    /// Every other address is queued in configured order. Counts as one
    /// fallback activation regardless of how many addresses get tried.
    pub fn escalate(&mut self, exhausted: usize, address_count: usize, metrics: &Metrics) {
        self.mode = Mode::Escalating;
        self.plan = (0..address_count).filter(|&i| i != exhausted).collect();
        self.attempted = 0;
        metrics.record_fallback();
    }

    /// Start a recovery pass over every address, primary first.
    ///
    /// Re-arms the recovery timer so passes keep a fixed period.
    pub fn begin_recovery(&mut self, address_count: usize) {
        self.mode = Mode::Recovering;
        self.plan = (0..address_count).collect();
        self.attempted = 0;
        self.recovery.arm(self.recovery_interval);
    }

    /// Next address index to try in the current plan.
    pub fn next_address(&mut self) -> Option<usize> {
        let next = self.plan.pop_front()?;
        self.attempted += 1;
        Some(next)
    }

    /// Addresses tried in the current plan so far.
    #[must_use]
    pub const fn attempted(&self) -> usize {
        self.attempted
    }

    /// The plan ran dry; wait for the recovery timer.
    pub fn enter_degraded(&mut self) {
        self.mode = Mode::Degraded;
        self.plan.clear();
        if !self.recovery.is_armed() {
            self.recovery.arm(self.recovery_interval);
        }
    }

    /// A connection opened; leave fallback entirely.
    pub fn resolve(&mut self) {
        self.mode = Mode::Inactive;
        self.plan.clear();
        self.attempted = 0;
        self.recovery.cancel();
    }

    /// Escalating or recovering: connect failures advance the plan instead
    /// of the retry loop.
    #[must_use]
    pub fn in_progress(&self) -> bool {
        matches!(self.mode, Mode::Escalating | Mode::Recovering)
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.mode == Mode::Degraded
    }

    #[must_use]
    pub fn is_recovering(&self) -> bool {
        self.mode == Mode::Recovering
    }

    #[cfg(test)]
    const fn recovery_armed(&self) -> bool {
        self.recovery.is_armed()
    }

    /// Resolves when the recovery timer fires. Pends forever while idle.
    pub async fn recovery_due(&mut self) {
        self.recovery.fired().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escalation_skips_exhausted_address() {
        let metrics = Metrics::new();
        let mut fallback = FallbackCoordinator::new(Duration::from_secs(60));

        fallback.escalate(1, 3, &metrics);
        assert!(fallback.in_progress());
        assert_eq!(fallback.next_address(), Some(0));
        assert_eq!(fallback.next_address(), Some(2));
        assert_eq!(fallback.next_address(), None);
        assert_eq!(fallback.attempted(), 2);
        assert_eq!(metrics.counters().fallback_activations, 1);
    }

    #[test]
    fn test_escalation_without_backups_has_empty_plan() {
        let metrics = Metrics::new();
        let mut fallback = FallbackCoordinator::new(Duration::from_secs(60));

        fallback.escalate(0, 1, &metrics);
        assert_eq!(fallback.next_address(), None);
        assert_eq!(fallback.attempted(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_degraded_arms_recovery_once() {
        let metrics = Metrics::new();
        let mut fallback = FallbackCoordinator::new(Duration::from_secs(60));
        fallback.escalate(0, 2, &metrics);
        let _ = fallback.next_address();

        fallback.enter_degraded();
        assert!(fallback.is_degraded());
        assert!(fallback.recovery_armed());

        let start = tokio::time::Instant::now();
        fallback.recovery_due().await;
        assert_eq!(start.elapsed(), Duration::from_secs(60));

        fallback.begin_recovery(2);
        assert!(fallback.is_recovering());
        assert_eq!(fallback.next_address(), Some(0));
        assert_eq!(fallback.next_address(), Some(1));
        assert_eq!(fallback.next_address(), None);

        // Recovery passes are not new escalations.
        fallback.enter_degraded();
        assert_eq!(metrics.counters().fallback_activations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_cancels_recovery() {
        let metrics = Metrics::new();
        let mut fallback = FallbackCoordinator::new(Duration::from_secs(60));
        fallback.escalate(0, 1, &metrics);
        fallback.enter_degraded();

        fallback.resolve();
        assert!(!fallback.recovery_armed());
        assert!(!fallback.in_progress());
        assert!(!fallback.is_degraded());
    }
}
