use std::time::Duration;
use tracing::debug;

/// Accumulated wait time of one retry loop.
///
/// The loop keeps going while the time it has spent waiting is within the
/// cap; the iteration that pushes it past the cap is the last one.
#[derive(Debug, Clone)]
pub struct PollBudget {
    cap: Duration,
    spent: Duration,
    waits: u32,
}

impl PollBudget {
    pub fn new(cap: Duration) -> Self {
        Self {
            cap,
            spent: Duration::ZERO,
            waits: 0,
        }
    }

    pub fn from_secs(cap_secs: u64) -> Self {
        Self::new(Duration::from_secs(cap_secs))
    }

    /// Account for time spent without sleeping
    pub fn charge(&mut self, elapsed: Duration) {
        self.spent += elapsed;
        self.waits += 1;
    }

    /// Sleep for `delay` and account for it
    pub async fn wait(&mut self, delay: Duration) {
        debug!(
            delay_secs = delay.as_secs(),
            remaining_secs = self.remaining().as_secs(),
            "waiting before next attempt"
        );
        tokio::time::sleep(delay).await;
        self.charge(delay);
    }

    pub fn is_exhausted(&self) -> bool {
        self.spent > self.cap
    }

    pub fn spent(&self) -> Duration {
        self.spent
    }

    pub fn remaining(&self) -> Duration {
        self.cap.saturating_sub(self.spent)
    }

    pub fn cap(&self) -> Duration {
        self.cap
    }

    pub fn waits(&self) -> u32 {
        self.waits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_initial() {
        let budget = PollBudget::from_secs(800);
        assert_eq!(budget.spent(), Duration::ZERO);
        assert_eq!(budget.remaining(), Duration::from_secs(800));
        assert!(!budget.is_exhausted());
    }

    #[test]
    fn test_budget_exhausted_only_past_cap() {
        let mut budget = PollBudget::from_secs(60);

        budget.charge(Duration::from_secs(30));
        budget.charge(Duration::from_secs(30));
        assert!(!budget.is_exhausted());
        assert_eq!(budget.remaining(), Duration::ZERO);

        budget.charge(Duration::from_secs(1));
        assert!(budget.is_exhausted());
        assert_eq!(budget.waits(), 3);
    }

    #[test]
    fn test_budget_login_schedule() {
        // 30 second steps under an 800 second cap stop at 810 seconds
        let mut budget = PollBudget::from_secs(800);
        let mut attempts = 0;
        while !budget.is_exhausted() {
            attempts += 1;
            budget.charge(Duration::from_secs(30));
        }
        assert_eq!(attempts, 27);
        assert_eq!(budget.spent(), Duration::from_secs(810));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_advances_clock() {
        let start = tokio::time::Instant::now();
        let mut budget = PollBudget::from_secs(180);

        budget.wait(Duration::from_secs(10)).await;
        budget.wait(Duration::from_secs(30)).await;

        assert_eq!(budget.spent(), Duration::from_secs(40));
        assert_eq!(start.elapsed(), Duration::from_secs(40));
    }
}
