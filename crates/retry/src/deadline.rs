use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("deadline of {}s exceeded after {}s", .budget.as_secs(), .elapsed.as_secs())]
pub struct DeadlineExceeded {
    pub elapsed: Duration,
    pub budget: Duration,
}

/// Wall-clock budget for a whole run, measured on the tokio clock
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn new(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.elapsed())
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn is_exhausted(&self) -> bool {
        self.elapsed() >= self.budget
    }

    pub fn check(&self) -> Result<(), DeadlineExceeded> {
        let elapsed = self.elapsed();
        if elapsed >= self.budget {
            return Err(DeadlineExceeded {
                elapsed,
                budget: self.budget,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_not_exhausted_initially() {
        let deadline = Deadline::new(Duration::from_secs(900));
        assert!(!deadline.is_exhausted());
        assert!(deadline.check().is_ok());
        assert_eq!(deadline.remaining(), Duration::from_secs(900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exhausts() {
        let deadline = Deadline::new(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(61)).await;

        let err = deadline.check().unwrap_err();
        assert_eq!(err.budget, Duration::from_secs(60));
        assert_eq!(err.elapsed, Duration::from_secs(61));
        assert_eq!(deadline.remaining(), Duration::ZERO);
        assert_eq!(err.to_string(), "deadline of 60s exceeded after 61s");
    }
}
