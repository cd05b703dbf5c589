//! Time budgets for deadline-bounded polling loops
//!
//! - `Deadline`: wall-clock budget for a whole recovery run
//! - `PollBudget`: accumulated wait time of a single retry loop, capped
//!
//! Both run on the tokio clock, so tests drive them with a paused runtime.

pub mod budget;
pub mod deadline;

pub use budget::PollBudget;
pub use deadline::{Deadline, DeadlineExceeded};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_poll_budget_within_deadline() {
        let deadline = Deadline::new(Duration::from_secs(100));
        let mut budget = PollBudget::new(Duration::from_secs(60));

        while !budget.is_exhausted() {
            assert!(deadline.check().is_ok());
            budget.wait(Duration::from_secs(30)).await;
        }

        assert_eq!(budget.spent(), Duration::from_secs(90));
        assert_eq!(deadline.elapsed(), Duration::from_secs(90));
        assert!(deadline.check().is_ok());

        budget.wait(Duration::from_secs(30)).await;
        assert!(deadline.check().is_err());
    }
}
