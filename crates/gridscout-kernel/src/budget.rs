//! [`SessionBudget`] – the two racing stop conditions of an exploration run.
//!
//! The deadline is computed once, when the session starts, and every later
//! check compares against that fixed instant.  All timing uses
//! [`tokio::time::Instant`] so paused-clock tests are deterministic.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::info;

// ────────────────────────────────────────────────────────────────────────────
// SessionBudget
// ────────────────────────────────────────────────────────────────────────────

/// # Example
///
/// ```
/// use std::time::Duration;
/// use gridscout_kernel::budget::SessionBudget;
///
/// let mut budget = SessionBudget::new(300, Duration::from_secs(360));
/// assert!(budget.deadline().is_none());
///
/// budget.start();
/// assert!(budget.allows(120));
/// assert!(!budget.allows(301));
/// ```
#[derive(Debug, Clone)]
pub struct SessionBudget {
    coverage_limit: usize,
    time_limit: Duration,
    started_at: Option<Instant>,
    deadline: Option<Instant>,
    times_up: bool,
}

impl SessionBudget {
    pub fn new(coverage_limit: usize, time_limit: Duration) -> Self {
        Self {
            coverage_limit,
            time_limit,
            started_at: None,
            deadline: None,
            times_up: false,
        }
    }

    pub fn coverage_limit(&self) -> usize {
        self.coverage_limit
    }

    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    /// Start the clock.  Calling it again keeps the original deadline.
    pub fn start(&mut self) -> Instant {
        if let Some(deadline) = self.deadline {
            return deadline;
        }
        let now = Instant::now();
        let deadline = now + self.time_limit;
        self.started_at = Some(now);
        self.deadline = Some(deadline);
        info!(
            coverage_limit = self.coverage_limit,
            time_limit_s = self.time_limit.as_secs_f64(),
            "session budget started"
        );
        deadline
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time since [`start`](Self::start), zero before it.
    pub fn elapsed(&self) -> Duration {
        self.started_at.map(|s| s.elapsed()).unwrap_or_default()
    }

    /// `true` once the current time is past the deadline.
    pub fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() > d)
    }

    /// The loop-continuation test: coverage not above the limit and the
    /// deadline not yet passed.
    pub fn allows(&self, area_explored: usize) -> bool {
        area_explored <= self.coverage_limit && !self.expired()
    }

    /// Latch that aborts the backtracking sweep.  Never reset.
    pub fn mark_times_up(&mut self) {
        if !self.times_up {
            info!("time is up");
        }
        self.times_up = true;
    }

    pub fn times_up(&self) -> bool {
        self.times_up
    }
}

// ────────────────────────────────────────────────────────────────────────────
// GoalVisitPolicy
// ────────────────────────────────────────────────────────────────────────────

/// Whether the return leg must pass through the goal when it has not been
/// touched during exploration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum GoalVisitPolicy {
    Always,
    Never,
    /// Only for sessions configured with exactly this budget.
    WhenBudget {
        coverage_limit: usize,
        time_limit_secs: u64,
    },
}

impl Default for GoalVisitPolicy {
    fn default() -> Self {
        GoalVisitPolicy::WhenBudget {
            coverage_limit: 300,
            time_limit_secs: 360,
        }
    }
}

impl GoalVisitPolicy {
    pub fn requires_goal_visit(&self, budget: &SessionBudget) -> bool {
        match *self {
            GoalVisitPolicy::Always => true,
            GoalVisitPolicy::Never => false,
            GoalVisitPolicy::WhenBudget {
                coverage_limit,
                time_limit_secs,
            } => {
                budget.coverage_limit() == coverage_limit
                    && budget.time_limit() == Duration::from_secs(time_limit_secs)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn deadline_is_fixed_at_start() {
        let mut budget = SessionBudget::new(300, Duration::from_secs(10));
        let first = budget.start();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(budget.start(), first);
        assert_eq!(budget.deadline(), Some(first));
        assert!(budget.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn expires_strictly_after_deadline() {
        let mut budget = SessionBudget::new(300, Duration::from_secs(5));
        budget.start();
        assert!(!budget.expired());

        tokio::time::sleep(Duration::from_secs(5)).await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(budget.expired());
        assert!(!budget.allows(0));
    }

    #[test]
    fn unstarted_budget_never_expires() {
        let budget = SessionBudget::new(10, Duration::ZERO);
        assert!(!budget.expired());
        assert_eq!(budget.elapsed(), Duration::ZERO);
        assert!(budget.allows(10));
        assert!(!budget.allows(11));
    }

    #[test]
    fn times_up_latches() {
        let mut budget = SessionBudget::new(10, Duration::from_secs(1));
        assert!(!budget.times_up());
        budget.mark_times_up();
        budget.mark_times_up();
        assert!(budget.times_up());
    }

    #[test]
    fn goal_policy_matches_budget() {
        let standard = SessionBudget::new(300, Duration::from_secs(360));
        let short = SessionBudget::new(300, Duration::from_secs(60));

        let policy = GoalVisitPolicy::default();
        assert!(policy.requires_goal_visit(&standard));
        assert!(!policy.requires_goal_visit(&short));

        assert!(GoalVisitPolicy::Always.requires_goal_visit(&short));
        assert!(!GoalVisitPolicy::Never.requires_goal_visit(&standard));
    }
}
