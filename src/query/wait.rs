//! Deadline helpers for the polling loops.

use std::time::Duration;

use tokio::time::Instant;

use crate::driver::{Locator, PageDriver};
use crate::error::{QueryError, Result};

/// A fixed point in time all waits of one extraction step share.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    at: Instant,
    budget: Duration,
    poll: Duration,
}

impl Deadline {
    pub(crate) fn after(budget: Duration, poll: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
            poll,
        }
    }

    /// Interval between checks.
    pub(crate) fn poll(&self) -> Duration {
        self.poll
    }

    pub(crate) fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub(crate) fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    pub(crate) fn timeout(&self, what: &str) -> QueryError {
        QueryError::Timeout {
            what: what.to_string(),
            after: self.budget,
        }
    }
}

/// Wait for an element within the deadline, or fail with `Timeout`.
pub(crate) async fn require(
    driver: &dyn PageDriver,
    locator: &Locator,
    deadline: &Deadline,
    what: &str,
) -> Result<()> {
    if driver
        .wait_for(locator, deadline.remaining(), deadline.poll())
        .await? {
        Ok(())
    } else {
        Err(deadline.timeout(what))
    }
}
