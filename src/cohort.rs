//! Cohort selection
//!
//! Only users whose latest session started before `now - window` are kept:
//! anyone active more recently may still return, so their label is not yet
//! settled.

use crate::config::DEFAULT_COHORT_WINDOW_MS;
use crate::types::{Millis, User, UserMap};
use chrono::{DateTime, Utc};

/// Filters reconstructed users down to the training cohort
#[derive(Debug, Clone, Copy)]
pub struct CohortSelector {
    window_ms: Millis,
}

impl Default for CohortSelector {
    fn default() -> Self {
        Self::new(DEFAULT_COHORT_WINDOW_MS)
    }
}

impl CohortSelector {
    pub fn new(window_ms: Millis) -> Self {
        Self { window_ms }
    }

    /// Latest activity must be strictly before this instant (epoch ms)
    pub fn cutoff(&self, now: DateTime<Utc>) -> Millis {
        now.timestamp_millis() - self.window_ms
    }

    /// Whether the user's most recent session started before the cutoff
    pub fn is_eligible(&self, user: &User, cutoff: Millis) -> bool {
        user.latest_session()
            .is_some_and(|session| session.start < cutoff)
    }

    /// Keep only cohort users
    pub fn select(&self, users: UserMap, now: DateTime<Utc>) -> UserMap {
        let cutoff = self.cutoff(now);
        let total = users.len();

        let cohort: UserMap = users
            .into_iter()
            .filter(|(_, user)| self.is_eligible(user, cutoff))
            .collect();

        tracing::debug!(
            "Selected {} of {} users (cutoff {})",
            cohort.len(),
            total,
            cutoff
        );
        cohort
    }
}
