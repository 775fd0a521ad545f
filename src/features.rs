//! Feature extraction
//!
//! Features come from the user's reference session (their chronologically
//! first session):
//! - `length`: records in the session
//! - `spins`: records whose bankroll moved
//! - win ratio, longest win streak and longest losing streak over those spins
//! - return label: whether the next session started within the return window
//!
//! Spins are read in the session's stored order, which is newest first. Streaks
//! therefore run over reverse play order; the stored order is kept as-is so the
//! features match previously generated training data.

use crate::config::DEFAULT_RETURN_WINDOW_MS;
use crate::types::{
    FeatureMatrix, FeatureVector, Millis, Session, SpinOutcome, SpinStats, User, UserMap,
};

/// Derives a feature vector and label for each cohort user
#[derive(Debug, Clone, Copy)]
pub struct FeatureExtractor {
    return_window_ms: Millis,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_RETURN_WINDOW_MS)
    }
}

impl FeatureExtractor {
    pub fn new(return_window_ms: Millis) -> Self {
        Self { return_window_ms }
    }

    /// Extract features for one user.
    ///
    /// Returns `None` for a user without sessions.
    pub fn extract(&self, user: &User) -> Option<FeatureVector> {
        let reference = user.reference_session()?;
        let outcomes = spin_outcomes(reference);

        Some(FeatureVector {
            length: reference.len(),
            spins: outcomes.len(),
            stats: compute_spin_stats(&outcomes),
            returned: self.returned(user, reference),
        })
    }

    /// Extract features for every user in the cohort
    pub fn extract_all(&self, cohort: &UserMap) -> FeatureMatrix {
        cohort
            .iter()
            .filter_map(|(id, user)| match self.extract(user) {
                Some(features) => Some((id.clone(), features)),
                None => {
                    tracing::warn!("User {} has no sessions, skipping", id);
                    None
                }
            })
            .collect()
    }

    /// Whether the session after the reference one began within the return window
    fn returned(&self, user: &User, reference: &Session) -> bool {
        user.second_oldest_session().is_some_and(|next| {
            next.start.saturating_sub(reference.end) < self.return_window_ms
        })
    }
}

/// Win/loss signals in the session's stored order
pub fn spin_outcomes(session: &Session) -> Vec<SpinOutcome> {
    session.contents.iter().filter_map(|r| r.outcome()).collect()
}

/// Ratio and streaks, or `None` when there were no spins
pub fn compute_spin_stats(outcomes: &[SpinOutcome]) -> Option<SpinStats> {
    if outcomes.is_empty() {
        return None;
    }

    let wins = outcomes.iter().filter(|&&o| o == SpinOutcome::Win).count();

    Some(SpinStats {
        win_ratio: wins as f64 / outcomes.len() as f64,
        win_streak: longest_run(outcomes, SpinOutcome::Win),
        lose_streak: longest_run(outcomes, SpinOutcome::Loss),
    })
}

/// Length of the longest run of consecutive `target` outcomes
fn longest_run(outcomes: &[SpinOutcome], target: SpinOutcome) -> usize {
    let mut current = 0;
    let mut longest = 0;
    for &outcome in outcomes {
        current = if outcome == target { current + 1 } else { 0 };
        longest = longest.max(current);
    }
    longest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HOUR_MS, MINUTE_MS};
    use crate::types::Record;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::types::SpinOutcome::{Loss, Win};

    fn record(timestamp: Millis, bankroll: Option<(f64, f64)>) -> Record {
        Record {
            timestamp,
            bankroll_before: bankroll.map(|(b, _)| b),
            bankroll_after: bankroll.map(|(_, a)| a),
            body: json!({}),
        }
    }

    fn session(id: &str, records: Vec<Record>) -> Session {
        let mut iter = records.into_iter();
        let mut session = Session::new(id, iter.next().expect("at least one record"));
        for r in iter {
            session.absorb(r);
        }
        session
    }

    #[test]
    fn test_streaks_over_stored_order() {
        let outcomes = [Win, Win, Loss, Win, Win, Win, Loss, Loss];
        let stats = compute_spin_stats(&outcomes).unwrap();

        assert_eq!(stats.win_streak, 3);
        assert_eq!(stats.lose_streak, 2);
        assert!((stats.win_ratio - 0.625).abs() < 1e-12);
    }

    #[test]
    fn test_no_spins_gives_no_stats() {
        assert!(compute_spin_stats(&[]).is_none());
    }

    #[test]
    fn test_all_losses() {
        let stats = compute_spin_stats(&[Loss, Loss, Loss]).unwrap();
        assert_eq!(stats.win_ratio, 0.0);
        assert_eq!(stats.win_streak, 0);
        assert_eq!(stats.lose_streak, 3);
    }

    #[test]
    fn test_spin_outcomes_skip_flat_and_missing() {
        let s = session(
            "s",
            vec![
                record(4, Some((100.0, 150.0))),
                record(3, Some((150.0, 150.0))),
                record(2, None),
                record(1, Some((150.0, 50.0))),
            ],
        );
        assert_eq!(spin_outcomes(&s), vec![Win, Loss]);
    }

    #[test]
    fn test_sentinel_session_without_bankroll() {
        let user = User {
            id: "u".to_string(),
            sessions: vec![session("s", vec![record(3, None), record(2, None), record(1, None)])],
        };

        let features = FeatureExtractor::default().extract(&user).unwrap();
        assert_eq!(features.length, 3);
        assert_eq!(features.spins, 0);
        assert!(features.stats.is_none());
        assert!(!features.returned);
    }

    fn two_session_user(gap: Millis) -> User {
        let reference_end = 10 * HOUR_MS;
        User {
            id: "u".to_string(),
            sessions: vec![
                session("next", vec![record(reference_end + gap, None)]),
                session("first", vec![record(0, None), record(reference_end, None)]),
            ],
        }
    }

    #[test]
    fn test_return_label_within_window() {
        let user = two_session_user(23 * HOUR_MS + 59 * MINUTE_MS);
        assert!(FeatureExtractor::default().extract(&user).unwrap().returned);
    }

    #[test]
    fn test_return_label_outside_window() {
        let user = two_session_user(24 * HOUR_MS + MINUTE_MS);
        assert!(!FeatureExtractor::default().extract(&user).unwrap().returned);
    }

    #[test]
    fn test_return_label_exactly_at_window() {
        let user = two_session_user(24 * HOUR_MS);
        assert!(!FeatureExtractor::default().extract(&user).unwrap().returned);
    }

    #[test]
    fn test_label_uses_second_oldest_session() {
        let user = User {
            id: "u".to_string(),
            sessions: vec![
                session("latest", vec![record(200 * HOUR_MS, None)]),
                session("second", vec![record(10 * HOUR_MS, None)]),
                session("first", vec![record(0, Some((10.0, 20.0)))]),
            ],
        };

        let features = FeatureExtractor::default().extract(&user).unwrap();
        assert!(features.returned);
        assert_eq!(features.length, 1);
        assert_eq!(features.spins, 1);
    }

    #[test]
    fn test_extract_all_skips_empty_users() {
        let mut cohort = UserMap::new();
        cohort.insert(
            "a".to_string(),
            User {
                id: "a".to_string(),
                sessions: vec![session("s", vec![record(0, Some((1.0, 2.0)))])],
            },
        );
        cohort.insert(
            "b".to_string(),
            User {
                id: "b".to_string(),
                sessions: vec![],
            },
        );

        let matrix = FeatureExtractor::default().extract_all(&cohort);
        assert_eq!(matrix.len(), 1);
        assert_eq!(matrix["a"].stats.unwrap().win_ratio, 1.0);
    }

    #[test]
    fn test_return_label_with_extreme_timestamps() {
        let user = User {
            id: "u".to_string(),
            sessions: vec![
                session("next", vec![record(Millis::MAX, None)]),
                session("first", vec![record(Millis::MIN, None)]),
            ],
        };
        assert!(!FeatureExtractor::default().extract(&user).unwrap().returned);
    }
}
