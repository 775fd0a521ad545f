//! Session reconstruction
//!
//! Raw records are folded into per-user session builders keyed by session id,
//! then finalized in a separate pass:
//!
//! 1. sessions are sorted by start, most recent first (stable for ties)
//! 2. neighbouring sessions closer than the merge gap are merged
//! 3. records inside each session are sorted newest first

use crate::config::DEFAULT_MERGE_GAP_MS;
use crate::error::FeatureError;
use crate::schema::RawRecord;
use crate::types::{Millis, Record, Session, User, UserMap};
use std::collections::{BTreeMap, HashMap};

/// Sessions for one user in the order they were first seen
#[derive(Debug, Default)]
struct UserBuilder {
    sessions: Vec<Session>,
    by_id: HashMap<String, usize>,
}

impl UserBuilder {
    fn insert(&mut self, session_id: String, record: Record) {
        match self.by_id.get(&session_id) {
            Some(&idx) => self.sessions[idx].absorb(record),
            None => {
                self.by_id.insert(session_id.clone(), self.sessions.len());
                self.sessions.push(Session::new(session_id, record));
            }
        }
    }
}

/// Groups raw records into ordered, merged sessions per user
#[derive(Debug, Clone, Copy)]
pub struct SessionReconstructor {
    merge_gap_ms: Millis,
}

impl Default for SessionReconstructor {
    fn default() -> Self {
        Self::new(DEFAULT_MERGE_GAP_MS)
    }
}

impl SessionReconstructor {
    pub fn new(merge_gap_ms: Millis) -> Self {
        Self { merge_gap_ms }
    }

    pub fn merge_gap_ms(&self) -> Millis {
        self.merge_gap_ms
    }

    /// Reconstruct every user's sessions from a batch of raw records.
    ///
    /// Fails on the first record whose timestamp cannot be decoded; no partial
    /// result is returned.
    pub fn reconstruct<I>(&self, records: I) -> Result<UserMap, FeatureError>
    where
        I: IntoIterator<Item = RawRecord>,
    {
        let grouped = group_records(records)?;
        Ok(self.finalize(grouped))
    }

    fn finalize(&self, grouped: BTreeMap<String, UserBuilder>) -> UserMap {
        let mut merged_total = 0;

        let users: UserMap = grouped
            .into_iter()
            .map(|(user_id, builder)| {
                let mut sessions = builder.sessions;
                let before = sessions.len();

                sort_sessions(&mut sessions);
                let mut sessions = merge_adjacent(sessions, self.merge_gap_ms);
                for session in &mut sessions {
                    sort_contents(session);
                }

                merged_total += before - sessions.len();
                let user = User {
                    id: user_id.clone(),
                    sessions,
                };
                (user_id, user)
            })
            .collect();

        tracing::debug!(
            "Reconstructed {} users, merged {} sessions",
            users.len(),
            merged_total
        );
        users
    }
}

/// Fold records into per-user builders
fn group_records<I>(records: I) -> Result<BTreeMap<String, UserBuilder>, FeatureError>
where
    I: IntoIterator<Item = RawRecord>,
{
    let mut count = 0usize;
    let grouped = records.into_iter().try_fold(
        BTreeMap::<String, UserBuilder>::new(),
        |mut users, raw| {
            let RawRecord {
                user_id,
                session_id,
                body,
            } = raw;
            let record = Record::from_body(body).map_err(|e| match e {
                FeatureError::MissingField(field) => FeatureError::MissingField(format!(
                    "{field} (user {user_id}, session {session_id})"
                )),
                FeatureError::DateParseError(msg) => FeatureError::DateParseError(format!(
                    "{msg} (user {user_id}, session {session_id})"
                )),
                other => other,
            })?;

            count += 1;
            users.entry(user_id).or_default().insert(session_id, record);
            Ok::<_, FeatureError>(users)
        },
    )?;

    tracing::debug!("Grouped {} records for {} users", count, grouped.len());
    Ok(grouped)
}

/// Most recent start first; ties keep encounter order
fn sort_sessions(sessions: &mut [Session]) {
    sessions.sort_by(|a, b| b.start.cmp(&a.start));
}

/// Newest record first; ties keep insertion order
fn sort_contents(session: &mut Session) {
    session.contents.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Merge each session into the output when it starts less than `gap_ms`
/// before its newer neighbour (in sorted order) ends.
///
/// `sessions` must already be sorted newest first. The absorbing session keeps
/// its own start and end.
fn merge_adjacent(sessions: Vec<Session>, gap_ms: Millis) -> Vec<Session> {
    let mut merged: Vec<Session> = Vec::with_capacity(sessions.len());
    let mut previous_end: Option<Millis> = None;

    for session in sessions {
        let absorb =
            previous_end.is_some_and(|end| end.saturating_sub(session.start) < gap_ms);
        previous_end = Some(session.end);

        if absorb {
            if let Some(last) = merged.last_mut() {
                tracing::trace!("Merging session {} into {}", session.id, last.id);
                last.absorbed.push(session.id);
                last.absorbed.extend(session.absorbed);
                last.contents.extend(session.contents);
                continue;
            }
        }
        merged.push(session);
    }

    merged
}
