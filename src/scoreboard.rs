//! Scoreboard projections
//!
//! Pure, read-only views over the participant registry for display
//! surfaces: the ranked leaderboard, a bounded top-N slice, the
//! alphabetical lobby roster, and the final-ranks podium. Nothing here is
//! cached or persisted; every projection is recomputed from the registry
//! on each read, so displays can never drift from the authoritative
//! scores.

use itertools::Itertools;
use serde::Serialize;

use crate::{TruncatedVec, identity::UserId, participant::ParticipantRegistry};

/// Number of participants celebrated on the final podium
const PODIUM_SIZE: usize = 3;

/// Maximum number of entries shipped to a display surface at once
const DISPLAY_LIMIT: usize = 50;

/// One row of a scoreboard projection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    /// The participant's stable user id
    pub user: UserId,
    /// The participant's display name
    pub name: String,
    /// The participant's cumulative score
    pub score: i64,
}

/// A participant's own score and leaderboard position
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct ScoreMessage {
    /// Cumulative points
    pub points: i64,
    /// Position in the ranking (1-indexed)
    pub position: usize,
}

/// The closing view of a finished quiz
///
/// The podium holds the top scorers in rank order; the rest of the field is
/// listed alphabetically underneath, matching how the public scoreboard
/// presents final results.
#[derive(Debug, Clone, Serialize)]
pub struct FinalRanks {
    /// Top scorers in rank order
    pub podium: Vec<Entry>,
    /// Everyone, alphabetically by name
    pub field: Vec<Entry>,
}

/// Update messages sent to scoreboard display surfaces
#[derive(Debug, Serialize, Clone)]
pub enum UpdateMessage {
    /// The ranking changed after grading
    Ranking(TruncatedVec<Entry>),
    /// The quiz finished; show the podium
    FinalRanks(FinalRanks),
}

/// Sync messages for scoreboard surfaces joining mid-quiz
#[derive(Debug, Serialize, Clone)]
pub enum SyncMessage {
    /// Current ranking
    Ranking(TruncatedVec<Entry>),
    /// Final results of a finished quiz
    FinalRanks(FinalRanks),
}

fn entry(user: UserId, participant: &crate::participant::Participant) -> Entry {
    Entry {
        user,
        name: participant.name().to_owned(),
        score: participant.score(),
    }
}

/// Ranks all participants by descending score
///
/// Ties are broken name-lexicographically, then by user id, so the ranking
/// is fully deterministic regardless of registry iteration order.
pub fn ranked(registry: &ParticipantRegistry) -> Vec<Entry> {
    registry
        .iter()
        .map(|(user, participant)| entry(user, participant))
        .sorted_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.user.cmp(&b.user))
        })
        .collect_vec()
}

/// Returns the first `n` of the ranking, retaining the exact total count
pub fn top(registry: &ParticipantRegistry, n: usize) -> TruncatedVec<Entry> {
    let full = ranked(registry);
    let exact_count = full.len();
    TruncatedVec::new(full.into_iter(), n, exact_count)
}

/// Lists all participants alphabetically by name for lobby displays
pub fn alphabetical(registry: &ParticipantRegistry) -> Vec<Entry> {
    registry
        .iter()
        .map(|(user, participant)| entry(user, participant))
        .sorted_by(|a, b| a.name.cmp(&b.name).then_with(|| a.user.cmp(&b.user)))
        .collect_vec()
}

/// Returns one participant's score and 1-indexed ranking position
pub fn standing(registry: &ParticipantRegistry, user: UserId) -> Option<ScoreMessage> {
    ranked(registry)
        .iter()
        .position(|e| e.user == user)
        .map(|index| ScoreMessage {
            points: registry.get(user).map_or(0, |p| p.score()),
            position: index + 1,
        })
}

/// Builds the closing view of a finished quiz
pub fn final_ranks(registry: &ParticipantRegistry) -> FinalRanks {
    let ranking = ranked(registry);
    FinalRanks {
        podium: ranking.iter().take(PODIUM_SIZE).cloned().collect_vec(),
        field: alphabetical(registry),
    }
}

/// Builds the bounded ranking snapshot broadcast to display surfaces
pub fn display_snapshot(registry: &ParticipantRegistry) -> TruncatedVec<Entry> {
    top(registry, DISPLAY_LIMIT)
}
