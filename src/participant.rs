//! Participant records and score tracking
//!
//! This module tracks who has joined a quiz and what they have scored.
//! Participants are keyed by the stable user id the identity collaborator
//! assigns, so rejoining from a new device resumes the same record instead
//! of minting a duplicate. Display names are validated for emptiness,
//! length, and content, but not uniqueness: two friends may both be "Sam".

use std::collections::HashMap;

use rustrict::CensorStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Error as CrateError, constants, identity::UserId};

/// Errors that can occur when validating a display name
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameError {
    /// The name is empty or contains only whitespace
    #[error("name cannot be empty")]
    Empty,
    /// The name exceeds the maximum allowed length
    #[error("name is too long")]
    TooLong,
    /// The name contains inappropriate content
    #[error("name is inappropriate")]
    Inappropriate,
}

/// Validates and normalizes a display name
///
/// Trims surrounding whitespace and rejects empty, over-long, and
/// inappropriate names before anything is written.
///
/// # Errors
///
/// Returns the first [`NameError`] the name violates.
pub fn validate_name(name: &str) -> Result<String, NameError> {
    let name = name.trim();

    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.len() > constants::participant::MAX_NAME_LENGTH {
        return Err(NameError::TooLong);
    }
    if name.is_inappropriate() {
        return Err(NameError::Inappropriate);
    }

    Ok(name.to_owned())
}

/// One joined participant: a display name and a cumulative score
///
/// The score is signed; incorrect answers on questions with a penalty can
/// push it below zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// The validated display name
    name: String,
    /// Cumulative score across all graded answers
    score: i64,
}

impl Participant {
    /// Returns the participant's display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the participant's cumulative score
    pub fn score(&self) -> i64 {
        self.score
    }
}

/// Tracks the participants of one quiz and their scores
///
/// Score mutation is exposed only as a relative increment so that the
/// auto-grading path and the manual grading path can interleave on
/// different participants without losing updates.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ParticipantRegistry {
    /// Participants keyed by their stable user id
    mapping: HashMap<UserId, Participant>,
}

impl ParticipantRegistry {
    /// Joins a participant, creating their record with a zero score
    ///
    /// Joining again with the same user id is idempotent: the display name
    /// is refreshed but the score is never reset.
    ///
    /// # Errors
    ///
    /// Returns [`CrateError::Validation`] for an invalid name or a full
    /// quiz.
    pub fn join(&mut self, user: UserId, name: &str) -> Result<(), CrateError> {
        let name = validate_name(name).map_err(|e| CrateError::Validation(e.to_string()))?;

        if let Some(existing) = self.mapping.get_mut(&user) {
            existing.name = name;
            return Ok(());
        }

        if self.mapping.len() >= constants::participant::MAX_PARTICIPANT_COUNT {
            return Err(CrateError::Validation(format!(
                "quiz already has {} participants",
                constants::participant::MAX_PARTICIPANT_COUNT
            )));
        }

        self.mapping.insert(user, Participant { name, score: 0 });
        Ok(())
    }

    /// Applies a signed score increment to a participant
    ///
    /// # Errors
    ///
    /// Returns [`CrateError::ParticipantNotFound`] if the user has not
    /// joined.
    ///
    /// # Returns
    ///
    /// The participant's new cumulative score.
    pub fn apply_score_delta(&mut self, user: UserId, delta: i64) -> Result<i64, CrateError> {
        let participant = self
            .mapping
            .get_mut(&user)
            .ok_or(CrateError::ParticipantNotFound)?;
        participant.score += delta;
        Ok(participant.score)
    }

    /// Removes a participant from the quiz
    ///
    /// Their historical answer records are left in the ledger as orphaned
    /// data unless the whole quiz is deleted.
    ///
    /// # Errors
    ///
    /// Returns [`CrateError::ParticipantNotFound`] if the user has not
    /// joined.
    pub fn remove(&mut self, user: UserId) -> Result<Participant, CrateError> {
        self.mapping
            .remove(&user)
            .ok_or(CrateError::ParticipantNotFound)
    }

    /// Looks up a participant by user id
    pub fn get(&self, user: UserId) -> Option<&Participant> {
        self.mapping.get(&user)
    }

    /// Checks whether a user has joined
    pub fn contains(&self, user: UserId) -> bool {
        self.mapping.contains_key(&user)
    }

    /// Iterates over all participants in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = (UserId, &Participant)> {
        self.mapping.iter().map(|(id, p)| (*id, p))
    }

    /// Returns the number of joined participants
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    /// Checks whether anyone has joined
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name_trims() {
        assert_eq!(validate_name("  Ada  ").unwrap(), "Ada");
    }

    #[test]
    fn test_validate_name_empty() {
        assert_eq!(validate_name(""), Err(NameError::Empty));
        assert_eq!(validate_name("   "), Err(NameError::Empty));
    }

    #[test]
    fn test_validate_name_too_long() {
        let name = "a".repeat(constants::participant::MAX_NAME_LENGTH + 1);
        assert_eq!(validate_name(&name), Err(NameError::TooLong));
    }

    #[test]
    fn test_join_starts_at_zero() {
        let mut registry = ParticipantRegistry::default();
        let user = UserId::new();

        registry.join(user, "Ada").unwrap();

        let participant = registry.get(user).unwrap();
        assert_eq!(participant.name(), "Ada");
        assert_eq!(participant.score(), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_rejoin_preserves_score() {
        let mut registry = ParticipantRegistry::default();
        let user = UserId::new();

        registry.join(user, "Ada").unwrap();
        registry.apply_score_delta(user, 25).unwrap();
        registry.join(user, "Ada L.").unwrap();

        let participant = registry.get(user).unwrap();
        assert_eq!(participant.name(), "Ada L.");
        assert_eq!(participant.score(), 25);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_join_invalid_name_writes_nothing() {
        let mut registry = ParticipantRegistry::default();
        let user = UserId::new();

        assert!(registry.join(user, "  ").is_err());
        assert!(!registry.contains(user));
    }

    #[test]
    fn test_score_delta_accumulates() {
        let mut registry = ParticipantRegistry::default();
        let user = UserId::new();
        registry.join(user, "Ada").unwrap();

        assert_eq!(registry.apply_score_delta(user, 10).unwrap(), 10);
        assert_eq!(registry.apply_score_delta(user, -2).unwrap(), 8);
        assert_eq!(registry.apply_score_delta(user, -20).unwrap(), -12);
    }

    #[test]
    fn test_interleaved_deltas_lose_nothing() {
        let mut registry = ParticipantRegistry::default();
        let first = UserId::new();
        let second = UserId::new();
        registry.join(first, "Ada").unwrap();
        registry.join(second, "Grace").unwrap();

        // Auto-grading and manual grading interleave on different
        // participants; every increment must land.
        registry.apply_score_delta(first, 10).unwrap();
        registry.apply_score_delta(second, -2).unwrap();
        registry.apply_score_delta(first, 5).unwrap();
        registry.apply_score_delta(second, 7).unwrap();

        assert_eq!(registry.get(first).unwrap().score(), 15);
        assert_eq!(registry.get(second).unwrap().score(), 5);
    }

    #[test]
    fn test_delta_on_unknown_participant() {
        let mut registry = ParticipantRegistry::default();
        assert!(matches!(
            registry.apply_score_delta(UserId::new(), 1),
            Err(CrateError::ParticipantNotFound)
        ));
    }

    #[test]
    fn test_remove() {
        let mut registry = ParticipantRegistry::default();
        let user = UserId::new();
        registry.join(user, "Ada").unwrap();

        let removed = registry.remove(user).unwrap();
        assert_eq!(removed.name(), "Ada");
        assert!(registry.is_empty());
        assert!(matches!(
            registry.remove(user),
            Err(CrateError::ParticipantNotFound)
        ));
    }
}
