//! # Quizroom Library
//!
//! This library provides the core logic for a room-code based live quiz
//! system. An admin authors questions and drives a shared session through
//! its lifecycle while participants join with a room code, answer the
//! currently aired question, and follow their scores on a live scoreboard.
//!
//! The session state machine, answer ledger, scoring rules, and scoreboard
//! projections are self-contained and in-memory; identity and update
//! delivery are trait seams filled in by the embedding host.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::wildcard_imports)]
use derive_where::derive_where;
use itertools::Itertools;
use serde::Serialize;
use thiserror::Error;

pub mod constants;

pub mod answer;
pub mod directory;
pub mod identity;
pub mod participant;
pub mod question;
pub mod room_code;
pub mod scoreboard;
pub mod scoring;
pub mod session;
pub mod watch;

/// Failures surfaced by session, ledger, and directory operations
///
/// Duplicate answer submissions are deliberately absent: re-submitting is an
/// idempotent no-op (see [`answer::Submission`]), not a failure.
#[derive(Error, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The referenced room code resolves to no quiz
    #[error("quiz not found")]
    QuizNotFound,
    /// The referenced question does not exist in the quiz
    #[error("question not found")]
    QuestionNotFound,
    /// The referenced participant has not joined the quiz
    #[error("participant not found")]
    ParticipantNotFound,
    /// No answer record exists for the referenced question and participant
    #[error("answer not found")]
    AnswerNotFound,
    /// The acting identity is not the quiz's recorded admin
    #[error("only the quiz owner may perform this action")]
    NotOwner,
    /// The operation is not permitted in the quiz's current phase
    #[error("not allowed while the quiz is {0}")]
    WrongPhase(session::Phase),
    /// The answer already carries a recorded grading decision
    #[error("answer is already verified")]
    AlreadyVerified,
    /// The input was rejected before any state was written
    #[error("invalid input: {0}")]
    Validation(String),
    /// The backing store or transport is temporarily unavailable
    ///
    /// Produced by storage adapters, never by the in-memory core. Callers
    /// may retry; the library itself does not.
    #[error("transient failure: {0}")]
    Transient(String),
}

impl Error {
    /// Whether retrying the failed operation without changes can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient(_))
    }
}

/// Messages sent to notify subscribers about state changes
///
/// This enum wraps the per-module update messages into one envelope so a
/// single subscription channel can carry every kind of change notification.
#[derive(Debug, Serialize, Clone, derive_more::From)]
pub enum UpdateMessage {
    /// Session lifecycle and question flow updates
    Session(session::UpdateMessage),
    /// Scoreboard ranking updates
    Scoreboard(scoreboard::UpdateMessage),
}

/// Messages sent to synchronize a late or reconnecting subscriber
///
/// Sync messages carry the full view of the current phase rather than a
/// delta, letting a subscriber reconstruct its state from one message.
#[derive(Debug, Serialize, Clone, derive_more::From)]
pub enum SyncMessage {
    /// Session lifecycle and question flow state
    Session(session::SyncMessage),
    /// Scoreboard ranking state
    Scoreboard(scoreboard::SyncMessage),
}

impl UpdateMessage {
    /// Converts the update message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

impl SyncMessage {
    /// Converts the sync message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// A truncated vector that maintains the exact count while limiting displayed items
///
/// Used by the scoreboard projections to show a bounded leaderboard slice
/// ("top 3 of 117") without shipping the full ranking to every display.
#[derive(Debug, Clone, Serialize)]
#[derive_where(Default)]
pub struct TruncatedVec<T> {
    /// The exact total count of items
    exact_count: usize,
    /// The truncated list of items (up to the limit)
    items: Vec<T>,
}

impl<T: Clone> TruncatedVec<T> {
    /// Creates a new truncated vector from an iterator
    ///
    /// # Arguments
    ///
    /// * `list` - An iterator over items to include
    /// * `limit` - Maximum number of items to include in the truncated vector
    /// * `exact_count` - The exact total count of items (may be larger than limit)
    pub fn new<I: Iterator<Item = T>>(list: I, limit: usize, exact_count: usize) -> Self {
        let items = list.take(limit).collect_vec();
        Self { exact_count, items }
    }

    /// Maps a function over the items in the truncated vector
    pub fn map<F, U>(self, f: F) -> TruncatedVec<U>
    where
        F: Fn(T) -> U,
    {
        TruncatedVec {
            exact_count: self.exact_count,
            items: self.items.into_iter().map(f).collect_vec(),
        }
    }

    /// Returns the exact count of items
    pub fn exact_count(&self) -> usize {
        self.exact_count
    }

    /// Returns the truncated items
    pub fn items(&self) -> &[T] {
        &self.items
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_vec_new() {
        let data = vec![1, 2, 3, 4, 5];
        let truncated = TruncatedVec::new(data.into_iter(), 3, 5);

        assert_eq!(truncated.exact_count(), 5);
        assert_eq!(truncated.items(), &[1, 2, 3]);
    }

    #[test]
    fn test_truncated_vec_limit_larger_than_items() {
        let data = vec![1, 2];
        let truncated = TruncatedVec::new(data.into_iter(), 5, 2);

        assert_eq!(truncated.exact_count(), 2);
        assert_eq!(truncated.items(), &[1, 2]);
    }

    #[test]
    fn test_truncated_vec_map() {
        let data = vec![1, 2, 3];
        let truncated = TruncatedVec::new(data.into_iter(), 3, 5);
        let mapped = truncated.map(|x| x * 10);

        assert_eq!(mapped.exact_count(), 5);
        assert_eq!(mapped.items(), &[10, 20, 30]);
    }

    #[test]
    fn test_error_retryability() {
        assert!(Error::Transient("store offline".to_owned()).is_retryable());
        assert!(!Error::QuizNotFound.is_retryable());
        assert!(!Error::NotOwner.is_retryable());
        assert!(!Error::Validation("empty name".to_owned()).is_retryable());
    }

    #[test]
    fn test_update_message_to_message() {
        let msg = UpdateMessage::Session(session::UpdateMessage::QuizStarted);
        let json = msg.to_message();

        assert!(json.contains("Session"));
        assert!(json.contains("QuizStarted"));
    }
}
