//! Answer records and the per-question ledger
//!
//! This module stores what each participant submitted for each question and
//! the grading decision attached to it. The ledger is strictly first-write:
//! a second submission for the same question is a no-op, and once a grading
//! decision is recorded the record is immutable. The session state machine
//! owns the gating (which question is live, who may grade) and pairs every
//! ledger write with its score increment; the ledger itself is pure
//! storage.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use web_time::SystemTime;

use crate::{Error, identity::UserId, question::QuestionId};

/// A participant's raw response to a live question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    /// The index of the chosen option (multiple choice)
    Choice(usize),
    /// Free text (descriptive)
    Text(String),
}

/// One stored answer with its grading state
///
/// `verified` flips to true exactly once (at submission time for
/// auto-graded questions, at manual grading time for descriptive ones)
/// and the record never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    /// The submitted text or chosen option label
    text: String,
    /// Whether a grading decision has been recorded
    verified: bool,
    /// The grading decision, absent while pending
    correct: Option<bool>,
    /// The signed delta actually applied to the participant's score
    awarded_points: Option<i64>,
    /// When the answer was submitted
    submitted_at: SystemTime,
}

impl Answer {
    /// Creates an ungraded answer awaiting a manual decision
    pub fn pending(text: impl Into<String>, submitted_at: SystemTime) -> Self {
        Self {
            text: text.into(),
            verified: false,
            correct: None,
            awarded_points: None,
            submitted_at,
        }
    }

    /// Creates an answer graded at submission time
    pub fn graded(
        text: impl Into<String>,
        correct: bool,
        awarded_points: i64,
        submitted_at: SystemTime,
    ) -> Self {
        Self {
            text: text.into(),
            verified: true,
            correct: Some(correct),
            awarded_points: Some(awarded_points),
            submitted_at,
        }
    }

    /// Returns the submitted text or chosen option label
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether a grading decision has been recorded
    pub fn verified(&self) -> bool {
        self.verified
    }

    /// The grading decision, absent while pending
    pub fn correct(&self) -> Option<bool> {
        self.correct
    }

    /// The signed delta applied to the participant's score
    pub fn awarded_points(&self) -> Option<i64> {
        self.awarded_points
    }

    /// When the answer was submitted
    pub fn submitted_at(&self) -> SystemTime {
        self.submitted_at
    }
}

/// The outcome of an attempted submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Submission {
    /// The answer was stored; auto-graded outcomes ride along
    Recorded {
        /// The grading decision, absent while pending manual grading
        correct: Option<bool>,
        /// The score delta applied with the write, absent while pending
        awarded_points: Option<i64>,
    },
    /// An answer already existed; nothing was written
    Duplicate,
}

/// Per-question, per-participant storage of submitted answers
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AnswerLedger {
    /// Answers keyed by question, then by submitting participant
    submissions: HashMap<QuestionId, HashMap<UserId, Answer>>,
}

impl AnswerLedger {
    /// Stores an answer unless one already exists for this pair
    ///
    /// The first submission wins; later ones return
    /// [`Submission::Duplicate`] and leave the stored record untouched, so
    /// callers know not to apply any score delta.
    pub fn submit(&mut self, question: QuestionId, user: UserId, answer: Answer) -> Submission {
        let per_question = self.submissions.entry(question).or_default();

        if per_question.contains_key(&user) {
            return Submission::Duplicate;
        }

        let outcome = Submission::Recorded {
            correct: answer.correct,
            awarded_points: answer.awarded_points,
        };
        per_question.insert(user, answer);
        outcome
    }

    /// Records a manual grading decision on a pending answer
    ///
    /// # Errors
    ///
    /// Returns [`Error::AnswerNotFound`] when nothing was submitted for
    /// this pair, and [`Error::AlreadyVerified`] when a decision already
    /// exists; verified records are immutable and the stored award is
    /// unchanged.
    pub fn grade(
        &mut self,
        question: QuestionId,
        user: UserId,
        correct: bool,
        awarded_points: i64,
    ) -> Result<(), Error> {
        let answer = self
            .submissions
            .get_mut(&question)
            .and_then(|per_question| per_question.get_mut(&user))
            .ok_or(Error::AnswerNotFound)?;

        if answer.verified {
            return Err(Error::AlreadyVerified);
        }

        answer.verified = true;
        answer.correct = Some(correct);
        answer.awarded_points = Some(awarded_points);
        Ok(())
    }

    /// Looks up the stored answer for a question/participant pair
    pub fn get(&self, question: QuestionId, user: UserId) -> Option<&Answer> {
        self.submissions
            .get(&question)
            .and_then(|per_question| per_question.get(&user))
    }

    /// Iterates over all answers submitted for a question
    pub fn submissions_for(
        &self,
        question: QuestionId,
    ) -> impl Iterator<Item = (UserId, &Answer)> {
        self.submissions
            .get(&question)
            .into_iter()
            .flat_map(|per_question| per_question.iter().map(|(id, a)| (*id, a)))
    }

    /// Returns the number of answers submitted for a question
    pub fn count(&self, question: QuestionId) -> usize {
        self.submissions.get(&question).map_or(0, HashMap::len)
    }

    /// Returns the number of answers still awaiting a grading decision
    pub fn pending_count(&self, question: QuestionId) -> usize {
        self.submissions_for(question)
            .filter(|(_, a)| !a.verified)
            .count()
    }

    /// Whether every submitted answer for a question carries a decision
    ///
    /// Vacuously true when nothing was submitted.
    pub fn all_verified(&self, question: QuestionId) -> bool {
        self.pending_count(question) == 0
    }
}
