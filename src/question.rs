//! Question authoring and the question bank
//!
//! This module defines the two question forms an admin can author
//! (multiple choice with a single correct option, and descriptive with
//! free-text answers graded by hand) plus the ordered bank they live in. Questions
//! are pure data: everything beyond validation (airing, gating, grading)
//! belongs to the session state machine.

use std::{fmt::Display, str::FromStr, time::Duration};

use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use uuid::Uuid;

use crate::{Error, constants};

/// A unique identifier for a question within a quiz
///
/// Assigned once at creation and stable across edits, so answer records and
/// the aired-question set keep referring to the same question no matter how
/// its content changes before airing.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde_with::DeserializeFromStr,
    serde_with::SerializeDisplay,
)]
pub struct QuestionId(Uuid);

impl QuestionId {
    /// Creates a new random question ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for QuestionId {
    /// Creates a new random question ID (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for QuestionId {
    /// Formats the ID as a UUID string
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for QuestionId {
    type Err = uuid::Error;

    /// Parses an ID from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

type ValidationResult = garde::Result;

/// Validates that a question timer falls within the allowed bounds
fn validate_timer(val: &Option<Duration>, _ctx: &()) -> ValidationResult {
    match val {
        None => Ok(()),
        Some(duration) => {
            if (constants::question::MIN_TIMER..=constants::question::MAX_TIMER)
                .contains(&duration.as_secs())
            {
                Ok(())
            } else {
                Err(garde::Error::new(format!(
                    "timer is outside of the bounds [{},{}]",
                    constants::question::MIN_TIMER,
                    constants::question::MAX_TIMER,
                )))
            }
        }
    }
}

/// The form of a question, carrying only the fields relevant to that form
///
/// Descriptive questions structurally carry no options and no correct
/// index; the distinction is enforced by the type, not by convention.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub enum QuestionKind {
    /// A question with predefined options and exactly one correct answer
    MultipleChoice {
        /// The option labels participants choose between
        #[garde(length(min = 1, max = constants::question::MAX_OPTION_COUNT), inner(length(max = constants::question::MAX_OPTION_LENGTH)))]
        options: Vec<String>,
        /// Index into `options` of the correct answer
        #[garde(skip)]
        correct: usize,
    },
    /// A free-text question graded by hand
    Descriptive {
        /// Optional human-readable correct answer shown at the public reveal
        #[garde(inner(length(max = constants::question::MAX_REVEAL_LENGTH)))]
        reveal: Option<String>,
    },
}

/// A single authored question
///
/// `points` is awarded on a correct or accepted answer; `negative_points`
/// is subtracted on an incorrect or rejected one. A timed question closes
/// itself when the timer elapses; an untimed one stays open until the admin
/// ends it.
#[serde_with::serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Question {
    /// Stable identity, assigned at creation
    #[garde(skip)]
    id: QuestionId,
    /// The question text shown to participants
    #[garde(length(min = 1, max = constants::question::MAX_TEXT_LENGTH))]
    pub text: String,
    /// The form of the question and its form-specific fields
    #[garde(dive)]
    pub kind: QuestionKind,
    /// Points awarded on a correct or accepted answer
    #[garde(range(min = 1))]
    pub points: u32,
    /// Points subtracted on an incorrect or rejected answer
    #[garde(skip)]
    pub negative_points: u32,
    /// Optional answering window in seconds
    #[garde(custom(validate_timer))]
    #[serde_as(as = "Option<serde_with::DurationSeconds<u64>>")]
    pub timer: Option<Duration>,
}

impl Question {
    /// Creates a question with a fresh stable id
    pub fn new(
        text: impl Into<String>,
        kind: QuestionKind,
        points: u32,
        negative_points: u32,
        timer: Option<Duration>,
    ) -> Self {
        Self {
            id: QuestionId::new(),
            text: text.into(),
            kind,
            points,
            negative_points,
            timer,
        }
    }

    /// Returns the question's stable identity
    pub fn id(&self) -> QuestionId {
        self.id
    }

    /// Whether this question is graded automatically at submission time
    pub fn is_auto_graded(&self) -> bool {
        matches!(self.kind, QuestionKind::MultipleChoice { .. })
    }

    /// The human-readable correct answer for the public reveal, if any
    ///
    /// For multiple choice this is the correct option's label; for
    /// descriptive questions it is the authored reveal text.
    pub fn reveal_text(&self) -> Option<&str> {
        match &self.kind {
            QuestionKind::MultipleChoice { options, correct } => {
                options.get(*correct).map(String::as_str)
            }
            QuestionKind::Descriptive { reveal } => reveal.as_deref(),
        }
    }

    /// Checks the question's content before it is written to the bank
    ///
    /// Runs the declarative field checks plus the one cross-field rule the
    /// derive cannot express: the correct index of a multiple choice
    /// question must point at an existing option.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] describing the first violated rule.
    pub fn check(&self) -> Result<(), Error> {
        self.validate()
            .map_err(|report| Error::Validation(report.to_string()))?;

        if let QuestionKind::MultipleChoice { options, correct } = &self.kind {
            if *correct >= options.len() {
                return Err(Error::Validation(format!(
                    "correct answer index {correct} is out of range for {} options",
                    options.len()
                )));
            }
        }

        Ok(())
    }
}

/// The ordered collection of questions belonging to one quiz
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct QuestionBank {
    /// Questions in authored order
    questions: Vec<Question>,
}

impl QuestionBank {
    /// Adds a question to the end of the bank
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the question's content is invalid
    /// or the bank is full.
    pub fn add(&mut self, question: Question) -> Result<QuestionId, Error> {
        question.check()?;

        if self.questions.len() >= constants::quiz::MAX_QUESTION_COUNT {
            return Err(Error::Validation(format!(
                "quiz already has {} questions",
                constants::quiz::MAX_QUESTION_COUNT
            )));
        }

        let id = question.id();
        self.questions.push(question);
        Ok(id)
    }

    /// Replaces the content of an existing question, keeping its identity
    ///
    /// # Errors
    ///
    /// Returns [`Error::QuestionNotFound`] for an unknown id and
    /// [`Error::Validation`] when the edited content is invalid.
    pub fn edit(&mut self, id: QuestionId, mut edited: Question) -> Result<(), Error> {
        edited.check()?;

        let slot = self
            .questions
            .iter_mut()
            .find(|q| q.id == id)
            .ok_or(Error::QuestionNotFound)?;

        // Identity is stable across edits regardless of what the caller
        // constructed the replacement with.
        edited.id = id;
        *slot = edited;
        Ok(())
    }

    /// Removes a question from the bank
    ///
    /// # Errors
    ///
    /// Returns [`Error::QuestionNotFound`] for an unknown id.
    pub fn remove(&mut self, id: QuestionId) -> Result<Question, Error> {
        let position = self
            .questions
            .iter()
            .position(|q| q.id == id)
            .ok_or(Error::QuestionNotFound)?;
        Ok(self.questions.remove(position))
    }

    /// Looks up a question by id
    pub fn get(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Returns the questions in authored order
    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }

    /// Returns the number of questions in the bank
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Checks whether the bank contains any questions
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn mcq() -> Question {
        Question::new(
            "Which planet is closest to the sun?",
            QuestionKind::MultipleChoice {
                options: vec![
                    "Mercury".to_owned(),
                    "Venus".to_owned(),
                    "Mars".to_owned(),
                ],
                correct: 0,
            },
            10,
            2,
            Some(Duration::from_secs(30)),
        )
    }

    fn descriptive() -> Question {
        Question::new(
            "Explain why the sky is blue.",
            QuestionKind::Descriptive {
                reveal: Some("Rayleigh scattering".to_owned()),
            },
            5,
            0,
            None,
        )
    }

    #[test]
    fn test_valid_questions_pass() {
        assert!(mcq().check().is_ok());
        assert!(descriptive().check().is_ok());
    }

    #[test]
    fn test_empty_text_rejected() {
        let mut question = mcq();
        question.text = String::new();
        assert!(matches!(question.check(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_zero_points_rejected() {
        let mut question = mcq();
        question.points = 0;
        assert!(matches!(question.check(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_no_options_rejected() {
        let mut question = mcq();
        question.kind = QuestionKind::MultipleChoice {
            options: vec![],
            correct: 0,
        };
        assert!(matches!(question.check(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_correct_index_out_of_range_rejected() {
        let mut question = mcq();
        question.kind = QuestionKind::MultipleChoice {
            options: vec!["Yes".to_owned(), "No".to_owned()],
            correct: 2,
        };
        assert!(matches!(question.check(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_timer_out_of_bounds_rejected() {
        let mut question = mcq();
        question.timer = Some(Duration::from_secs(1));
        assert!(matches!(question.check(), Err(Error::Validation(_))));

        question.timer = Some(Duration::from_secs(
            crate::constants::question::MAX_TIMER + 1,
        ));
        assert!(matches!(question.check(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_reveal_text() {
        assert_eq!(mcq().reveal_text(), Some("Mercury"));
        assert_eq!(descriptive().reveal_text(), Some("Rayleigh scattering"));

        let silent = Question::new(
            "Name a prime number.",
            QuestionKind::Descriptive { reveal: None },
            1,
            0,
            None,
        );
        assert_eq!(silent.reveal_text(), None);
    }

    #[test]
    fn test_bank_add_and_get() {
        let mut bank = QuestionBank::default();
        let id = bank.add(mcq()).unwrap();

        assert_eq!(bank.len(), 1);
        assert_eq!(bank.get(id).unwrap().id(), id);
    }

    #[test]
    fn test_bank_add_invalid_rejected() {
        let mut bank = QuestionBank::default();
        let mut question = mcq();
        question.text = String::new();

        assert!(bank.add(question).is_err());
        assert!(bank.is_empty());
    }

    #[test]
    fn test_bank_edit_keeps_identity() {
        let mut bank = QuestionBank::default();
        let id = bank.add(mcq()).unwrap();

        bank.edit(id, descriptive()).unwrap();

        let edited = bank.get(id).unwrap();
        assert_eq!(edited.id(), id);
        assert!(matches!(edited.kind, QuestionKind::Descriptive { .. }));
    }

    #[test]
    fn test_bank_edit_unknown_id() {
        let mut bank = QuestionBank::default();
        assert_eq!(
            bank.edit(QuestionId::new(), mcq()),
            Err(Error::QuestionNotFound)
        );
    }

    #[test]
    fn test_bank_remove() {
        let mut bank = QuestionBank::default();
        let id = bank.add(mcq()).unwrap();

        let removed = bank.remove(id).unwrap();
        assert_eq!(removed.id(), id);
        assert!(bank.is_empty());
        assert!(matches!(bank.remove(id), Err(Error::QuestionNotFound)));
    }

    #[test]
    fn test_bank_preserves_order() {
        let mut bank = QuestionBank::default();
        let first = bank.add(mcq()).unwrap();
        let second = bank.add(descriptive()).unwrap();

        let ids: Vec<_> = bank.iter().map(Question::id).collect();
        assert_eq!(ids, vec![first, second]);
    }
}
