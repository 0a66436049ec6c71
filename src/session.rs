//! Quiz session lifecycle and state management
//!
//! This module contains the session state machine at the heart of the
//! library: the phases a quiz moves through, who may trigger each
//! transition, how answer submission is gated against the currently aired
//! question, and how grading decisions flow into participant scores. Every
//! mutation notifies the subscription registry so the admin console,
//! participant devices, and the public scoreboard stay in step.

use std::{collections::HashSet, fmt::Display, time::Duration};

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use web_time::SystemTime;

use crate::{
    Error, TruncatedVec,
    answer::{Answer, AnswerLedger, Response, Submission},
    constants,
    identity::{Identity, UserId},
    participant::ParticipantRegistry,
    question::{Question, QuestionBank, QuestionId, QuestionKind},
    room_code::RoomCode,
    scoreboard::{self, Entry, ScoreMessage},
    scoring,
    watch::{Listener, Role, RoleKind, Subscriptions, WatchId},
};

/// Represents the current phase of a quiz session
///
/// A quiz starts in the lobby, runs through a loop of airing a question,
/// collecting answers, grading, and showing the scorecard, and ends in the
/// terminal finished phase. Deletion is possible from any phase and is not
/// a phase itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Participants are joining; no question has aired yet
    Lobby,
    /// Between questions; the admin is browsing the bank for what to air
    Running,
    /// A question is live and accepting answers
    QuestionLive,
    /// Answer collection has ended; grading is in progress
    QuestionEnded,
    /// Grading is complete and the scorecard is on display
    ScorecardDisplay,
    /// The quiz has concluded; no further airing is permitted
    Finished,
}

impl Display for Phase {
    /// Formats the phase for use in error messages
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Phase::Lobby => "in the lobby",
            Phase::Running => "between questions",
            Phase::QuestionLive => "airing a question",
            Phase::QuestionEnded => "grading answers",
            Phase::ScorecardDisplay => "showing the scorecard",
            Phase::Finished => "finished",
        })
    }
}

/// A participant-safe view of a question
///
/// Carries everything a device needs to render the question (text,
/// options, the answering window) while withholding which option is
/// correct until the reveal.
#[serde_with::serde_as]
#[skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
pub struct QuestionView {
    /// The question's stable identity
    pub id: QuestionId,
    /// The question text
    pub text: String,
    /// Option labels for multiple choice; absent for descriptive
    pub options: Option<Vec<String>>,
    /// The answering window, when the question is timed
    #[serde_as(as = "Option<serde_with::DurationSeconds<u64>>")]
    pub timer: Option<Duration>,
}

impl From<&Question> for QuestionView {
    /// Builds the redacted view of a question
    fn from(question: &Question) -> Self {
        Self {
            id: question.id(),
            text: question.text.clone(),
            options: match &question.kind {
                QuestionKind::MultipleChoice { options, .. } => Some(options.clone()),
                QuestionKind::Descriptive { .. } => None,
            },
            timer: question.timer,
        }
    }
}

/// Update messages sent to subscribers about session changes
#[skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
pub enum UpdateMessage {
    /// The quiz left the lobby
    QuizStarted,
    /// The roster of joined participants changed
    Roster(TruncatedVec<String>),
    /// A question went live
    QuestionAired {
        /// 1-indexed position of the question in the bank
        ordinal: usize,
        /// Total number of questions in the bank
        total: usize,
        /// The redacted question
        question: QuestionView,
    },
    /// (ADMIN ONLY) Number of answers received for the live question
    AnswerTally(usize),
    /// (ONE PARTICIPANT) A grading decision landed on their answer
    Verdict {
        /// Whether the answer was accepted as correct
        correct: bool,
        /// The signed delta applied to their score
        awarded_points: i64,
        /// Their resulting score and ranking position
        standing: Option<ScoreMessage>,
    },
    /// The live question stopped accepting answers
    QuestionEnded {
        /// Human-readable correct answer for the public reveal, if any
        reveal: Option<String>,
    },
    /// (ADMIN AND BOARD) Grading finished; the ranked scorecard is up
    Scorecard(TruncatedVec<Entry>),
    /// (ONE PARTICIPANT) Their score and position on the scorecard
    Score {
        /// Their score and ranking position, absent before any grading
        standing: Option<ScoreMessage>,
    },
    /// The scorecard was dismissed; the admin is back to browsing
    QuestionCleared,
    /// The quiz concluded
    QuizFinished {
        /// The recipient's final standing; absent for non-participants
        standing: Option<ScoreMessage>,
    },
    /// The quiz was deleted by its admin
    QuizDeleted,
}

/// Sync messages carrying the full current state to a late subscriber
#[serde_with::serde_as]
#[skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
pub enum SyncMessage {
    /// The quiz is in the lobby
    Lobby {
        /// The quiz title
        title: String,
        /// Joined participants, alphabetically
        roster: TruncatedVec<String>,
    },
    /// The quiz is between questions
    Browsing {
        /// How many questions have aired so far
        aired: usize,
        /// Total number of questions in the bank
        total: usize,
    },
    /// A question is live
    QuestionLive {
        /// 1-indexed position of the question in the bank
        ordinal: usize,
        /// Total number of questions in the bank
        total: usize,
        /// The redacted question
        question: QuestionView,
        /// Time left in the answering window, when the question is timed
        #[serde_as(as = "Option<serde_with::DurationSeconds<u64>>")]
        remaining: Option<Duration>,
        /// Number of answers received so far
        answered: usize,
    },
    /// Answer collection has ended and grading is in progress
    QuestionEnded {
        /// 1-indexed position of the question in the bank
        ordinal: usize,
        /// Total number of questions in the bank
        total: usize,
        /// The redacted question
        question: QuestionView,
        /// Human-readable correct answer for the public reveal, if any
        reveal: Option<String>,
        /// Number of answers still awaiting a grading decision
        pending: usize,
    },
    /// (PARTICIPANT) Their score and position while the scorecard is up
    Standing {
        /// Their score and ranking position, absent before any grading
        standing: Option<ScoreMessage>,
    },
    /// (PARTICIPANT) The quiz concluded with their final standing
    Finished {
        /// Their final score and ranking position
        standing: Option<ScoreMessage>,
    },
}

/// One live quiz: its content, its participants, and its state machine
///
/// The session is the single authority for the quiz's lifecycle. Admin
/// operations check the acting identity against the recorded owner;
/// participant operations are gated by the current phase and the currently
/// aired question, so a submission racing a question transition can never
/// land on the wrong question.
#[derive(Serialize, Deserialize)]
pub struct QuizSession {
    /// The public room code participants join with
    code: RoomCode,
    /// The quiz title
    title: String,
    /// The user id of the owning admin
    admin: UserId,
    /// Current lifecycle phase
    phase: Phase,
    /// The authored questions in order
    questions: QuestionBank,
    /// The currently aired question, if any
    current_question: Option<QuestionId>,
    /// Every question that has ever aired; grows monotonically
    aired: HashSet<QuestionId>,
    /// When the current timed question went live
    air_time: Option<SystemTime>,
    /// Joined participants and their scores
    participants: ParticipantRegistry,
    /// Submitted answers and their grading state
    ledger: AnswerLedger,
    /// Live subscriptions on this quiz (not persisted; watches are
    /// per-process and re-established on reconnect)
    #[serde(skip)]
    pub subscriptions: Subscriptions,
}

impl std::fmt::Debug for QuizSession {
    /// Custom debug implementation that avoids printing large amounts of data
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuizSession")
            .field("code", &self.code)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

// Accessors and small helpers
impl QuizSession {
    /// Creates a quiz in the lobby, owned by the given admin identity
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty or over-long title, or
    /// when the identity is anonymous, since participants cannot create
    /// quizzes.
    pub fn new(code: RoomCode, title: impl Into<String>, admin: &Identity) -> Result<Self, Error> {
        let title = title.into();
        let trimmed = title.trim();

        if trimmed.is_empty() {
            return Err(Error::Validation("quiz title cannot be empty".to_owned()));
        }
        if trimmed.len() > constants::quiz::MAX_TITLE_LENGTH {
            return Err(Error::Validation("quiz title is too long".to_owned()));
        }
        if admin.is_anonymous {
            return Err(Error::Validation(
                "an anonymous identity cannot create a quiz".to_owned(),
            ));
        }

        log::info!("quiz {code} created");

        Ok(Self {
            code,
            title: trimmed.to_owned(),
            admin: admin.id,
            phase: Phase::Lobby,
            questions: QuestionBank::default(),
            current_question: None,
            aired: HashSet::new(),
            air_time: None,
            participants: ParticipantRegistry::default(),
            ledger: AnswerLedger::default(),
            subscriptions: Subscriptions::default(),
        })
    }

    /// Returns the quiz's room code
    pub fn code(&self) -> RoomCode {
        self.code
    }

    /// Returns the quiz title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the owning admin's user id
    pub fn admin(&self) -> UserId {
        self.admin
    }

    /// Returns the current lifecycle phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the authored questions
    pub fn questions(&self) -> &QuestionBank {
        &self.questions
    }

    /// Returns the currently aired question, if any
    pub fn current_question(&self) -> Option<&Question> {
        self.current_question.and_then(|id| self.questions.get(id))
    }

    /// Returns the ids of every question that has aired
    pub fn aired(&self) -> &HashSet<QuestionId> {
        &self.aired
    }

    /// Returns the joined participants
    pub fn participants(&self) -> &ParticipantRegistry {
        &self.participants
    }

    /// Returns the answer ledger
    pub fn answers(&self) -> &AnswerLedger {
        &self.ledger
    }

    /// When the current timed question stops accepting answers
    ///
    /// `None` for untimed questions and outside the live phase. The
    /// deadline is observed by clients, not enforced by storage; a client
    /// that sees it elapse calls [`QuizSession::close_on_timeout`].
    pub fn deadline(&self) -> Option<SystemTime> {
        let air_time = self.air_time?;
        let timer = self.current_question()?.timer?;
        Some(air_time + timer)
    }

    /// Rejects actors other than the recorded admin
    fn authorize(&self, actor: UserId) -> Result<(), Error> {
        if actor == self.admin {
            Ok(())
        } else {
            Err(Error::NotOwner)
        }
    }

    /// Rejects operations outside the expected phase
    fn expect_phase(&self, expected: Phase) -> Result<(), Error> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(Error::WrongPhase(self.phase))
        }
    }

    /// The live question and its 1-indexed position in the bank
    fn current_with_ordinal(&self) -> Option<(&Question, usize)> {
        let id = self.current_question?;
        let ordinal = self.questions.iter().position(|q| q.id() == id)? + 1;
        self.questions.get(id).map(|q| (q, ordinal))
    }

    /// The alphabetical roster for lobby and admin displays
    fn roster(&self) -> TruncatedVec<String> {
        const LIMIT: usize = 50;

        let names = scoreboard::alphabetical(&self.participants);
        let exact_count = names.len();
        TruncatedVec::new(names.into_iter().map(|e| e.name), LIMIT, exact_count)
    }

    /// Sends a personalized message to every watcher of one participant
    fn notify_participant<L: Listener, F: Fn(WatchId) -> Option<L>>(
        &self,
        user: UserId,
        message: &UpdateMessage,
        listener_finder: F,
    ) {
        self.subscriptions.announce_with(
            |_, role| match role {
                Role::Participant(id) if id == user => Some(message.clone().into()),
                _ => None,
            },
            listener_finder,
        );
    }

    /// Pushes a fresh ranking snapshot to the public scoreboard surfaces
    fn refresh_board<L: Listener, F: Fn(WatchId) -> Option<L>>(&self, listener_finder: F) {
        self.subscriptions.announce_specific(
            RoleKind::Board,
            &scoreboard::UpdateMessage::Ranking(scoreboard::display_snapshot(&self.participants))
                .into(),
            listener_finder,
        );
    }
}

// Authoring
impl QuizSession {
    /// Adds a question to the bank
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotOwner`] for non-admin actors,
    /// [`Error::WrongPhase`] once the quiz has finished, and
    /// [`Error::Validation`] for invalid content.
    pub fn add_question(&mut self, actor: UserId, question: Question) -> Result<QuestionId, Error> {
        self.authorize(actor)?;
        if self.phase == Phase::Finished {
            return Err(Error::WrongPhase(self.phase));
        }
        self.questions.add(question)
    }

    /// Replaces the content of a question that has not yet aired
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the question has already aired:
    /// grading consults the definition after collection ends, so an aired
    /// question's content is frozen.
    pub fn edit_question(
        &mut self,
        actor: UserId,
        id: QuestionId,
        edited: Question,
    ) -> Result<(), Error> {
        self.authorize(actor)?;
        if self.aired.contains(&id) {
            return Err(Error::Validation(
                "question has already aired and can no longer be edited".to_owned(),
            ));
        }
        self.questions.edit(id, edited)
    }

    /// Removes a question that has not yet aired
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the question has already aired.
    pub fn remove_question(&mut self, actor: UserId, id: QuestionId) -> Result<(), Error> {
        self.authorize(actor)?;
        if self.aired.contains(&id) {
            return Err(Error::Validation(
                "question has already aired and can no longer be removed".to_owned(),
            ));
        }
        self.questions.remove(id).map(|_| ())
    }
}

// Participants
impl QuizSession {
    /// Joins a participant to the quiz
    ///
    /// Permitted in every phase; someone joining mid-quiz can answer from
    /// the next question on. Rejoining with the same user id is idempotent
    /// and never resets the score.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an invalid name or a full quiz.
    pub fn join<L: Listener, F: Fn(WatchId) -> Option<L>>(
        &mut self,
        user: UserId,
        name: &str,
        listener_finder: F,
    ) -> Result<(), Error> {
        self.participants.join(user, name)?;

        if self.phase == Phase::Lobby {
            self.subscriptions.announce_specific(
                RoleKind::Admin,
                &UpdateMessage::Roster(self.roster()).into(),
                &listener_finder,
            );
        }
        self.refresh_board(&listener_finder);

        Ok(())
    }

    /// Removes a participant from the quiz
    ///
    /// Their answer records stay in the ledger as orphaned data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotOwner`] for non-admin actors and
    /// [`Error::ParticipantNotFound`] for unknown users.
    pub fn remove_participant<L: Listener, F: Fn(WatchId) -> Option<L>>(
        &mut self,
        actor: UserId,
        user: UserId,
        listener_finder: F,
    ) -> Result<(), Error> {
        self.authorize(actor)?;
        self.participants.remove(user)?;

        self.subscriptions.announce_specific(
            RoleKind::Admin,
            &UpdateMessage::Roster(self.roster()).into(),
            &listener_finder,
        );
        self.refresh_board(&listener_finder);

        Ok(())
    }
}

// Lifecycle transitions
impl QuizSession {
    /// Starts the quiz, leaving the lobby
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotOwner`] for non-admin actors and
    /// [`Error::WrongPhase`] outside the lobby.
    pub fn start<L: Listener, F: Fn(WatchId) -> Option<L>>(
        &mut self,
        actor: UserId,
        listener_finder: F,
    ) -> Result<(), Error> {
        self.authorize(actor)?;
        self.expect_phase(Phase::Lobby)?;

        self.phase = Phase::Running;
        log::info!("quiz {} started", self.code);

        self.subscriptions
            .announce(&UpdateMessage::QuizStarted.into(), listener_finder);
        Ok(())
    }

    /// Airs a question, making it live for answering
    ///
    /// # Errors
    ///
    /// Returns [`Error::QuestionNotFound`] for ids not in the bank and
    /// [`Error::Validation`] for questions that have already aired; a
    /// question airs at most once, ever.
    pub fn air_question<L: Listener, F: Fn(WatchId) -> Option<L>>(
        &mut self,
        actor: UserId,
        question: QuestionId,
        now: SystemTime,
        listener_finder: F,
    ) -> Result<(), Error> {
        self.authorize(actor)?;
        self.expect_phase(Phase::Running)?;

        if self.aired.contains(&question) {
            return Err(Error::Validation("question has already aired".to_owned()));
        }
        let (view, timed) = {
            let q = self.questions.get(question).ok_or(Error::QuestionNotFound)?;
            (QuestionView::from(q), q.timer.is_some())
        };
        let ordinal = self
            .questions
            .iter()
            .position(|q| q.id() == question)
            .unwrap_or(0)
            + 1;

        self.current_question = Some(question);
        self.aired.insert(question);
        self.air_time = timed.then_some(now);
        self.phase = Phase::QuestionLive;
        log::info!("quiz {}: aired question {question}", self.code);

        self.subscriptions.announce(
            &UpdateMessage::QuestionAired {
                ordinal,
                total: self.questions.len(),
                question: view,
            }
            .into(),
            listener_finder,
        );
        Ok(())
    }

    /// Ends answer collection for the live question
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotOwner`] for non-admin actors and
    /// [`Error::WrongPhase`] when no question is live.
    pub fn end_question<L: Listener, F: Fn(WatchId) -> Option<L>>(
        &mut self,
        actor: UserId,
        listener_finder: F,
    ) -> Result<(), Error> {
        self.authorize(actor)?;
        self.expect_phase(Phase::QuestionLive)?;
        self.finish_question(listener_finder);
        Ok(())
    }

    /// Ends answer collection because the question's timer elapsed
    ///
    /// The deadline is a client-observed convention: any subscriber that
    /// sees it pass may report it, no admin identity required. The report
    /// is checked against the actual deadline so an early call cannot cut
    /// a question short.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongPhase`] when no question is live and
    /// [`Error::Validation`] when the question is untimed or the deadline
    /// has not actually passed.
    pub fn close_on_timeout<L: Listener, F: Fn(WatchId) -> Option<L>>(
        &mut self,
        now: SystemTime,
        listener_finder: F,
    ) -> Result<(), Error> {
        self.expect_phase(Phase::QuestionLive)?;

        let deadline = self.deadline().ok_or_else(|| {
            Error::Validation("the live question has no timer".to_owned())
        })?;
        if now < deadline {
            return Err(Error::Validation("the timer has not elapsed".to_owned()));
        }

        self.finish_question(listener_finder);
        Ok(())
    }

    /// Shared tail of the two question-ending paths
    fn finish_question<L: Listener, F: Fn(WatchId) -> Option<L>>(&mut self, listener_finder: F) {
        self.phase = Phase::QuestionEnded;
        self.air_time = None;
        log::info!("quiz {}: question ended", self.code);

        let reveal = self
            .current_question()
            .and_then(|q| q.reveal_text().map(str::to_owned));
        self.subscriptions.announce(
            &UpdateMessage::QuestionEnded { reveal }.into(),
            listener_finder,
        );
    }

    /// Displays the ranked scorecard once grading is complete
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] while any submitted answer for the
    /// current question still awaits a grading decision.
    pub fn show_scorecard<L: Listener, F: Fn(WatchId) -> Option<L>>(
        &mut self,
        actor: UserId,
        listener_finder: F,
    ) -> Result<(), Error> {
        self.authorize(actor)?;
        self.expect_phase(Phase::QuestionEnded)?;

        if let Some(question) = self.current_question {
            let pending = self.ledger.pending_count(question);
            if pending > 0 {
                return Err(Error::Validation(format!(
                    "{pending} answers still await verification"
                )));
            }
        }

        self.phase = Phase::ScorecardDisplay;

        let ranking = scoreboard::display_snapshot(&self.participants);
        self.subscriptions.announce_with(
            |_, role| {
                Some(match role {
                    Role::Admin | Role::Board => UpdateMessage::Scorecard(ranking.clone()).into(),
                    Role::Participant(user) => UpdateMessage::Score {
                        standing: scoreboard::standing(&self.participants, user),
                    }
                    .into(),
                })
            },
            listener_finder,
        );
        Ok(())
    }

    /// Dismisses the scorecard and returns to browsing the bank
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotOwner`] for non-admin actors and
    /// [`Error::WrongPhase`] outside the scorecard display.
    pub fn next_question<L: Listener, F: Fn(WatchId) -> Option<L>>(
        &mut self,
        actor: UserId,
        listener_finder: F,
    ) -> Result<(), Error> {
        self.authorize(actor)?;
        self.expect_phase(Phase::ScorecardDisplay)?;

        self.current_question = None;
        self.air_time = None;
        self.phase = Phase::Running;

        self.subscriptions
            .announce(&UpdateMessage::QuestionCleared.into(), listener_finder);
        Ok(())
    }

    /// Concludes the quiz
    ///
    /// Permitted from the lobby (the quiz never ran) and from between
    /// questions. Participants receive their final standing; the public
    /// scoreboard gets the podium view.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotOwner`] for non-admin actors and
    /// [`Error::WrongPhase`] from any other phase.
    pub fn end_quiz<L: Listener, F: Fn(WatchId) -> Option<L>>(
        &mut self,
        actor: UserId,
        listener_finder: F,
    ) -> Result<(), Error> {
        self.authorize(actor)?;
        if !matches!(self.phase, Phase::Running | Phase::Lobby) {
            return Err(Error::WrongPhase(self.phase));
        }

        self.phase = Phase::Finished;
        log::info!("quiz {} finished", self.code);

        let finals = scoreboard::final_ranks(&self.participants);
        self.subscriptions.announce_with(
            |_, role| {
                Some(match role {
                    Role::Admin => UpdateMessage::QuizFinished { standing: None }.into(),
                    Role::Participant(user) => UpdateMessage::QuizFinished {
                        standing: scoreboard::standing(&self.participants, user),
                    }
                    .into(),
                    Role::Board => {
                        scoreboard::UpdateMessage::FinalRanks(finals.clone()).into()
                    }
                })
            },
            listener_finder,
        );
        Ok(())
    }

    /// Tears the quiz down before it is dropped
    ///
    /// Notifies every subscriber, then cancels all watches so nothing
    /// keeps listening on a quiz that no longer exists. The caller (the
    /// directory) drops the session afterwards, which cascades to the
    /// participant and answer records it owns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotOwner`] for non-admin actors. Deletion is
    /// permitted from any phase.
    pub fn delete<L: Listener, F: Fn(WatchId) -> Option<L>>(
        &mut self,
        actor: UserId,
        listener_finder: F,
    ) -> Result<(), Error> {
        self.authorize(actor)?;
        log::info!("quiz {} deleted", self.code);

        self.subscriptions
            .announce(&UpdateMessage::QuizDeleted.into(), &listener_finder);
        self.subscriptions.detach_all(&listener_finder);
        Ok(())
    }
}

// Answering and grading
impl QuizSession {
    /// Submits a participant's answer to the live question
    ///
    /// Multiple choice answers are graded on the spot: the record is
    /// stored verified and the score delta lands in the same operation.
    /// Descriptive answers are stored pending manual grading. A second
    /// submission for the same question is an idempotent no-op
    /// ([`Submission::Duplicate`]): the first record is never
    /// overwritten and no delta is applied twice.
    ///
    /// The submission names the question it answers. A submission for
    /// anything other than the currently live question is rejected, so a
    /// device that has not yet observed a question transition can never
    /// land its answer on the wrong question.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongPhase`] when no question is live,
    /// [`Error::QuestionNotFound`] for ids not in the bank,
    /// [`Error::Validation`] for stale question references and responses
    /// that do not fit the question, and [`Error::ParticipantNotFound`]
    /// for users who never joined.
    pub fn submit_answer<L: Listener, F: Fn(WatchId) -> Option<L>>(
        &mut self,
        user: UserId,
        question_id: QuestionId,
        response: Response,
        now: SystemTime,
        listener_finder: F,
    ) -> Result<Submission, Error> {
        self.expect_phase(Phase::QuestionLive)?;
        if !self.participants.contains(user) {
            return Err(Error::ParticipantNotFound);
        }

        let question = self
            .questions
            .get(question_id)
            .ok_or(Error::QuestionNotFound)?;
        if self.current_question != Some(question_id) {
            return Err(Error::Validation(
                "question is not currently live".to_owned(),
            ));
        }

        let answer = match (&question.kind, response) {
            (QuestionKind::MultipleChoice { options, correct }, Response::Choice(chosen)) => {
                let label = options.get(chosen).ok_or_else(|| {
                    Error::Validation(format!("option index {chosen} is out of range"))
                })?;
                let is_correct = chosen == *correct;
                Answer::graded(label.clone(), is_correct, scoring::auto(question, is_correct), now)
            }
            (QuestionKind::Descriptive { .. }, Response::Text(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(Error::Validation("answer cannot be empty".to_owned()));
                }
                if text.len() > constants::answer::MAX_TEXT_LENGTH {
                    return Err(Error::Validation("answer is too long".to_owned()));
                }
                Answer::pending(text, now)
            }
            (QuestionKind::MultipleChoice { .. }, Response::Text(_)) => {
                return Err(Error::Validation(
                    "this question expects an option choice".to_owned(),
                ));
            }
            (QuestionKind::Descriptive { .. }, Response::Choice(_)) => {
                return Err(Error::Validation(
                    "this question expects a text answer".to_owned(),
                ));
            }
        };

        let submission = self.ledger.submit(question_id, user, answer);

        if let Submission::Recorded {
            correct: Some(correct),
            awarded_points: Some(delta),
        } = submission
        {
            // Auto-graded: the delta belongs to the same operation as the
            // answer write. The participant was checked above, so this
            // cannot fail and leave the pair half-applied.
            self.participants.apply_score_delta(user, delta)?;
            log::debug!("quiz {}: auto-graded answer from {user}", self.code);

            self.notify_participant(
                user,
                &UpdateMessage::Verdict {
                    correct,
                    awarded_points: delta,
                    standing: scoreboard::standing(&self.participants, user),
                },
                &listener_finder,
            );
            self.refresh_board(&listener_finder);
        }

        if matches!(submission, Submission::Recorded { .. }) {
            self.subscriptions.announce_specific(
                RoleKind::Admin,
                &UpdateMessage::AnswerTally(self.ledger.count(question_id)).into(),
                &listener_finder,
            );
        }

        Ok(submission)
    }

    /// Records the sentinel answer when a participant navigates away
    ///
    /// Best-effort anti-cheat: clients report a visibility change while a
    /// question is live and no answer has been submitted yet. Multiple
    /// choice questions are graded incorrect on the spot; descriptive ones
    /// are left for the admin to judge. This is a UX nudge, not a security
    /// control; the signal is client-reported and trivially suppressed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongPhase`] when no question is live,
    /// [`Error::Validation`] when the named question is not the live one,
    /// and [`Error::ParticipantNotFound`] for users who never joined.
    pub fn abandon<L: Listener, F: Fn(WatchId) -> Option<L>>(
        &mut self,
        user: UserId,
        question_id: QuestionId,
        now: SystemTime,
        listener_finder: F,
    ) -> Result<Submission, Error> {
        self.expect_phase(Phase::QuestionLive)?;
        if !self.participants.contains(user) {
            return Err(Error::ParticipantNotFound);
        }

        let question = self
            .questions
            .get(question_id)
            .ok_or(Error::QuestionNotFound)?;
        if self.current_question != Some(question_id) {
            return Err(Error::Validation(
                "question is not currently live".to_owned(),
            ));
        }

        let answer = if question.is_auto_graded() {
            Answer::graded(
                constants::answer::ABANDONED_RESPONSE,
                false,
                scoring::auto(question, false),
                now,
            )
        } else {
            Answer::pending(constants::answer::ABANDONED_RESPONSE, now)
        };

        let submission = self.ledger.submit(question_id, user, answer);

        if let Submission::Recorded {
            awarded_points: Some(delta),
            ..
        } = submission
        {
            self.participants.apply_score_delta(user, delta)?;
            self.refresh_board(&listener_finder);
        }

        if matches!(submission, Submission::Recorded { .. }) {
            log::debug!("quiz {}: {user} abandoned the live question", self.code);
            self.subscriptions.announce_specific(
                RoleKind::Admin,
                &UpdateMessage::AnswerTally(self.ledger.count(question_id)).into(),
                &listener_finder,
            );
        }

        Ok(submission)
    }

    /// Records a manual grading decision on a pending answer
    ///
    /// Valid only while grading is open for the current question. The
    /// award defaults to the question's nominal ±points; `override_points`
    /// lets the admin grant partial credit or any other signed amount,
    /// which is applied verbatim. The decision and its delta land
    /// together; a verified record can never be graded again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotOwner`] for non-admin actors,
    /// [`Error::WrongPhase`] outside grading, [`Error::Validation`] when
    /// the named question is not the one under grading,
    /// [`Error::AnswerNotFound`] when the participant never submitted,
    /// [`Error::AlreadyVerified`] for repeated decisions, and
    /// [`Error::ParticipantNotFound`] when the participant has since been
    /// removed.
    pub fn grade_answer<L: Listener, F: Fn(WatchId) -> Option<L>>(
        &mut self,
        actor: UserId,
        user: UserId,
        question_id: QuestionId,
        correct: bool,
        override_points: Option<i64>,
        listener_finder: F,
    ) -> Result<i64, Error> {
        self.authorize(actor)?;
        self.expect_phase(Phase::QuestionEnded)?;

        let question = self
            .questions
            .get(question_id)
            .ok_or(Error::QuestionNotFound)?;
        if self.current_question != Some(question_id) {
            return Err(Error::Validation(
                "question is not the one under grading".to_owned(),
            ));
        }

        // Checked before the ledger write so a missing participant cannot
        // leave a verified answer whose delta was never applied.
        if !self.participants.contains(user) {
            return Err(Error::ParticipantNotFound);
        }

        let delta = scoring::manual(question, correct, override_points);
        self.ledger.grade(question_id, user, correct, delta)?;
        self.participants.apply_score_delta(user, delta)?;
        log::debug!("quiz {}: graded answer from {user} ({delta:+})", self.code);

        self.notify_participant(
            user,
            &UpdateMessage::Verdict {
                correct,
                awarded_points: delta,
                standing: scoreboard::standing(&self.participants, user),
            },
            &listener_finder,
        );
        self.refresh_board(&listener_finder);

        Ok(delta)
    }
}

// Synchronization
impl QuizSession {
    /// Returns the message that synchronizes one subscriber with the
    /// current state
    ///
    /// The message is personalized by role: participants see their own
    /// standing where admins and boards see the full ranking, and every
    /// role sees the redacted question while one is live.
    pub fn state_message(&self, role: Role, now: SystemTime) -> crate::SyncMessage {
        match self.phase {
            Phase::Lobby => SyncMessage::Lobby {
                title: self.title.clone(),
                roster: self.roster(),
            }
            .into(),
            Phase::Running => SyncMessage::Browsing {
                aired: self.aired.len(),
                total: self.questions.len(),
            }
            .into(),
            Phase::QuestionLive => match self.current_with_ordinal() {
                Some((question, ordinal)) => SyncMessage::QuestionLive {
                    ordinal,
                    total: self.questions.len(),
                    question: QuestionView::from(question),
                    remaining: self
                        .deadline()
                        .and_then(|deadline| deadline.duration_since(now).ok()),
                    answered: self.ledger.count(question.id()),
                }
                .into(),
                None => SyncMessage::Browsing {
                    aired: self.aired.len(),
                    total: self.questions.len(),
                }
                .into(),
            },
            Phase::QuestionEnded => match self.current_with_ordinal() {
                Some((question, ordinal)) => SyncMessage::QuestionEnded {
                    ordinal,
                    total: self.questions.len(),
                    question: QuestionView::from(question),
                    reveal: question.reveal_text().map(str::to_owned),
                    pending: self.ledger.pending_count(question.id()),
                }
                .into(),
                None => SyncMessage::Browsing {
                    aired: self.aired.len(),
                    total: self.questions.len(),
                }
                .into(),
            },
            Phase::ScorecardDisplay => match role {
                Role::Participant(user) => SyncMessage::Standing {
                    standing: scoreboard::standing(&self.participants, user),
                }
                .into(),
                Role::Admin | Role::Board => scoreboard::SyncMessage::Ranking(
                    scoreboard::display_snapshot(&self.participants),
                )
                .into(),
            },
            Phase::Finished => match role {
                Role::Participant(user) => SyncMessage::Finished {
                    standing: scoreboard::standing(&self.participants, user),
                }
                .into(),
                Role::Admin | Role::Board => scoreboard::SyncMessage::FinalRanks(
                    scoreboard::final_ranks(&self.participants),
                )
                .into(),
            },
        }
    }

    /// Sends a freshly subscribed surface the current state
    pub fn sync_subscriber<L: Listener, F: Fn(WatchId) -> Option<L>>(
        &self,
        watch: WatchId,
        now: SystemTime,
        listener_finder: F,
    ) {
        let Some(role) = self.subscriptions.role(watch) else {
            return;
        };

        self.subscriptions
            .send_state(&self.state_message(role, now), watch, listener_finder);
    }
}
