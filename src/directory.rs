//! Quiz lookup by room code
//!
//! The directory owns every live quiz session and resolves the room codes
//! participants type in. Creation generates a code through the
//! collision-checked retry loop; deletion tears the session down and drops
//! it, cascading to the participant and answer records the session owns.
//! A deleted code resolves to nothing afterwards.

use std::collections::HashMap;

use crate::{
    Error,
    identity::Identity,
    room_code::RoomCode,
    session::QuizSession,
    watch::{Listener, WatchId},
};

/// All live quizzes, keyed by room code
#[derive(Debug, Default)]
pub struct Directory {
    /// Live sessions keyed by their room code
    quizzes: HashMap<RoomCode, QuizSession>,
}

impl Directory {
    /// Creates a quiz with a freshly generated, unclaimed room code
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an invalid title, an anonymous
    /// creator, or when no unclaimed code could be generated.
    pub fn create(&mut self, title: impl Into<String>, admin: &Identity) -> Result<RoomCode, Error> {
        let code = RoomCode::generate_unique(|code| self.quizzes.contains_key(code))
            .map_err(|e| Error::Validation(e.to_string()))?;

        let session = QuizSession::new(code, title, admin)?;
        self.quizzes.insert(code, session);
        Ok(code)
    }

    /// Resolves a room code to its quiz
    ///
    /// # Errors
    ///
    /// Returns [`Error::QuizNotFound`] for unknown or deleted codes.
    pub fn get(&self, code: RoomCode) -> Result<&QuizSession, Error> {
        self.quizzes.get(&code).ok_or(Error::QuizNotFound)
    }

    /// Resolves a room code to its quiz for mutation
    ///
    /// # Errors
    ///
    /// Returns [`Error::QuizNotFound`] for unknown or deleted codes.
    pub fn get_mut(&mut self, code: RoomCode) -> Result<&mut QuizSession, Error> {
        self.quizzes.get_mut(&code).ok_or(Error::QuizNotFound)
    }

    /// Deletes a quiz, cascading to everything it owns
    ///
    /// The session notifies and detaches its subscribers, then is dropped
    /// along with its participant and answer records. The code becomes
    /// unresolvable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QuizNotFound`] for unknown codes and
    /// [`Error::NotOwner`] when the actor is not the quiz's admin.
    pub fn delete<L: Listener, F: Fn(WatchId) -> Option<L>>(
        &mut self,
        code: RoomCode,
        actor: &Identity,
        listener_finder: F,
    ) -> Result<(), Error> {
        let session = self.get_mut(code)?;
        session.delete(actor.id, listener_finder)?;
        self.quizzes.remove(&code);
        Ok(())
    }

    /// Returns the number of live quizzes
    pub fn len(&self) -> usize {
        self.quizzes.len()
    }

    /// Checks whether any quiz is live
    pub fn is_empty(&self) -> bool {
        self.quizzes.is_empty()
    }
}
