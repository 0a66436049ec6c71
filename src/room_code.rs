//! Room code generation and parsing
//!
//! This module provides the short public identifier participants type in to
//! join a quiz. Codes are six uppercase base-36 characters, generated
//! randomly; creation goes through a bounded check-and-retry loop so that a
//! rare collision with an existing quiz is retried rather than silently
//! reusing the code.

use std::{fmt::Display, str::FromStr};

use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;

use crate::constants::quiz::{ROOM_CODE_ATTEMPTS, ROOM_CODE_LENGTH};

/// Characters a room code draws from, in value order
const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// A short public identifier for a quiz instance
///
/// Room codes are six uppercase base-36 characters, chosen to be easy to
/// read out loud and type on a phone. Parsing folds lowercase input to
/// uppercase, matching how join forms normalize what participants type.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct RoomCode([u8; ROOM_CODE_LENGTH]);

/// Errors that can occur when parsing or generating a room code
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The string is not exactly six characters long
    #[error("room code must be {ROOM_CODE_LENGTH} characters")]
    WrongLength,
    /// The string contains a character outside A-Z and 0-9
    #[error("room code may only contain letters and digits")]
    InvalidCharacter,
    /// No unclaimed code was found within the attempt budget
    #[error("could not generate an unclaimed room code")]
    Exhausted,
}

impl RoomCode {
    /// Creates a new random room code
    ///
    /// Uniqueness is not checked here; use [`RoomCode::generate_unique`]
    /// when creating a quiz so collisions with existing codes are retried.
    pub fn random() -> Self {
        let mut chars = [0_u8; ROOM_CODE_LENGTH];
        for c in &mut chars {
            *c = ALPHABET[fastrand::usize(..ALPHABET.len())];
        }
        Self(chars)
    }

    /// Generates a room code that the given predicate reports as unclaimed
    ///
    /// Draws random codes until `is_taken` returns `false`, giving up after
    /// a fixed number of attempts rather than looping forever on a
    /// pathological occupancy predicate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Exhausted`] if every attempt collided.
    pub fn generate_unique<F: Fn(&RoomCode) -> bool>(is_taken: F) -> Result<Self, Error> {
        for _ in 0..ROOM_CODE_ATTEMPTS {
            let code = Self::random();
            if !is_taken(&code) {
                return Ok(code);
            }
        }
        Err(Error::Exhausted)
    }
}

impl Display for RoomCode {
    /// Formats the room code as its six-character string
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for c in self.0 {
            write!(f, "{}", c as char)?;
        }
        Ok(())
    }
}

impl FromStr for RoomCode {
    type Err = Error;

    /// Parses a room code, folding lowercase input to uppercase
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongLength`] or [`Error::InvalidCharacter`] when
    /// the input does not match the code format.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != ROOM_CODE_LENGTH {
            return Err(Error::WrongLength);
        }
        let mut chars = [0_u8; ROOM_CODE_LENGTH];
        for (slot, c) in chars.iter_mut().zip(s.bytes()) {
            let c = c.to_ascii_uppercase();
            if !c.is_ascii_digit() && !c.is_ascii_uppercase() {
                return Err(Error::InvalidCharacter);
            }
            *slot = c;
        }
        Ok(Self(chars))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_random_format() {
        for _ in 0..100 {
            let code = RoomCode::random().to_string();
            assert_eq!(code.len(), ROOM_CODE_LENGTH);
            assert!(
                code.chars()
                    .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
            );
        }
    }

    #[test]
    fn test_from_str_roundtrip() {
        let code = RoomCode::from_str("AB12CD").unwrap();
        assert_eq!(code.to_string(), "AB12CD");
    }

    #[test]
    fn test_from_str_folds_lowercase() {
        let code = RoomCode::from_str("ab12cd").unwrap();
        assert_eq!(code.to_string(), "AB12CD");
    }

    #[test]
    fn test_from_str_wrong_length() {
        assert_eq!(RoomCode::from_str("ABC"), Err(Error::WrongLength));
        assert_eq!(RoomCode::from_str("ABCDEFG"), Err(Error::WrongLength));
        assert_eq!(RoomCode::from_str(""), Err(Error::WrongLength));
    }

    #[test]
    fn test_from_str_invalid_character() {
        assert_eq!(RoomCode::from_str("AB-12!"), Err(Error::InvalidCharacter));
        assert_eq!(RoomCode::from_str("AB 12C"), Err(Error::InvalidCharacter));
    }

    #[test]
    fn test_generate_unique_avoids_taken() {
        let taken = RoomCode::from_str("AAAAAA").unwrap();
        let code = RoomCode::generate_unique(|c| *c == taken).unwrap();
        assert_ne!(code, taken);
    }

    #[test]
    fn test_generate_unique_exhausts() {
        assert_eq!(RoomCode::generate_unique(|_| true), Err(Error::Exhausted));
    }

    #[test]
    fn test_serialization() {
        let code = RoomCode::from_str("XY99ZZ").unwrap();
        let serialized = serde_json::to_string(&code).unwrap();
        assert_eq!(serialized, "\"XY99ZZ\"");

        let deserialized: RoomCode = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, code);
    }

    #[test]
    fn test_deserialization_rejects_bad_code() {
        let result: Result<RoomCode, _> = serde_json::from_str("\"!!!!\"");
        assert!(result.is_err());
    }
}
