//! Identity provider interface
//!
//! This module defines the seam between the quiz core and the external
//! authentication service. The core only ever sees an [`Identity`]: a
//! stable opaque id plus whether the session is anonymous. Anonymous
//! identities belong to participants; admins sign in with a credential and
//! get a non-anonymous identity that gates quiz creation and every
//! admin-only operation.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use uuid::Uuid;

use crate::Error;

/// A stable opaque identifier for a signed-in user
///
/// The identity collaborator assigns this once per user; the core uses it
/// as the participant key and the recorded admin of a quiz.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random user ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    /// Creates a new random user ID (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for UserId {
    /// Formats the ID as a UUID string
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for UserId {
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

/// A signed-in user as reported by the identity collaborator
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// The stable opaque id for this user
    pub id: UserId,
    /// Whether this session signed in anonymously
    ///
    /// Anonymous sessions are participants; credentialed sessions are
    /// admins.
    pub is_anonymous: bool,
}

impl Identity {
    /// Creates an anonymous participant identity with a fresh id
    pub fn anonymous() -> Self {
        Self {
            id: UserId::new(),
            is_anonymous: true,
        }
    }
}

/// Interface to the external authentication service
///
/// Implementations wrap whatever hosted auth product the deployment uses.
/// The core never calls these methods itself; the embedding host signs the
/// user in and hands the resulting [`Identity`] to directory and session
/// operations.
pub trait IdentityProvider {
    /// Signs in anonymously, creating a participant identity
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transient`] when the auth service is unreachable.
    fn sign_in_anonymous(&mut self) -> Result<Identity, Error>;

    /// Signs in with a credential, creating an admin identity
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a rejected credential and
    /// [`Error::Transient`] when the auth service is unreachable.
    fn sign_in_with_credential(&mut self, id: &str, secret: &str) -> Result<Identity, Error>;

    /// Signs the current user out
    fn sign_out(&mut self);

    /// Returns the currently signed-in identity, if any
    fn current_identity(&self) -> Option<Identity>;
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Minimal provider backed by a fixed credential table
    struct TableProvider {
        credentials: HashMap<String, (String, UserId)>,
        current: Option<Identity>,
    }

    impl IdentityProvider for TableProvider {
        fn sign_in_anonymous(&mut self) -> Result<Identity, Error> {
            let identity = Identity::anonymous();
            self.current = Some(identity);
            Ok(identity)
        }

        fn sign_in_with_credential(&mut self, id: &str, secret: &str) -> Result<Identity, Error> {
            match self.credentials.get(id) {
                Some((expected, user_id)) if expected == secret => {
                    let identity = Identity {
                        id: *user_id,
                        is_anonymous: false,
                    };
                    self.current = Some(identity);
                    Ok(identity)
                }
                _ => Err(Error::Validation("unknown credential".to_owned())),
            }
        }

        fn sign_out(&mut self) {
            self.current = None;
        }

        fn current_identity(&self) -> Option<Identity> {
            self.current
        }
    }

    fn provider() -> TableProvider {
        TableProvider {
            credentials: HashMap::from([(
                "master@example.com".to_owned(),
                ("hunter2".to_owned(), UserId::new()),
            )]),
            current: None,
        }
    }

    #[test]
    fn test_anonymous_sign_in_is_anonymous() {
        let mut provider = provider();
        let identity = provider.sign_in_anonymous().unwrap();

        assert!(identity.is_anonymous);
        assert_eq!(provider.current_identity(), Some(identity));
    }

    #[test]
    fn test_credential_sign_in_is_not_anonymous() {
        let mut provider = provider();
        let identity = provider
            .sign_in_with_credential("master@example.com", "hunter2")
            .unwrap();

        assert!(!identity.is_anonymous);
    }

    #[test]
    fn test_bad_credential_rejected() {
        let mut provider = provider();
        let result = provider.sign_in_with_credential("master@example.com", "wrong");

        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(provider.current_identity(), None);
    }

    #[test]
    fn test_sign_out_clears_identity() {
        let mut provider = provider();
        provider.sign_in_anonymous().unwrap();
        provider.sign_out();

        assert_eq!(provider.current_identity(), None);
    }

    #[test]
    fn test_user_id_display_roundtrip() {
        let id = UserId::new();
        let parsed: UserId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}
