//! Subscription registry and live update delivery
//!
//! Every display surface that follows a quiz (the admin console, each
//! participant's device, the public scoreboard) registers here and gets a
//! watch handle back. The caller owns cancellation: dropping interest means
//! calling [`Subscriptions::unsubscribe`], after which no further messages
//! are delivered and the underlying listener is released. Delivery itself
//! goes through the [`Listener`] seam so the embedding host can put
//! whatever transport it likes behind it.

use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
    str::FromStr,
};

use enum_map::{Enum, EnumMap};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{SyncMessage, UpdateMessage, constants, identity::UserId};

/// A handle identifying one live subscription
///
/// Returned by [`Subscriptions::subscribe`]; passing it back to
/// [`Subscriptions::unsubscribe`] is how a surface detaches.
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
pub struct WatchId(Uuid);

impl WatchId {
    /// Creates a new random watch handle
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WatchId {
    /// Creates a new random watch handle (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for WatchId {
    /// Formats the handle as a UUID string
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for WatchId {
    type Err = uuid::Error;

    /// Parses a handle from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// The role a subscriber plays, determining which messages it receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// The admin console driving the quiz
    Admin,
    /// A participant's device, tied to their user id
    Participant(UserId),
    /// A public scoreboard display with no identity of its own
    Board,
}

/// The kind of subscriber without associated data
///
/// Used for filtering and the reverse index, where only the discriminant
/// matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
pub enum RoleKind {
    /// An admin console
    Admin,
    /// A participant device
    Participant,
    /// A public scoreboard display
    Board,
}

impl Role {
    /// Returns the kind of this role without the associated data
    pub fn kind(&self) -> RoleKind {
        match self {
            Role::Admin => RoleKind::Admin,
            Role::Participant(_) => RoleKind::Participant,
            Role::Board => RoleKind::Board,
        }
    }
}

/// Trait for delivering messages to one subscribed surface
///
/// Implementations might push over WebSockets, Server-Sent Events, or an
/// in-process channel. Delivery is fire-and-forget; the core never waits
/// on a listener.
pub trait Listener {
    /// Delivers an update message describing a state change
    fn notify(&self, message: &UpdateMessage);

    /// Delivers a sync message carrying the full current state
    fn sync(&self, state: &SyncMessage);

    /// Releases the listener when its subscription is cancelled
    fn close(self);
}

/// Errors that can occur when managing subscriptions
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The quiz has reached the maximum number of concurrent subscriptions
    #[error("maximum number of subscriptions reached")]
    MaximumSubscriptions,
}

/// Tracks every live subscription on one quiz
///
/// Holds the role of each handle plus a role-keyed reverse index so
/// broadcasts to one audience (all participants, just the admin consoles)
/// do not scan everyone. Listeners themselves live with the host; lookups
/// go through a finder closure, so a surface whose transport has gone away
/// is silently skipped.
#[derive(Debug, Default)]
pub struct Subscriptions {
    /// Primary mapping from watch handle to subscriber role
    mapping: HashMap<WatchId, Role>,
    /// Reverse index by role kind for targeted broadcast
    reverse_mapping: EnumMap<RoleKind, HashSet<WatchId>>,
}

impl Subscriptions {
    /// Registers a new subscription and returns its handle
    ///
    /// # Errors
    ///
    /// Returns [`Error::MaximumSubscriptions`] when the quiz already has
    /// the maximum number of live watches.
    pub fn subscribe(&mut self, role: Role) -> Result<WatchId, Error> {
        if self.mapping.len() >= constants::watch::MAX_SUBSCRIPTION_COUNT {
            return Err(Error::MaximumSubscriptions);
        }

        let id = WatchId::new();
        self.reverse_mapping[role.kind()].insert(id);
        self.mapping.insert(id, role);
        Ok(id)
    }

    /// Cancels a subscription and releases its listener
    ///
    /// After this call the handle is unknown and no further messages reach
    /// the surface. Unknown handles are ignored.
    pub fn unsubscribe<L: Listener, F: Fn(WatchId) -> Option<L>>(
        &mut self,
        id: WatchId,
        listener_finder: F,
    ) {
        if let Some(role) = self.mapping.remove(&id) {
            self.reverse_mapping[role.kind()].remove(&id);
            if let Some(listener) = listener_finder(id) {
                listener.close();
            }
        }
    }

    /// Cancels every subscription, releasing all listeners
    ///
    /// Used when a quiz is deleted so that no surface keeps a dangling
    /// watch on a quiz that no longer exists.
    pub fn detach_all<L: Listener, F: Fn(WatchId) -> Option<L>>(&mut self, listener_finder: F) {
        for id in self.mapping.keys().copied().collect_vec() {
            self.unsubscribe(id, &listener_finder);
        }
    }

    /// Returns the role attached to a watch handle
    pub fn role(&self, id: WatchId) -> Option<Role> {
        self.mapping.get(&id).copied()
    }

    /// Returns the number of live subscriptions of one kind
    pub fn count(&self, kind: RoleKind) -> usize {
        self.reverse_mapping[kind].len()
    }

    /// Gets all live subscriptions with their listeners and roles
    pub fn vec<L: Listener, F: Fn(WatchId) -> Option<L>>(
        &self,
        listener_finder: F,
    ) -> Vec<(WatchId, L, Role)> {
        self.reverse_mapping
            .values()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| match (listener_finder(*id), self.mapping.get(id)) {
                (Some(listener), Some(role)) => Some((*id, listener, *role)),
                _ => None,
            })
            .collect_vec()
    }

    /// Gets the live subscriptions of one kind with their listeners
    pub fn specific_vec<L: Listener, F: Fn(WatchId) -> Option<L>>(
        &self,
        filter: RoleKind,
        listener_finder: F,
    ) -> Vec<(WatchId, L, Role)> {
        self.reverse_mapping[filter]
            .iter()
            .filter_map(|id| match (listener_finder(*id), self.mapping.get(id)) {
                (Some(listener), Some(role)) => Some((*id, listener, *role)),
                _ => None,
            })
            .collect_vec()
    }

    /// Sends an update message to one subscriber
    pub fn send_message<L: Listener, F: Fn(WatchId) -> Option<L>>(
        &self,
        message: &UpdateMessage,
        id: WatchId,
        listener_finder: F,
    ) {
        let Some(listener) = listener_finder(id) else {
            return;
        };

        listener.notify(message);
    }

    /// Sends a sync message to one subscriber
    pub fn send_state<L: Listener, F: Fn(WatchId) -> Option<L>>(
        &self,
        state: &SyncMessage,
        id: WatchId,
        listener_finder: F,
    ) {
        let Some(listener) = listener_finder(id) else {
            return;
        };

        listener.sync(state);
    }

    /// Sends personalized messages to all subscribers using a sender function
    ///
    /// The sender is called per subscription and may return a different
    /// message per role, or `None` to skip that surface entirely.
    pub fn announce_with<S, L: Listener, F: Fn(WatchId) -> Option<L>>(
        &self,
        sender: S,
        listener_finder: F,
    ) where
        S: Fn(WatchId, Role) -> Option<UpdateMessage>,
    {
        for (id, listener, role) in self.vec(listener_finder) {
            let Some(message) = sender(id, role) else {
                continue;
            };

            listener.notify(&message);
        }
    }

    /// Broadcasts an update message to every subscriber
    pub fn announce<L: Listener, F: Fn(WatchId) -> Option<L>>(
        &self,
        message: &UpdateMessage,
        listener_finder: F,
    ) {
        self.announce_with(|_, _| Some(message.to_owned()), listener_finder);
    }

    /// Broadcasts an update message to all subscribers of one kind
    pub fn announce_specific<L: Listener, F: Fn(WatchId) -> Option<L>>(
        &self,
        filter: RoleKind,
        message: &UpdateMessage,
        listener_finder: F,
    ) {
        for (_, listener, _) in self.specific_vec(filter, listener_finder) {
            listener.notify(message);
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
pub(crate) mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    /// Listener that appends every delivered message to a shared log
    #[derive(Clone)]
    pub(crate) struct RecordingListener {
        pub(crate) updates: Rc<RefCell<Vec<String>>>,
        pub(crate) syncs: Rc<RefCell<Vec<String>>>,
    }

    impl RecordingListener {
        pub(crate) fn new() -> Self {
            Self {
                updates: Rc::new(RefCell::new(Vec::new())),
                syncs: Rc::new(RefCell::new(Vec::new())),
            }
        }
    }

    impl Listener for RecordingListener {
        fn notify(&self, message: &UpdateMessage) {
            self.updates.borrow_mut().push(message.to_message());
        }

        fn sync(&self, state: &SyncMessage) {
            self.syncs.borrow_mut().push(state.to_message());
        }

        fn close(self) {}
    }

    fn sample_message() -> UpdateMessage {
        UpdateMessage::Session(crate::session::UpdateMessage::QuizStarted)
    }

    #[test]
    fn test_subscribe_and_role() {
        let mut subscriptions = Subscriptions::default();
        let user = UserId::new();

        let admin = subscriptions.subscribe(Role::Admin).unwrap();
        let participant = subscriptions.subscribe(Role::Participant(user)).unwrap();

        assert_eq!(subscriptions.role(admin), Some(Role::Admin));
        assert_eq!(
            subscriptions.role(participant),
            Some(Role::Participant(user))
        );
        assert_eq!(subscriptions.count(RoleKind::Admin), 1);
        assert_eq!(subscriptions.count(RoleKind::Participant), 1);
        assert_eq!(subscriptions.count(RoleKind::Board), 0);
    }

    #[test]
    fn test_unsubscribed_surface_receives_nothing() {
        let mut subscriptions = Subscriptions::default();
        let listener = RecordingListener::new();

        let id = subscriptions.subscribe(Role::Board).unwrap();
        subscriptions.unsubscribe(id, |_| Some(listener.clone()));

        subscriptions.announce(&sample_message(), |_| Some(listener.clone()));

        assert!(listener.updates.borrow().is_empty());
        assert_eq!(subscriptions.role(id), None);
    }

    #[test]
    fn test_announce_reaches_all_live_listeners() {
        let mut subscriptions = Subscriptions::default();
        let listener = RecordingListener::new();

        subscriptions.subscribe(Role::Admin).unwrap();
        subscriptions.subscribe(Role::Board).unwrap();

        subscriptions.announce(&sample_message(), |_| Some(listener.clone()));

        assert_eq!(listener.updates.borrow().len(), 2);
    }

    #[test]
    fn test_announce_specific_filters_by_kind() {
        let mut subscriptions = Subscriptions::default();
        let admin_listener = RecordingListener::new();
        let board_listener = RecordingListener::new();

        let admin = subscriptions.subscribe(Role::Admin).unwrap();
        subscriptions.subscribe(Role::Board).unwrap();

        subscriptions.announce_specific(RoleKind::Admin, &sample_message(), |id| {
            if id == admin {
                Some(admin_listener.clone())
            } else {
                Some(board_listener.clone())
            }
        });

        assert_eq!(admin_listener.updates.borrow().len(), 1);
        assert!(board_listener.updates.borrow().is_empty());
    }

    #[test]
    fn test_announce_with_role_dispatch() {
        let mut subscriptions = Subscriptions::default();
        let listener = RecordingListener::new();

        subscriptions.subscribe(Role::Admin).unwrap();
        subscriptions.subscribe(Role::Board).unwrap();

        subscriptions.announce_with(
            |_, role| match role {
                Role::Admin => Some(sample_message()),
                _ => None,
            },
            |_| Some(listener.clone()),
        );

        assert_eq!(listener.updates.borrow().len(), 1);
    }

    #[test]
    fn test_detach_all() {
        let mut subscriptions = Subscriptions::default();
        let listener = RecordingListener::new();

        subscriptions.subscribe(Role::Admin).unwrap();
        subscriptions.subscribe(Role::Participant(UserId::new())).unwrap();
        subscriptions.subscribe(Role::Board).unwrap();

        subscriptions.detach_all(|_| Some(listener.clone()));

        assert_eq!(subscriptions.count(RoleKind::Admin), 0);
        assert_eq!(subscriptions.count(RoleKind::Participant), 0);
        assert_eq!(subscriptions.count(RoleKind::Board), 0);

        subscriptions.announce(&sample_message(), |_| Some(listener.clone()));
        assert!(listener.updates.borrow().is_empty());
    }

    #[test]
    fn test_dead_transport_skipped() {
        let mut subscriptions = Subscriptions::default();
        let listener = RecordingListener::new();

        let live = subscriptions.subscribe(Role::Board).unwrap();
        subscriptions.subscribe(Role::Board).unwrap();

        subscriptions.announce(&sample_message(), |id| {
            (id == live).then(|| listener.clone())
        });

        assert_eq!(listener.updates.borrow().len(), 1);
    }
}
