//! Shared data model: identifiers, messages, and room events.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Opaque room identifier.
///
/// Any non-empty string names a room; the routing layer rejects empty ids.
/// Two commands carrying equal ids address the same room actor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId(String);

impl RoomId {
    /// Wrap a raw id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identity a credential resolves to.
///
/// Member ids are assigned by the auth policy, never taken from the client;
/// equal ids are the same principal everywhere in the system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberId(String);

impl MemberId {
    /// Wrap a raw id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemberId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for MemberId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Bearer credential presented with every command.
///
/// Holds secret material: no serde, and `Debug` redacts the token so it
/// cannot reach logs or serialized surfaces.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// A chat message accepted by a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Resolved identity of the sender.
    pub sender: MemberId,

    /// Room the message was posted to.
    pub room: RoomId,

    /// Opaque message body.
    pub body: Bytes,

    /// Per-room sequence number.
    ///
    /// Assigned by the room actor: starts at 1, strictly increasing, no
    /// gaps, never reused.
    pub seq: u64,

    /// Wall-clock seconds when the room accepted the message.
    pub sent_at_secs: u64,
}

/// Events a room delivers to member outboxes.
///
/// Delivery is best-effort: a full or closed outbox drops the event for that
/// member without affecting room state or other members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomEvent {
    /// An accepted chat message, fanned out to every member in seq order.
    Message(Message),

    /// A member entered the room. Sent to the members present before the
    /// join, not to the joiner.
    MemberJoined {
        /// Room the membership change happened in.
        room: RoomId,
        /// Member that joined.
        member: MemberId,
    },

    /// A member left the room. Sent to the members that remain.
    MemberLeft {
        /// Room the membership change happened in.
        room: RoomId,
        /// Member that left.
        member: MemberId,
    },

    /// Recent history, sent once to a member whose session just joined.
    Backlog {
        /// Room the history belongs to.
        room: RoomId,
        /// Messages in seq order, at most the room's history window.
        messages: Vec<Message>,
    },
}

/// Channel a member's session receives [`RoomEvent`]s on.
///
/// The host creates one per session and hands the sender over at join time.
/// Its capacity bounds how far a slow consumer may lag before events are
/// dropped for it.
pub type Outbox = mpsc::Sender<RoomEvent>;
