//! Admission policy: who may do what, decided before any state changes.
//!
//! Policies are pure: given a credential, an action, and the current time,
//! they return a [`Decision`] and touch nothing. The gate consults the
//! policy for every client command and forwards only allowed ones, running
//! them as the identity the policy resolved.

use std::collections::{HashMap, HashSet};
use std::fmt;

use thiserror::Error;

use crate::types::{Credential, MemberId, RoomId};

/// Action categories a policy rules on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Enter a room (creates it on first use).
    Join,
    /// Exit a room.
    Leave,
    /// Post a message to a room.
    Say,
    /// List the rooms the directory tracks.
    ListRooms,
    /// Materialize a room without joining it.
    EnsureRoom,
}

impl Action {
    /// True for actions addressed to a specific room.
    #[must_use]
    pub fn is_room_scoped(self) -> bool {
        matches!(self, Self::Join | Self::Leave | Self::Say | Self::EnsureRoom)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Say => "say",
            Self::ListRooms => "list_rooms",
            Self::EnsureRoom => "ensure_room",
        };
        f.write_str(name)
    }
}

/// Why a command was refused admission.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The credential matches no registered entry.
    #[error("unknown credential")]
    UnknownCredential,

    /// The credential is registered but its validity window has passed.
    #[error("credential expired")]
    Expired,

    /// The credential lacks the capability for the action, or the room is
    /// restricted to members the credential does not resolve to.
    #[error("missing permission for {action}")]
    MissingPermission {
        /// Action that was refused.
        action: Action,
    },

    /// The room is not visible to this principal.
    ///
    /// Policies that hide rooms use this; the gate maps it to a not-found
    /// answer so hidden rooms are indistinguishable from absent ones.
    #[error("unknown room")]
    UnknownRoom,
}

/// Outcome of a policy check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Admit the command, running it as the resolved identity.
    ///
    /// Callers must use this identity and discard anything the client
    /// claimed about itself.
    Allow(MemberId),

    /// Refuse the command. Nothing may be mutated on this path.
    Deny(DenyReason),
}

/// Per-credential capability bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    /// May enter rooms.
    pub join: bool,
    /// May exit rooms.
    pub leave: bool,
    /// May post messages.
    pub say: bool,
    /// May list rooms.
    pub list: bool,
    /// May materialize rooms without joining them.
    pub create: bool,
}

impl Permissions {
    /// Every capability.
    #[must_use]
    pub fn full() -> Self {
        Self { join: true, leave: true, say: true, list: true, create: true }
    }

    /// Ordinary member: everything except bare room creation.
    #[must_use]
    pub fn member() -> Self {
        Self { create: false, ..Self::full() }
    }

    /// Listing only.
    #[must_use]
    pub fn read_only() -> Self {
        Self { join: false, leave: false, say: false, list: true, create: false }
    }

    fn allows(self, action: Action) -> bool {
        match action {
            Action::Join => self.join,
            Action::Leave => self.leave,
            Action::Say => self.say,
            Action::ListRooms => self.list,
            Action::EnsureRoom => self.create,
        }
    }
}

/// What a registered credential resolves to.
#[derive(Debug, Clone)]
pub struct CredentialEntry {
    /// Identity commands run as when this credential is presented.
    pub member: MemberId,

    /// Capability bits.
    pub permissions: Permissions,

    /// Expiry as wall-clock seconds since the Unix epoch; `None` never
    /// expires. A credential is expired from the exact expiry second on.
    pub expires_at_secs: Option<u64>,
}

/// Admission policy consulted before every client command.
///
/// # Invariants
///
/// - Pure: no I/O, no mutation, no clock reads. Time arrives as `now_secs`.
/// - Deterministic: equal inputs yield equal decisions.
pub trait AuthPolicy: Send + Sync + 'static {
    /// Decide whether `credential` may perform `action`, optionally
    /// addressed to `room` (`None` for directory-scoped actions).
    fn authorize(
        &self,
        credential: &Credential,
        room: Option<&RoomId>,
        action: Action,
        now_secs: u64,
    ) -> Decision;
}

/// In-memory policy: a token table plus optional per-room restrictions.
///
/// Rooms without a restriction admit any authenticated member holding the
/// capability for the action. Restricted rooms additionally require the
/// resolved member to be on the room's list; outsiders are refused with
/// [`DenyReason::MissingPermission`].
#[derive(Debug, Clone, Default)]
pub struct TablePolicy {
    entries: HashMap<Credential, CredentialEntry>,
    restricted: HashMap<RoomId, HashSet<MemberId>>,
}

impl TablePolicy {
    /// Empty policy. Denies everything until credentials are registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a credential, replacing any previous entry for the token.
    pub fn insert(&mut self, credential: Credential, entry: CredentialEntry) {
        self.entries.insert(credential, entry);
    }

    /// Restrict `room` to the listed members for room-scoped actions.
    ///
    /// Calling again for the same room replaces the list.
    pub fn restrict_room(&mut self, room: RoomId, members: impl IntoIterator<Item = MemberId>) {
        self.restricted.insert(room, members.into_iter().collect());
    }

    fn lookup(&self, credential: &Credential) -> Option<&CredentialEntry> {
        // Every stored token is compared in full so lookup timing does not
        // reveal near-matches.
        self.entries
            .iter()
            .find(|(stored, _)| constant_time_eq(stored.as_bytes(), credential.as_bytes()))
            .map(|(_, entry)| entry)
    }
}

impl AuthPolicy for TablePolicy {
    fn authorize(
        &self,
        credential: &Credential,
        room: Option<&RoomId>,
        action: Action,
        now_secs: u64,
    ) -> Decision {
        let Some(entry) = self.lookup(credential) else {
            return Decision::Deny(DenyReason::UnknownCredential);
        };
        if let Some(expires_at) = entry.expires_at_secs
            && expires_at <= now_secs
        {
            return Decision::Deny(DenyReason::Expired);
        }
        if !entry.permissions.allows(action) {
            return Decision::Deny(DenyReason::MissingPermission { action });
        }
        if action.is_room_scoped()
            && let Some(room) = room
            && let Some(allowed) = self.restricted.get(room)
            && !allowed.contains(&entry.member)
        {
            return Decision::Deny(DenyReason::MissingPermission { action });
        }
        Decision::Allow(entry.member.clone())
    }
}

/// Constant-time byte comparison.
///
/// Length differences short-circuit; equal-length inputs are always compared
/// in full so token checks do not leak matching-prefix length through timing.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
