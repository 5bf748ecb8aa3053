//! Room directory: the registry of live rooms.
//!
//! Maps room ids to actor handles. Rooms materialize on first use:
//! [`RoomDirectory::ensure_room`] is the only place actors are spawned, and
//! the write-lock re-check makes creation atomic under contention. Entries
//! are never removed; the directory outlives every room it tracks.

use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::RwLock;

use crate::env::Environment;
use crate::error::ChatError;
use crate::gate::Outcome;
use crate::room::{RoomHandle, RoomSnapshot, spawn_room};
use crate::types::{MemberId, Outbox, RoomId};

/// Tunables for the directory and the rooms it spawns.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Mailbox depth per room actor. Callers await when a room's mailbox
    /// is full; room order is unaffected.
    pub mailbox_capacity: usize,

    /// Messages of history kept per room and replayed to joiners.
    pub history_window: usize,

    /// Hard cap on live rooms. `ensure_room` fails with
    /// [`ChatError::Internal`] once reached; existing rooms are unaffected.
    pub max_rooms: usize,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self { mailbox_capacity: 64, history_window: 32, max_rooms: 10_000 }
    }
}

/// Room-scoped operation with the identity already resolved.
///
/// Produced by the gate after admission; it carries the policy-resolved
/// member, never anything the client claimed about itself.
#[derive(Debug)]
pub enum RoomOp {
    /// Enter `room`, creating it on first use.
    Join {
        /// Target room.
        room: RoomId,
        /// Channel the member's session receives events on.
        outbox: Outbox,
    },

    /// Exit `room`. Idempotent; an absent room is not created.
    Leave {
        /// Target room.
        room: RoomId,
    },

    /// Post to `room`. An absent room is not created; the sender is
    /// refused as a non-member.
    Say {
        /// Target room.
        room: RoomId,
        /// Message body.
        body: Bytes,
    },
}

/// Registry of live rooms with atomic lazy creation.
// TODO: idle-room eviction; needs a TTL or explicit-close policy first,
// entries currently live for the directory's lifetime.
#[derive(Debug)]
pub struct RoomDirectory<E> {
    rooms: RwLock<HashMap<RoomId, RoomHandle>>,
    config: DirectoryConfig,
    env: E,
}

impl<E: Environment> RoomDirectory<E> {
    /// Directory with default tunables.
    #[must_use]
    pub fn new(env: E) -> Self {
        Self::with_config(env, DirectoryConfig::default())
    }

    /// Directory with explicit tunables.
    #[must_use]
    pub fn with_config(env: E, config: DirectoryConfig) -> Self {
        Self { rooms: RwLock::new(HashMap::new()), config, env }
    }

    /// Handle for `room`, spawning its actor on first use.
    ///
    /// At most one actor ever exists per id: losers of a creation race
    /// observe the winner's handle, so concurrent callers always end up
    /// talking to the same actor.
    pub async fn ensure_room(&self, room: &RoomId) -> Result<RoomHandle, ChatError> {
        {
            let rooms = self.rooms.read().await;
            if let Some(handle) = rooms.get(room) {
                return Ok(handle.clone());
            }
        }
        let mut rooms = self.rooms.write().await;
        if let Some(handle) = rooms.get(room) {
            // Lost the creation race; the winner's actor serves everyone.
            return Ok(handle.clone());
        }
        if rooms.len() >= self.config.max_rooms {
            return Err(ChatError::Internal(format!(
                "room cap {} reached, refusing to create {room}",
                self.config.max_rooms
            )));
        }
        let handle = spawn_room(
            room.clone(),
            &self.env,
            self.config.mailbox_capacity,
            self.config.history_window,
        );
        rooms.insert(room.clone(), handle.clone());
        tracing::info!(room = %room, total = rooms.len(), "room created");
        Ok(handle)
    }

    /// Handle for `room` if it exists. Never creates.
    pub async fn room(&self, room: &RoomId) -> Option<RoomHandle> {
        self.rooms.read().await.get(room).cloned()
    }

    /// Ids of every live room. Order is unspecified.
    pub async fn list_rooms(&self) -> Vec<RoomId> {
        self.rooms.read().await.keys().cloned().collect()
    }

    /// Point-in-time snapshot of every live room.
    ///
    /// Handles are collected under the read lock and queried without it;
    /// rooms whose actor terminates mid-query are skipped.
    pub async fn catalog(&self) -> Vec<RoomSnapshot> {
        let handles: Vec<RoomHandle> = self.rooms.read().await.values().cloned().collect();
        let mut snapshots = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(snapshot) = handle.snapshot().await {
                snapshots.push(snapshot);
            }
        }
        snapshots
    }

    /// Execute an admitted room-scoped operation as `member`.
    pub async fn dispatch(&self, member: MemberId, op: RoomOp) -> Result<Outcome, ChatError> {
        match op {
            RoomOp::Join { room, outbox } => {
                let handle = self.ensure_room(&room).await?;
                let newly = handle.join(member, outbox).await?;
                Ok(Outcome::Joined { newly })
            }
            RoomOp::Leave { room } => match self.room(&room).await {
                Some(handle) => {
                    let was_member = handle.leave(member).await?;
                    Ok(Outcome::Left { was_member })
                }
                // Leaving a room that never existed is a no-op.
                None => Ok(Outcome::Left { was_member: false }),
            },
            RoomOp::Say { room, body } => {
                let Some(handle) = self.room(&room).await else {
                    return Err(ChatError::NotAMember { room });
                };
                let seq = handle.say(member, body).await?;
                Ok(Outcome::Accepted { seq })
            }
        }
    }
}
