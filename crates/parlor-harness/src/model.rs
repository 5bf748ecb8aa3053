//! Reference model for model-based tests.
//!
//! [`ModelWorld`] is the obviously-correct, single-threaded answer to what
//! the directory and its rooms should look like after a sequence of
//! operations. Tests apply the same operations to the real system and the
//! model, comparing outcomes step by step and snapshots at the end.

use std::collections::BTreeMap;

use parlor_core::{MemberId, RoomId, RoomSnapshot};

/// One room's expected state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRoom {
    /// Members in join order.
    pub members: Vec<MemberId>,

    /// Seq the next accepted message will take.
    pub next_seq: u64,
}

impl ModelRoom {
    fn new() -> Self {
        Self { members: Vec::new(), next_seq: 1 }
    }

    /// Expected `last_seq` for a snapshot of this room.
    #[must_use]
    pub fn last_seq(&self) -> u64 {
        self.next_seq - 1
    }
}

/// Operations the model understands, mirroring the admitted command set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Member joins a room, creating it on first use.
    Join {
        /// Acting member.
        member: MemberId,
        /// Target room.
        room: RoomId,
    },

    /// Member leaves a room.
    Leave {
        /// Acting member.
        member: MemberId,
        /// Target room.
        room: RoomId,
    },

    /// Member posts to a room.
    Say {
        /// Acting member.
        member: MemberId,
        /// Target room.
        room: RoomId,
    },
}

/// What the model expects the real system to answer for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelOutcome {
    /// Join result.
    Joined {
        /// Whether membership grew.
        newly: bool,
    },

    /// Leave result.
    Left {
        /// Whether the member had been present.
        was_member: bool,
    },

    /// Message accepted with this seq.
    Accepted {
        /// Assigned per-room seq.
        seq: u64,
    },

    /// Refused: the sender is not a member of the room.
    NotAMember,
}

/// Expected directory state: rooms keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelWorld {
    /// Rooms the model believes exist.
    pub rooms: BTreeMap<RoomId, ModelRoom>,
}

impl ModelWorld {
    /// Empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one operation, returning what the real system should answer.
    pub fn apply(&mut self, op: &Operation) -> ModelOutcome {
        match op {
            Operation::Join { member, room } => {
                let entry = self.rooms.entry(room.clone()).or_insert_with(ModelRoom::new);
                if entry.members.contains(member) {
                    ModelOutcome::Joined { newly: false }
                } else {
                    entry.members.push(member.clone());
                    ModelOutcome::Joined { newly: true }
                }
            }
            Operation::Leave { member, room } => {
                let was_member = self.rooms.get_mut(room).is_some_and(|entry| {
                    match entry.members.iter().position(|m| m == member) {
                        Some(pos) => {
                            entry.members.remove(pos);
                            true
                        }
                        None => false,
                    }
                });
                ModelOutcome::Left { was_member }
            }
            Operation::Say { member, room } => match self.rooms.get_mut(room) {
                Some(entry) if entry.members.contains(member) => {
                    let seq = entry.next_seq;
                    entry.next_seq += 1;
                    ModelOutcome::Accepted { seq }
                }
                _ => ModelOutcome::NotAMember,
            },
        }
    }

    /// True when a real snapshot agrees with the modeled room.
    #[must_use]
    pub fn matches_snapshot(&self, snapshot: &RoomSnapshot) -> bool {
        self.rooms.get(&snapshot.room).is_some_and(|room| {
            room.members == snapshot.members && room.last_seq() == snapshot.last_seq
        })
    }

    /// Ids the model expects `list_rooms` to return, sorted.
    #[must_use]
    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.keys().cloned().collect()
    }
}
