//! Error taxonomy for the chat core.
//!
//! Expected refusals (denied admission, acting on a room you are not in) are
//! ordinary values a caller handles; only [`ChatError::Internal`] signals a
//! fault in the machinery. A failed operation never leaves room or directory
//! state partially mutated.

use thiserror::Error;

use crate::auth::DenyReason;
use crate::types::RoomId;

/// Errors returned by the gate and directory surfaces.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// The policy refused the command before any state was touched.
    #[error("unauthorized: {0}")]
    Unauthorized(DenyReason),

    /// A room-scoped action from an identity that is not a member.
    #[error("not a member of room {room}")]
    NotAMember {
        /// Room the action addressed.
        room: RoomId,
    },

    /// The room does not exist for this caller.
    ///
    /// Raised when the room's actor has terminated, or when policy treats
    /// the room as unknown to the caller.
    #[error("room {room} not found")]
    NotFound {
        /// Room the action addressed.
        room: RoomId,
    },

    /// Fault in the machinery rather than in the request.
    ///
    /// Room state is uncorrupted when this is returned; retrying is safe.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChatError {
    /// True for faults in the machinery rather than in the request.
    ///
    /// Internal errors are the only variant worth surfacing to operators;
    /// the rest are answers to the caller.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}
