//! Admission gate: the checkpoint every client command passes through.
//!
//! The gate owns the policy and fronts the directory. [`AuthGate::intercept`]
//! authorizes first and forwards second: a deny returns before any directory
//! or room state is touched, and an allowed command runs as the identity the
//! policy resolved, never one the client picked.

use std::sync::Arc;

use bytes::Bytes;

use crate::auth::{Action, AuthPolicy, Decision, DenyReason};
use crate::directory::{RoomDirectory, RoomOp};
use crate::env::Environment;
use crate::error::ChatError;
use crate::room::RoomHandle;
use crate::types::{Credential, Outbox, RoomId};

/// Client command surface. Every variant carries the presented credential;
/// none carries an identity, which only the policy can supply.
#[derive(Debug, Clone)]
pub enum Command {
    /// Enter a room, creating it on first use.
    Join {
        /// Presented credential.
        credential: Credential,
        /// Target room.
        room: RoomId,
        /// Channel the session receives room events on.
        outbox: Outbox,
    },

    /// Exit a room.
    Leave {
        /// Presented credential.
        credential: Credential,
        /// Target room.
        room: RoomId,
    },

    /// Post a message.
    Say {
        /// Presented credential.
        credential: Credential,
        /// Target room.
        room: RoomId,
        /// Message body.
        body: Bytes,
    },

    /// List live rooms.
    ListRooms {
        /// Presented credential.
        credential: Credential,
    },

    /// Materialize a room without joining it.
    EnsureRoom {
        /// Presented credential.
        credential: Credential,
        /// Target room.
        room: RoomId,
    },
}

impl Command {
    /// Action category the policy rules on.
    #[must_use]
    pub fn action(&self) -> Action {
        match self {
            Self::Join { .. } => Action::Join,
            Self::Leave { .. } => Action::Leave,
            Self::Say { .. } => Action::Say,
            Self::ListRooms { .. } => Action::ListRooms,
            Self::EnsureRoom { .. } => Action::EnsureRoom,
        }
    }

    /// Room the command addresses, when room-scoped.
    #[must_use]
    pub fn room(&self) -> Option<&RoomId> {
        match self {
            Self::Join { room, .. }
            | Self::Leave { room, .. }
            | Self::Say { room, .. }
            | Self::EnsureRoom { room, .. } => Some(room),
            Self::ListRooms { .. } => None,
        }
    }

    fn credential(&self) -> &Credential {
        match self {
            Self::Join { credential, .. }
            | Self::Leave { credential, .. }
            | Self::Say { credential, .. }
            | Self::ListRooms { credential }
            | Self::EnsureRoom { credential, .. } => credential,
        }
    }
}

/// Successful result of an admitted command.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Join completed.
    Joined {
        /// Whether membership grew. `false` means the member was already
        /// present and only the session outbox was refreshed.
        newly: bool,
    },

    /// Leave completed.
    Left {
        /// Whether the member had been present.
        was_member: bool,
    },

    /// Message accepted.
    Accepted {
        /// Assigned per-room sequence number.
        seq: u64,
    },

    /// Live room ids. Order is unspecified.
    Rooms(Vec<RoomId>),

    /// Handle to the ensured room.
    Room(RoomHandle),
}

/// Admission middleware in front of the room directory.
pub struct AuthGate<P, E> {
    policy: P,
    directory: Arc<RoomDirectory<E>>,
    env: E,
}

impl<P: AuthPolicy, E: Environment> AuthGate<P, E> {
    /// Gate `directory` behind `policy`.
    pub fn new(policy: P, directory: Arc<RoomDirectory<E>>, env: E) -> Self {
        Self { policy, directory, env }
    }

    /// The directory behind the gate.
    ///
    /// Host wiring and privileged observers go through this; client
    /// commands must use [`AuthGate::intercept`].
    #[must_use]
    pub fn directory(&self) -> &Arc<RoomDirectory<E>> {
        &self.directory
    }

    /// Authorize `command` and, only on allow, execute it.
    ///
    /// Denials return before any directory or room state is read or
    /// written: [`ChatError::Unauthorized`] for refused credentials and
    /// capabilities, [`ChatError::NotFound`] when the policy hides the
    /// room. The forwarded operation runs as the resolved member.
    pub async fn intercept(&self, command: Command) -> Result<Outcome, ChatError> {
        let action = command.action();
        let decision = self.policy.authorize(
            command.credential(),
            command.room(),
            action,
            self.env.wall_clock_secs(),
        );
        let member = match decision {
            Decision::Allow(member) => member,
            Decision::Deny(reason) => {
                tracing::debug!(%action, %reason, "command denied");
                let err = match (reason, command.room()) {
                    (DenyReason::UnknownRoom, Some(room)) => {
                        ChatError::NotFound { room: room.clone() }
                    }
                    (reason, _) => ChatError::Unauthorized(reason),
                };
                return Err(err);
            }
        };
        match command {
            Command::Join { room, outbox, .. } => {
                self.directory.dispatch(member, RoomOp::Join { room, outbox }).await
            }
            Command::Leave { room, .. } => {
                self.directory.dispatch(member, RoomOp::Leave { room }).await
            }
            Command::Say { room, body, .. } => {
                self.directory.dispatch(member, RoomOp::Say { room, body }).await
            }
            Command::ListRooms { .. } => Ok(Outcome::Rooms(self.directory.list_rooms().await)),
            Command::EnsureRoom { room, .. } => {
                let handle = self.directory.ensure_room(&room).await?;
                Ok(Outcome::Room(handle))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CredentialEntry, Permissions, TablePolicy};
    use crate::types::MemberId;

    #[derive(Debug, Clone)]
    struct TestEnv {
        secs: u64,
    }

    impl Environment for TestEnv {
        type Instant = std::time::Instant;

        #[allow(clippy::disallowed_methods)]
        fn now(&self) -> Self::Instant {
            std::time::Instant::now()
        }

        fn wall_clock_secs(&self) -> u64 {
            self.secs
        }
    }

    fn gate_with_alice() -> AuthGate<TablePolicy, TestEnv> {
        let mut policy = TablePolicy::new();
        policy.insert(
            Credential::new("tok-alice"),
            CredentialEntry {
                member: MemberId::new("alice"),
                permissions: Permissions::full(),
                expires_at_secs: None,
            },
        );
        let env = TestEnv { secs: 1_000 };
        AuthGate::new(policy, Arc::new(RoomDirectory::new(env.clone())), env)
    }

    #[tokio::test]
    async fn test_denied_commands_reach_no_state() {
        let gate = gate_with_alice();
        let err = gate
            .intercept(Command::EnsureRoom {
                credential: Credential::new("tok-mallory"),
                room: RoomId::new("lobby"),
            })
            .await
            .unwrap_err();
        assert_eq!(err, ChatError::Unauthorized(DenyReason::UnknownCredential));
        // The room was never materialized.
        assert!(gate.directory().list_rooms().await.is_empty());
    }

    #[tokio::test]
    async fn test_allowed_commands_run_as_the_resolved_member() {
        let gate = gate_with_alice();
        let (tx, _rx) = tokio::sync::mpsc::channel(8);
        gate.intercept(Command::Join {
            credential: Credential::new("tok-alice"),
            room: RoomId::new("lobby"),
            outbox: tx,
        })
        .await
        .unwrap();

        let catalog = gate.directory().catalog().await;
        assert_eq!(catalog[0].members, vec![MemberId::new("alice")]);
    }

    #[tokio::test]
    async fn test_hidden_room_maps_to_not_found() {
        struct HidingPolicy;

        impl AuthPolicy for HidingPolicy {
            fn authorize(
                &self,
                _credential: &Credential,
                room: Option<&RoomId>,
                _action: Action,
                _now_secs: u64,
            ) -> Decision {
                match room {
                    Some(_) => Decision::Deny(DenyReason::UnknownRoom),
                    None => Decision::Allow(MemberId::new("anyone")),
                }
            }
        }

        let env = TestEnv { secs: 0 };
        let gate = AuthGate::new(HidingPolicy, Arc::new(RoomDirectory::new(env.clone())), env);
        let err = gate
            .intercept(Command::Say {
                credential: Credential::new("tok"),
                room: RoomId::new("cellar"),
                body: Bytes::from_static(b"hi"),
            })
            .await
            .unwrap_err();
        assert_eq!(err, ChatError::NotFound { room: RoomId::new("cellar") });
    }

    #[tokio::test]
    async fn test_list_rooms_passes_through() {
        let gate = gate_with_alice();
        gate.intercept(Command::EnsureRoom {
            credential: Credential::new("tok-alice"),
            room: RoomId::new("lobby"),
        })
        .await
        .unwrap();

        let outcome = gate
            .intercept(Command::ListRooms { credential: Credential::new("tok-alice") })
            .await
            .unwrap();
        match outcome {
            Outcome::Rooms(rooms) => assert_eq!(rooms, vec![RoomId::new("lobby")]),
            other => panic!("expected Rooms, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ensure_room_returns_a_live_handle() {
        let gate = gate_with_alice();
        let outcome = gate
            .intercept(Command::EnsureRoom {
                credential: Credential::new("tok-alice"),
                room: RoomId::new("annex"),
            })
            .await
            .unwrap();
        let handle = match outcome {
            Outcome::Room(handle) => handle,
            other => panic!("expected Room, got {other:?}"),
        };
        assert_eq!(handle.room(), &RoomId::new("annex"));
        assert_eq!(handle.snapshot().await.unwrap().member_count(), 0);
    }
}
