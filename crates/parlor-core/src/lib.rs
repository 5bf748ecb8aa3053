//! Actor-addressed chat room core.
//!
//! Every room is an independently scheduled actor owning its own membership,
//! message ordering, and fan-out. A directory materializes rooms on first
//! use and routes commands to them, and an admission gate authorizes every
//! client command before any state can change.
//!
//! # Architecture
//!
//! ```text
//! Command ──> AuthGate ──> RoomDirectory ──> RoomActor (one task per room)
//!               │               │                 │
//!           AuthPolicy      ensure_room    mailbox + RoomState
//! ```
//!
//! # Components
//!
//! - **Admission**: [`AuthGate::intercept`] consults an [`AuthPolicy`] with
//!   the presented [`Credential`]. Only allowed commands proceed, running as
//!   the policy-resolved [`MemberId`]; a deny returns before any state is
//!   touched.
//! - **Routing**: [`RouteTable`] maps transport paths (`/rooms`,
//!   `/room/:id`) to addresses. The host maps its transport frames to
//!   [`Command`]s.
//! - **Rooms**: each [`RoomHandle`] fronts a tokio task that processes one
//!   command at a time. Per-room seqs start at 1 and never gap; joiners get
//!   a backlog of recent history.
//! - **Delivery**: fan-out is best-effort `try_send` to member outboxes. A
//!   slow consumer loses events; it never blocks the room.
//!
//! The crate is transport-free: no sockets, no wire format, no persistence.
//! Hosts bring their own transport and install a `tracing` subscriber.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod directory;
pub mod env;
pub mod error;
pub mod gate;
pub mod room;
pub mod route;
pub mod types;

pub use auth::{Action, AuthPolicy, CredentialEntry, Decision, DenyReason, Permissions, TablePolicy};
pub use directory::{DirectoryConfig, RoomDirectory, RoomOp};
pub use env::{Environment, SystemEnv};
pub use error::ChatError;
pub use gate::{AuthGate, Command, Outcome};
pub use room::{RoomHandle, RoomSnapshot};
pub use route::{Address, RouteError, RouteTable};
pub use types::{Credential, MemberId, Message, Outbox, RoomEvent, RoomId};
