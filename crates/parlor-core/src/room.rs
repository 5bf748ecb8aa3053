//! Per-room actor: membership, message ordering, fan-out.
//!
//! Each room is one tokio task owning all of its state. The only way in is
//! the mailbox, and the task handles one command at a time, which gives
//! every room a total order over its operations without locks. A panic in
//! one room's task closes that room's mailbox and nothing else.
//!
//! Bookkeeping lives in the synchronous [`RoomState`] so membership and
//! ordering rules stay testable without a runtime; the async loop is a thin
//! shell that runs one state step per mailbox command.

use std::collections::VecDeque;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use crate::env::Environment;
use crate::error::ChatError;
use crate::types::{MemberId, Message, Outbox, RoomEvent, RoomId};

/// Synchronous room bookkeeping.
///
/// # Invariants
///
/// - `members` is in join order; one entry per member.
/// - `next_seq` starts at 1 and only ever advances, so assigned seqs are
///   strictly increasing with no gaps and no reuse.
/// - `recent` holds at most `history_window` messages, oldest first.
#[derive(Debug)]
pub(crate) struct RoomState {
    room: RoomId,
    created_at_secs: u64,
    members: Vec<MemberEntry>,
    next_seq: u64,
    recent: VecDeque<Message>,
    history_window: usize,
}

#[derive(Debug)]
struct MemberEntry {
    member: MemberId,
    outbox: Outbox,
}

impl RoomState {
    fn new(room: RoomId, created_at_secs: u64, history_window: usize) -> Self {
        Self {
            room,
            created_at_secs,
            members: Vec::new(),
            next_seq: 1,
            recent: VecDeque::new(),
            history_window,
        }
    }

    /// Add or refresh a member. Returns true when membership grew.
    fn join(&mut self, member: MemberId, outbox: Outbox) -> bool {
        if let Some(entry) = self.members.iter_mut().find(|e| e.member == member) {
            // Same member, new session: keep the position, swap the outbox.
            entry.outbox = outbox;
            return false;
        }
        self.members.push(MemberEntry { member, outbox });
        true
    }

    /// Remove a member, preserving the order of the rest. Returns true when
    /// the member was present.
    fn leave(&mut self, member: &MemberId) -> bool {
        let Some(pos) = self.members.iter().position(|e| e.member == *member) else {
            return false;
        };
        self.members.remove(pos);
        true
    }

    fn is_member(&self, member: &MemberId) -> bool {
        self.members.iter().any(|e| e.member == *member)
    }

    /// Accept a message: assign the next seq and record it in the window.
    ///
    /// Fails without touching any state when the sender is not a member or
    /// the seq counter would overflow.
    fn accept(
        &mut self,
        sender: &MemberId,
        body: Bytes,
        now_secs: u64,
    ) -> Result<Message, ChatError> {
        if !self.is_member(sender) {
            return Err(ChatError::NotAMember { room: self.room.clone() });
        }
        let seq = self.next_seq;
        self.next_seq = seq.checked_add(1).ok_or_else(|| {
            ChatError::Internal(format!("seq counter exhausted in room {}", self.room))
        })?;
        debug_assert!(self.next_seq > seq, "seq counter must advance");
        let message = Message {
            sender: sender.clone(),
            room: self.room.clone(),
            body,
            seq,
            sent_at_secs: now_secs,
        };
        self.recent.push_back(message.clone());
        while self.recent.len() > self.history_window {
            self.recent.pop_front();
        }
        Ok(message)
    }

    /// Recent accepted messages, oldest first.
    fn backlog(&self) -> Vec<Message> {
        self.recent.iter().cloned().collect()
    }

    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room: self.room.clone(),
            members: self.members.iter().map(|e| e.member.clone()).collect(),
            created_at_secs: self.created_at_secs,
            // next_seq starts at 1 and never decreases.
            last_seq: self.next_seq - 1,
        }
    }

    /// Deliver an event to every member in join order, optionally skipping
    /// one. Full or closed outboxes drop the event for that member only.
    fn deliver(&self, event: &RoomEvent, exclude: Option<&MemberId>) {
        for entry in &self.members {
            if exclude.is_some_and(|skip| *skip == entry.member) {
                continue;
            }
            match entry.outbox.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(
                        room = %self.room,
                        member = %entry.member,
                        "outbox full, dropping event"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(
                        room = %self.room,
                        member = %entry.member,
                        "outbox closed, dropping event"
                    );
                }
            }
        }
    }

    /// Send the history window to one member's outbox.
    fn send_backlog(&self, member: &MemberId) {
        let Some(entry) = self.members.iter().find(|e| e.member == *member) else {
            return;
        };
        let event = RoomEvent::Backlog { room: self.room.clone(), messages: self.backlog() };
        if entry.outbox.try_send(event).is_err() {
            tracing::debug!(room = %self.room, member = %member, "outbox rejected backlog");
        }
    }
}

/// Mailbox commands a room task processes.
#[derive(Debug)]
pub(crate) enum RoomCommand {
    Join { member: MemberId, outbox: Outbox, reply: oneshot::Sender<bool> },
    Leave { member: MemberId, reply: oneshot::Sender<bool> },
    Say { member: MemberId, body: Bytes, reply: oneshot::Sender<Result<u64, ChatError>> },
    Snapshot { reply: oneshot::Sender<RoomSnapshot> },
}

/// Point-in-time view of a room's membership and counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    /// Room this snapshot describes.
    pub room: RoomId,

    /// Members in join order.
    pub members: Vec<MemberId>,

    /// Wall-clock seconds when the room was created.
    pub created_at_secs: u64,

    /// Seq of the most recently accepted message; 0 when none yet.
    pub last_seq: u64,
}

impl RoomSnapshot {
    /// Number of current members.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

/// Cheap-to-clone handle addressing one room actor.
///
/// Every clone points at the same mailbox; [`RoomHandle::same_actor`] makes
/// that identity observable. A handle whose actor has terminated answers
/// [`ChatError::NotFound`] on every operation.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    room: RoomId,
    mailbox: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Room this handle addresses.
    #[must_use]
    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// True when both handles address the same underlying actor.
    #[must_use]
    pub fn same_actor(&self, other: &RoomHandle) -> bool {
        self.mailbox.same_channel(&other.mailbox)
    }

    /// Enter the room as `member`, receiving events on `outbox`.
    ///
    /// Returns `true` when membership grew and `false` when the member was
    /// already present (the stored outbox is refreshed). The joining
    /// session receives a [`RoomEvent::Backlog`] either way; members
    /// present before the join see [`RoomEvent::MemberJoined`] only when
    /// membership grew.
    pub async fn join(&self, member: MemberId, outbox: Outbox) -> Result<bool, ChatError> {
        let (reply, response) = oneshot::channel();
        self.send(RoomCommand::Join { member, outbox, reply }).await?;
        self.recv(response).await
    }

    /// Exit the room. Returns `true` when the member had been present.
    ///
    /// Remaining members see [`RoomEvent::MemberLeft`] when membership
    /// shrank. Leaving twice is a no-op.
    pub async fn leave(&self, member: MemberId) -> Result<bool, ChatError> {
        let (reply, response) = oneshot::channel();
        self.send(RoomCommand::Leave { member, reply }).await?;
        self.recv(response).await
    }

    /// Post a message, returning the assigned per-room seq.
    ///
    /// The message is fanned out to every member, sender included, before
    /// the room touches its next command. Non-members are refused with
    /// [`ChatError::NotAMember`] without consuming a seq.
    pub async fn say(&self, member: MemberId, body: Bytes) -> Result<u64, ChatError> {
        let (reply, response) = oneshot::channel();
        self.send(RoomCommand::Say { member, body, reply }).await?;
        self.recv(response).await?
    }

    /// Current membership and counters.
    pub async fn snapshot(&self) -> Result<RoomSnapshot, ChatError> {
        let (reply, response) = oneshot::channel();
        self.send(RoomCommand::Snapshot { reply }).await?;
        self.recv(response).await
    }

    async fn send(&self, command: RoomCommand) -> Result<(), ChatError> {
        self.mailbox
            .send(command)
            .await
            .map_err(|_| ChatError::NotFound { room: self.room.clone() })
    }

    async fn recv<T>(&self, response: oneshot::Receiver<T>) -> Result<T, ChatError> {
        response
            .await
            .map_err(|_| ChatError::Internal(format!("room {} dropped a reply", self.room)))
    }
}

/// Spawn the actor task for `room` and return its handle.
pub(crate) fn spawn_room<E: Environment>(
    room: RoomId,
    env: &E,
    mailbox_capacity: usize,
    history_window: usize,
) -> RoomHandle {
    let (mailbox, commands) = mpsc::channel(mailbox_capacity);
    let state = RoomState::new(room.clone(), env.wall_clock_secs(), history_window);
    tokio::spawn(run(state, env.clone(), commands));
    RoomHandle { room, mailbox }
}

async fn run<E: Environment>(
    mut state: RoomState,
    env: E,
    mut commands: mpsc::Receiver<RoomCommand>,
) {
    while let Some(command) = commands.recv().await {
        step(&mut state, &env, command);
    }
    tracing::debug!(room = %state.room, "mailbox closed, room actor stopping");
}

/// One state step per mailbox command. Replies are sent only after every
/// fan-out for the command has happened, so a caller that has its answer
/// knows the outboxes already hold the events.
fn step<E: Environment>(state: &mut RoomState, env: &E, command: RoomCommand) {
    match command {
        RoomCommand::Join { member, outbox, reply } => {
            let newly = state.join(member.clone(), outbox);
            if newly {
                let event =
                    RoomEvent::MemberJoined { room: state.room.clone(), member: member.clone() };
                state.deliver(&event, Some(&member));
            }
            // The fresh session always gets history, rejoin included.
            state.send_backlog(&member);
            let _ = reply.send(newly);
        }
        RoomCommand::Leave { member, reply } => {
            let left = state.leave(&member);
            if left {
                let event = RoomEvent::MemberLeft { room: state.room.clone(), member };
                state.deliver(&event, None);
            }
            let _ = reply.send(left);
        }
        RoomCommand::Say { member, body, reply } => {
            match state.accept(&member, body, env.wall_clock_secs()) {
                Ok(message) => {
                    let seq = message.seq;
                    state.deliver(&RoomEvent::Message(message), None);
                    let _ = reply.send(Ok(seq));
                }
                Err(err) => {
                    let _ = reply.send(Err(err));
                }
            }
        }
        RoomCommand::Snapshot { reply } => {
            let _ = reply.send(state.snapshot());
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc::Receiver;

    use super::*;

    fn outbox(capacity: usize) -> (Outbox, Receiver<RoomEvent>) {
        mpsc::channel(capacity)
    }

    fn drain(events: &mut Receiver<RoomEvent>) -> Vec<RoomEvent> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    fn state() -> RoomState {
        RoomState::new(RoomId::new("lobby"), 1_000, 8)
    }

    #[test]
    fn test_join_is_idempotent_on_membership() {
        let mut state = state();
        let (tx, _rx) = outbox(4);
        assert!(state.join(MemberId::new("alice"), tx.clone()));
        assert!(!state.join(MemberId::new("alice"), tx));
        assert_eq!(state.snapshot().members, vec![MemberId::new("alice")]);
    }

    #[test]
    fn test_rejoin_replaces_the_outbox() {
        let mut state = state();
        let (old_tx, old_rx) = outbox(4);
        let (new_tx, mut new_rx) = outbox(4);
        state.join(MemberId::new("alice"), old_tx);
        drop(old_rx);
        state.join(MemberId::new("alice"), new_tx);

        let message =
            state.accept(&MemberId::new("alice"), Bytes::from_static(b"hi"), 1_001).unwrap();
        state.deliver(&RoomEvent::Message(message), None);
        assert_eq!(drain(&mut new_rx).len(), 1);
    }

    #[test]
    fn test_members_keep_join_order() {
        let mut state = state();
        for name in ["alice", "bob", "carol"] {
            let (tx, _rx) = outbox(1);
            state.join(MemberId::new(name), tx);
        }
        state.leave(&MemberId::new("bob"));
        assert_eq!(
            state.snapshot().members,
            vec![MemberId::new("alice"), MemberId::new("carol")]
        );
    }

    #[test]
    fn test_leave_of_absent_member_is_a_noop() {
        let mut state = state();
        assert!(!state.leave(&MemberId::new("ghost")));
        assert_eq!(state.snapshot().member_count(), 0);
    }

    #[test]
    fn test_seqs_start_at_one_and_do_not_gap() {
        let mut state = state();
        let (tx, _rx) = outbox(16);
        state.join(MemberId::new("alice"), tx);
        for expected in 1..=5 {
            let message = state
                .accept(&MemberId::new("alice"), Bytes::from_static(b"m"), 1_000)
                .unwrap();
            assert_eq!(message.seq, expected);
        }
        assert_eq!(state.snapshot().last_seq, 5);
    }

    #[test]
    fn test_non_member_burns_no_seq() {
        let mut state = state();
        let (tx, _rx) = outbox(4);
        state.join(MemberId::new("alice"), tx);

        let err = state
            .accept(&MemberId::new("mallory"), Bytes::from_static(b"hi"), 1_000)
            .unwrap_err();
        assert_eq!(err, ChatError::NotAMember { room: RoomId::new("lobby") });

        let message = state
            .accept(&MemberId::new("alice"), Bytes::from_static(b"hi"), 1_000)
            .unwrap();
        assert_eq!(message.seq, 1);
    }

    #[test]
    fn test_seq_overflow_is_internal_and_leaves_state_alone() {
        let mut state = state();
        let (tx, _rx) = outbox(4);
        state.join(MemberId::new("alice"), tx);
        state.next_seq = u64::MAX;

        let err = state
            .accept(&MemberId::new("alice"), Bytes::from_static(b"hi"), 1_000)
            .unwrap_err();
        assert!(err.is_internal());
        assert_eq!(state.next_seq, u64::MAX);
        assert!(state.backlog().is_empty());
    }

    #[test]
    fn test_history_window_keeps_the_most_recent() {
        let mut state = RoomState::new(RoomId::new("lobby"), 1_000, 3);
        let (tx, _rx) = outbox(1);
        state.join(MemberId::new("alice"), tx);
        for _ in 0..5 {
            state.accept(&MemberId::new("alice"), Bytes::from_static(b"m"), 1_000).unwrap();
        }
        let seqs: Vec<u64> = state.backlog().iter().map(|m| m.seq).collect();
        assert_eq!(seqs, vec![3, 4, 5]);
    }

    #[test]
    fn test_zero_history_window_keeps_nothing() {
        let mut state = RoomState::new(RoomId::new("lobby"), 1_000, 0);
        let (tx, _rx) = outbox(1);
        state.join(MemberId::new("alice"), tx);
        state.accept(&MemberId::new("alice"), Bytes::from_static(b"m"), 1_000).unwrap();
        assert!(state.backlog().is_empty());
    }

    #[test]
    fn test_deliver_skips_the_excluded_member() {
        let mut state = state();
        let (alice_tx, mut alice_rx) = outbox(4);
        let (bob_tx, mut bob_rx) = outbox(4);
        state.join(MemberId::new("alice"), alice_tx);
        state.join(MemberId::new("bob"), bob_tx);

        let event = RoomEvent::MemberJoined {
            room: RoomId::new("lobby"),
            member: MemberId::new("bob"),
        };
        state.deliver(&event, Some(&MemberId::new("bob")));
        assert_eq!(drain(&mut alice_rx).len(), 1);
        assert!(drain(&mut bob_rx).is_empty());
    }

    #[test]
    fn test_full_outbox_drops_without_affecting_others() {
        let mut state = state();
        let (full_tx, mut full_rx) = outbox(1);
        let (ok_tx, mut ok_rx) = outbox(4);
        state.join(MemberId::new("slow"), full_tx);
        state.join(MemberId::new("fast"), ok_tx);

        for _ in 0..3 {
            let message = state
                .accept(&MemberId::new("fast"), Bytes::from_static(b"m"), 1_000)
                .unwrap();
            state.deliver(&RoomEvent::Message(message), None);
        }
        // Slow consumer got only what fit; fast consumer got everything.
        assert_eq!(drain(&mut full_rx).len(), 1);
        assert_eq!(drain(&mut ok_rx).len(), 3);
    }

    #[tokio::test]
    async fn test_actor_replies_after_fanning_out() {
        let env = TestEnv { secs: 2_000 };
        let handle = spawn_room(RoomId::new("lobby"), &env, 8, 8);
        let (tx, mut rx) = outbox(8);

        assert!(handle.join(MemberId::new("alice"), tx).await.unwrap());
        let seq = handle.say(MemberId::new("alice"), Bytes::from_static(b"hi")).await.unwrap();
        assert_eq!(seq, 1);

        // The reply arrived, so the outbox must already hold the backlog
        // and the message.
        let events = drain(&mut rx);
        assert!(matches!(&events[0], RoomEvent::Backlog { messages, .. } if messages.is_empty()));
        assert!(matches!(
            &events[1],
            RoomEvent::Message(message) if message.seq == 1 && message.sent_at_secs == 2_000
        ));
    }

    #[tokio::test]
    async fn test_handle_identity_tracks_the_mailbox() {
        let env = TestEnv { secs: 0 };
        let a = spawn_room(RoomId::new("a"), &env, 4, 4);
        let b = spawn_room(RoomId::new("a"), &env, 4, 4);
        assert!(a.same_actor(&a.clone()));
        assert!(!a.same_actor(&b));
    }

    #[tokio::test]
    async fn test_terminated_actor_answers_not_found() {
        // A handle whose receiving task is gone behaves like a missing room.
        let (mailbox, commands) = mpsc::channel(1);
        drop(commands);
        let handle = RoomHandle { room: RoomId::new("doomed"), mailbox };

        let err = handle.snapshot().await.unwrap_err();
        assert_eq!(err, ChatError::NotFound { room: RoomId::new("doomed") });

        let err = handle.say(MemberId::new("alice"), Bytes::from_static(b"hi")).await.unwrap_err();
        assert_eq!(err, ChatError::NotFound { room: RoomId::new("doomed") });
    }

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
}
