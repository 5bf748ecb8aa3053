//! Fuzz target for the table admission policy
//!
//! Every decision is checked against an independently computed oracle
//!
//! # Strategy
//!
//! - Random tables: tokens, capability bits, expiries, room restrictions
//! - Registered probes: indexed into the table so hits are common
//! - Unknown probes: arbitrary tokens, occasionally colliding with real ones
//! - Clock sweep: probe times land around each entry's expiry second
//!
//! # Invariants
//!
//! - authorize never panics
//! - Decisions match the oracle checking lookup, then expiry, then
//!   capability, then restriction
//! - Allow always carries the registered member, never a probe-supplied one
//! - Equal probes yield equal decisions

#![no_main]

use std::collections::{HashMap, HashSet};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use parlor_core::{
    Action, AuthPolicy, Credential, CredentialEntry, Decision, DenyReason, MemberId, Permissions,
    RoomId, TablePolicy,
};

const MEMBERS: [&str; 4] = ["alice", "bob", "carol", "dave"];
const ROOMS: [&str; 4] = ["lobby", "den", "attic", "annex"];

#[derive(Debug, Arbitrary)]
struct PolicyScenario {
    entries: Vec<EntrySpec>,
    restrictions: Vec<Restriction>,
    probes: Vec<Probe>,
}

#[derive(Debug, Arbitrary)]
struct EntrySpec {
    token: String,
    member: u8,
    bits: PermissionBits,
    expires_at_secs: Option<u16>,
}

#[derive(Debug, Clone, Copy, Arbitrary)]
struct PermissionBits {
    join: bool,
    leave: bool,
    say: bool,
    list: bool,
    create: bool,
}

impl PermissionBits {
    fn permissions(self) -> Permissions {
        Permissions {
            join: self.join,
            leave: self.leave,
            say: self.say,
            list: self.list,
            create: self.create,
        }
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

#[derive(Debug, Arbitrary)]
struct Restriction {
    room: u8,
    members: Vec<u8>,
}

#[derive(Debug, Arbitrary)]
enum Probe {
    Registered { entry: u8, room: Option<u8>, action: ActionChoice, now_secs: u16 },
    Unknown { token: String, room: Option<u8>, action: ActionChoice, now_secs: u16 },
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum ActionChoice {
    Join,
    Leave,
    Say,
    ListRooms,
    EnsureRoom,
}

impl ActionChoice {
    fn action(self) -> Action {
        match self {
            Self::Join => Action::Join,
            Self::Leave => Action::Leave,
            Self::Say => Action::Say,
            Self::ListRooms => Action::ListRooms,
            Self::EnsureRoom => Action::EnsureRoom,
        }
    }
}

struct Oracle {
    entries: HashMap<String, (MemberId, PermissionBits, Option<u64>)>,
    restricted: HashMap<RoomId, HashSet<MemberId>>,
}

impl Oracle {
    fn decide(
        &self,
        token: &str,
        room: Option<&RoomId>,
        action: Action,
        now_secs: u64,
    ) -> Decision {
        let Some((member, bits, expires_at_secs)) = self.entries.get(token) else {
            return Decision::Deny(DenyReason::UnknownCredential);
        };
        if let Some(expires_at) = expires_at_secs {
            if *expires_at <= now_secs {
                return Decision::Deny(DenyReason::Expired);
            }
        }
        if !bits.allows(action) {
            return Decision::Deny(DenyReason::MissingPermission { action });
        }
        if action.is_room_scoped() {
            if let Some(room) = room {
                if let Some(allowed) = self.restricted.get(room) {
                    if !allowed.contains(member) {
                        return Decision::Deny(DenyReason::MissingPermission { action });
                    }
                }
            }
        }
        Decision::Allow(member.clone())
    }
}

fuzz_target!(|scenario: PolicyScenario| {
    let mut policy = TablePolicy::new();
    let mut oracle = Oracle { entries: HashMap::new(), restricted: HashMap::new() };

    let entries: Vec<&EntrySpec> = scenario.entries.iter().take(8).collect();
    for spec in &entries {
        let member = MemberId::new(MEMBERS[(spec.member as usize) % MEMBERS.len()]);
        let expires_at_secs = spec.expires_at_secs.map(u64::from);
        policy.insert(
            Credential::new(spec.token.clone()),
            CredentialEntry {
                member: member.clone(),
                permissions: spec.bits.permissions(),
                expires_at_secs,
            },
        );
        oracle.entries.insert(spec.token.clone(), (member, spec.bits, expires_at_secs));
    }

    for restriction in scenario.restrictions.iter().take(4) {
        let room = RoomId::new(ROOMS[(restriction.room as usize) % ROOMS.len()]);
        let allowed: HashSet<MemberId> = restriction
            .members
            .iter()
            .take(4)
            .map(|m| MemberId::new(MEMBERS[(*m as usize) % MEMBERS.len()]))
            .collect();
        policy.restrict_room(room.clone(), allowed.iter().cloned());
        oracle.restricted.insert(room, allowed);
    }

    for probe in scenario.probes.iter().take(64) {
        let (token, room, action, now_secs) = match probe {
            Probe::Registered { entry, room, action, now_secs } => {
                let token = if entries.is_empty() {
                    String::new()
                } else {
                    entries[(*entry as usize) % entries.len()].token.clone()
                };
                (token, *room, action.action(), u64::from(*now_secs))
            }
            Probe::Unknown { token, room, action, now_secs } => {
                (token.clone(), *room, action.action(), u64::from(*now_secs))
            }
        };
        let room = room.map(|r| RoomId::new(ROOMS[(r as usize) % ROOMS.len()]));
        let credential = Credential::new(token.clone());

        let decision = policy.authorize(&credential, room.as_ref(), action, now_secs);
        let expected = oracle.decide(&token, room.as_ref(), action, now_secs);
        assert_eq!(decision, expected, "policy diverged from oracle on {:?}", probe);

        let again = policy.authorize(&credential, room.as_ref(), action, now_secs);
        assert_eq!(decision, again, "authorize is not deterministic");
    }
});
