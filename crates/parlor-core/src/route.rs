//! Path routing: the fixed table mapping transport paths to addresses.
//!
//! Two patterns exist: `/rooms` addresses the directory and `/room/:id`
//! addresses a single room. The table is built once at startup and never
//! changes; resolution is pure string work.

use thiserror::Error;

use crate::types::RoomId;

/// Where a resolved path points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// The room directory (listing, ensure).
    Directory,
    /// A single room actor.
    Room(RoomId),
}

impl Address {
    /// Canonical path for this address.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Directory => "/rooms".to_owned(),
            Self::Room(id) => format!("/room/{id}"),
        }
    }
}

/// Path resolution failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// The path matches no installed pattern.
    #[error("no route for path {0:?}")]
    UnknownPath(String),

    /// A `/room/:id` path with an empty id segment.
    #[error("empty room id")]
    EmptyRoomId,
}

/// What a pattern resolves to when its head segment matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    /// Bare head addresses the directory.
    Directory,
    /// Head plus one id segment addresses a room.
    Room,
}

#[derive(Debug, Clone)]
struct Pattern {
    head: &'static str,
    target: Target,
}

/// Immutable routing table built at startup.
///
/// A single trailing slash is tolerated on both patterns; clients address
/// the directory as `/rooms` or `/rooms/` interchangeably.
#[derive(Debug, Clone)]
pub struct RouteTable {
    patterns: Vec<Pattern>,
}

impl RouteTable {
    /// Table with the standard chat patterns installed:
    /// `/rooms` → [`Address::Directory`], `/room/:id` → [`Address::Room`].
    #[must_use]
    pub fn standard() -> Self {
        Self {
            patterns: vec![
                Pattern { head: "rooms", target: Target::Directory },
                Pattern { head: "room", target: Target::Room },
            ],
        }
    }

    /// Resolve a transport path to an address.
    pub fn resolve(&self, path: &str) -> Result<Address, RouteError> {
        let Some(rest) = path.strip_prefix('/') else {
            return Err(RouteError::UnknownPath(path.to_owned()));
        };
        let (head, tail) = match rest.split_once('/') {
            Some((head, tail)) => (head, Some(tail)),
            None => (rest, None),
        };
        for pattern in &self.patterns {
            if pattern.head != head {
                continue;
            }
            match pattern.target {
                Target::Directory => {
                    if matches!(tail, None | Some("")) {
                        return Ok(Address::Directory);
                    }
                }
                Target::Room => {
                    if let Some(raw) = tail {
                        let id = raw.strip_suffix('/').unwrap_or(raw);
                        if id.is_empty() {
                            return Err(RouteError::EmptyRoomId);
                        }
                        if id.contains('/') {
                            return Err(RouteError::UnknownPath(path.to_owned()));
                        }
                        return Ok(Address::Room(RoomId::new(id)));
                    }
                }
            }
        }
        Err(RouteError::UnknownPath(path.to_owned()))
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::standard()
    }
}
