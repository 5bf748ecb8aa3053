//! Fuzz target for route table resolution
//!
//! Paths are the first untrusted input a command travels through
//!
//! # Strategy
//!
//! - Arbitrary strings: no structure assumed, libFuzzer mutates freely
//! - Near-misses: prefixes and suffixes of `/rooms` and `/room/:id`
//! - Separator abuse: leading, trailing, and repeated slashes
//!
//! # Invariants
//!
//! - resolve never panics on any input
//! - A resolved address re-resolves to itself via its canonical path
//! - Room ids never come out empty or containing a separator
//! - UnknownPath reports the offending path verbatim
//! - EmptyRoomId only arises under the `/room/` pattern

#![no_main]

use libfuzzer_sys::fuzz_target;
use parlor_core::{Address, RouteError, RouteTable};

fuzz_target!(|path: &str| {
    let table = RouteTable::standard();

    match table.resolve(path) {
        Ok(address) => {
            if let Address::Room(id) = &address {
                assert!(!id.as_str().is_empty(), "resolved an empty room id");
                assert!(
                    !id.as_str().contains('/'),
                    "room id kept a separator: {:?}",
                    id
                );
            }
            let canonical = address.path();
            assert_eq!(
                table.resolve(&canonical),
                Ok(address),
                "canonical path {:?} did not round-trip",
                canonical
            );
        }
        Err(RouteError::UnknownPath(reported)) => {
            assert_eq!(reported, path, "UnknownPath rewrote the input");
        }
        Err(RouteError::EmptyRoomId) => {
            assert!(
                path.starts_with("/room/"),
                "EmptyRoomId outside the /room/ pattern: {:?}",
                path
            );
        }
    }
});
