//! Identifier allocation scoped to a single document.
//!
//! Element identifiers follow the `prefix_N` convention (`amdSec_3`,
//! `techMD_12`, ...). The allocator lives inside a [`crate::MetsDocument`],
//! never in process-global state, so two documents in the same process can
//! never hand out colliding identifiers.

use crate::error::{MetsError, Result};
use rand::RngExt;
use std::collections::HashMap;

/// Generates unique, sequential `prefix_N` identifiers.
///
/// Identifiers read from a parsed document are fed back through
/// [`IdAllocator::reserve`] so later allocations cannot collide with them.
/// An allocated identifier is never reused, even after the owning element
/// is removed from the document.
#[derive(Debug, Default, Clone)]
pub struct IdAllocator {
    counters: HashMap<String, u64>,
}

impl IdAllocator {
    /// Create an allocator with no reserved identifiers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next identifier for `prefix`.
    ///
    /// The first allocation for a prefix yields `prefix_1`.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the prefix is empty or contains
    /// whitespace or `_` (which would make reserved ids unparseable).
    pub fn allocate(&mut self, prefix: &str) -> Result<String> {
        if prefix.is_empty() || prefix.contains(|c: char| c.is_whitespace() || c == '_') {
            return Err(MetsError::InvalidArgument(format!(
                "invalid identifier prefix: {prefix:?}"
            )));
        }
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        *counter += 1;
        Ok(format!("{}_{}", prefix, counter))
    }

    /// Record an externally assigned identifier as used.
    ///
    /// Identifiers that do not match the `prefix_N` pattern are ignored;
    /// they cannot collide with anything this allocator produces.
    pub fn reserve(&mut self, id: &str) {
        let Some((prefix, count)) = id.rsplit_once('_') else {
            return;
        };
        let Ok(count) = count.parse::<u64>() else {
            return;
        };
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        *counter = (*counter).max(count);
    }
}

/// Generate a random RFC4122 v4 UUID in hyphenated lowercase form.
///
/// Used for `file/@ID` and `@GROUPID` values when an entry has no
/// caller-assigned identifier by the time the document is serialized.
pub fn generate_uuid() -> String {
    let mut bytes = [0u8; 16];
    let mut rng = rand::rng();
    rng.fill(&mut bytes);
    // RFC4122 v4
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    let mut out = String::with_capacity(36);
    for (i, byte) in bytes.iter().enumerate() {
        if matches!(i, 4 | 6 | 8 | 10) {
            out.push('-');
        }
        out.push(char::from_digit((byte >> 4) as u32, 16).unwrap_or('0'));
        out.push(char::from_digit((byte & 0x0f) as u32, 16).unwrap_or('0'));
    }
    out
}
