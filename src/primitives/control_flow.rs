//! Control Flow - Iteration entries and the loop cache.
//!
//! # Iteration
//!
//! [`iterate`] turns an evaluated collection into loop entries, in natural
//! insertion order:
//!
//! | Collection  | `item`   | `index`   | `count`   | write-back segment |
//! |-------------|----------|-----------|-----------|--------------------|
//! | array       | element  | position  | position  | position           |
//! | object      | value    | key       | position  | key                |
//! | integer `n` | `1..=n`  | position  | position  | none               |
//!
//! `null`/`undefined` iterate as empty.
//!
//! # Loop cache
//!
//! Each loop site remembers a checksum of the collection it last rendered and
//! the roots it produced. When the checksum is unchanged the roots are reused
//! verbatim and the whole loop skips rendering and diffing.
//!
//! Entries are keyed by (template site, expression text, outer-scope hash),
//! so two sites sharing the same source text never collide, and nested loops
//! get one entry per outer iteration. Entries not visited during a pass are
//! swept at its end.

use std::collections::HashMap;

use tracing::trace;

use super::node::{Node, NodeId};
use crate::types::Value;

// =============================================================================
// Iteration
// =============================================================================

/// One loop iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopEntry {
    pub item: Value,
    pub index: Value,
    pub count: Value,
    /// Path segment of `item` under the collection, when it lives there.
    pub segment: Option<String>,
}

/// Enumerate a collection. Errors name the offending type.
pub fn iterate(collection: &Value) -> Result<Vec<LoopEntry>, String> {
    match collection {
        Value::Undefined | Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items
            .iter()
            .enumerate()
            .map(|(i, item)| LoopEntry {
                item: item.clone(),
                index: Value::from(i),
                count: Value::from(i),
                segment: Some(i.to_string()),
            })
            .collect()),
        Value::Object(map) => Ok(map
            .iter()
            .enumerate()
            .map(|(i, (key, value))| LoopEntry {
                item: value.clone(),
                index: Value::from(key.as_str()),
                count: Value::from(i),
                segment: Some(key.clone()),
            })
            .collect()),
        Value::Number(n) if n.fract() == 0.0 && *n >= 0.0 => Ok((0..*n as usize)
            .map(|i| LoopEntry {
                item: Value::from(i + 1),
                index: Value::from(i),
                count: Value::from(i),
                segment: None,
            })
            .collect()),
        other => Err(format!("cannot iterate over {}", other.type_of())),
    }
}

// =============================================================================
// Loop cache
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoopKey {
    pub site: usize,
    pub source: String,
    pub scope_hash: u64,
}

struct CacheEntry {
    checksum: u64,
    roots: Vec<Node>,
    pass: u64,
}

#[derive(Default)]
pub struct LoopCache {
    entries: HashMap<LoopKey, CacheEntry>,
    pass: u64,
    hits: usize,
}

impl LoopCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a render pass.
    pub fn begin_pass(&mut self) {
        self.pass += 1;
    }

    /// Reused roots, if this site rendered the same collection last time.
    pub fn lookup(&mut self, key: &LoopKey, checksum: u64) -> Option<Vec<Node>> {
        let entry = self.entries.get_mut(key)?;
        if entry.checksum != checksum {
            return None;
        }
        entry.pass = self.pass;
        self.hits += 1;
        trace!(source = %key.source, roots = entry.roots.len(), "loop cache hit");
        Some(entry.roots.clone())
    }

    pub fn store(&mut self, key: LoopKey, checksum: u64, roots: Vec<Node>) {
        self.entries.insert(
            key,
            CacheEntry {
                checksum,
                roots,
                pass: self.pass,
            },
        );
    }

    /// Drop entries not visited during the current pass. Returns how many.
    pub fn sweep(&mut self) -> usize {
        let pass = self.pass;
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.pass == pass);
        before - self.entries.len()
    }

    /// Point cached roots at the live nodes that absorbed them.
    pub fn remap(&mut self, kept: &HashMap<NodeId, Node>) {
        if kept.is_empty() {
            return;
        }
        for entry in self.entries.values_mut() {
            for root in &mut entry.roots {
                if let Some(live) = kept.get(&root.id()) {
                    *root = live.clone();
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reuses since creation.
    pub fn hits(&self) -> usize {
        self.hits
    }
}

// =============================================================================
// Tests
// =============================================================================
