//! Deterministic hashes used for reconciliation identity and loop reuse.
//!
//! All three hashes walk the [`Value`] tree directly. Every variant carries
//! its own tag and numbers hash by bit pattern, so `undefined`, `null`,
//! `NaN` and the infinities stay distinct.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::expr::Scope;
use crate::types::Value;

fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    std::mem::discriminant(value).hash(state);
    match value {
        Value::Undefined | Value::Null => {}
        Value::Bool(b) => b.hash(state),
        Value::Number(n) => n.to_bits().hash(state),
        Value::String(s) => s.hash(state),
        Value::Array(items) => {
            items.len().hash(state);
            for item in items {
                hash_value(item, state);
            }
        }
        Value::Object(map) => {
            map.len().hash(state);
            for (key, item) in map {
                key.hash(state);
                hash_value(item, state);
            }
        }
        Value::Function(func) => func.name().hash(state),
        Value::Opaque(opaque) => opaque.type_name().hash(state),
    }
}

/// Public locals in declaration order.
fn hash_public_scope<H: Hasher>(scope: &Scope, state: &mut H) {
    for (name, value) in scope.public() {
        name.hash(state);
        hash_value(value, state);
    }
}

/// Signature over bound listener sources plus the active public scope.
///
/// Two nodes whose bindings differ only in source text, or that were
/// rendered under different loop variables, never share a signature.
pub fn event_signature<'a>(sources: impl IntoIterator<Item = &'a str>, scope: &Scope) -> u64 {
    let mut hasher = DefaultHasher::new();
    for source in sources {
        source.hash(&mut hasher);
    }
    hash_public_scope(scope, &mut hasher);
    hasher.finish()
}

/// Hash of the outer scope a loop site renders under.
pub fn scope_hash(scope: &Scope) -> u64 {
    let mut hasher = DefaultHasher::new();
    hash_public_scope(scope, &mut hasher);
    hasher.finish()
}

/// Content checksum of an evaluated collection.
pub fn content_checksum(value: &Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    hash_value(value, &mut hasher);
    hasher.finish()
}
