//! Reactive Wrapper - Path-qualified interception over the model.
//!
//! A [`Reactive`] is an explicit read/write/erase capability over one model
//! subtree. Every operation is forwarded to a [`Handler`] with the absolute
//! path from the model root, so observers see exactly which location changed.
//!
//! # Wrapper memo
//!
//! Each wrapper keeps a table of child wrappers keyed by property name, built
//! lazily on first traversal into a plain object:
//!
//! ```text
//! root ──"obj"──▶ Reactive(obj) ──"sub"──▶ Reactive(obj.sub)
//! ```
//!
//! At most one wrapper exists per path. A child wrapper is dropped as soon as
//! a scalar is written over it or it is erased.
//!
//! # Write classification
//!
//! - **Scalar** (primitive, null, sequence, callable, opaque): the child wrapper
//!   is dropped and the Handler is called unless the stored value already
//!   equals the new one.
//! - **Plain object**: every own key is written through the child wrapper
//!   (one notification per leaf) and then the whole object is written once at
//!   the parent path.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::error::{Error, Result};
use crate::types::{Path, Value};

// =============================================================================
// Handler contract
// =============================================================================

/// Receiver of path-qualified model operations.
///
/// The handler owns (or references) the model root; every call carries the
/// absolute path from that root.
pub trait Handler {
    /// Current value at `path` (`Undefined` when absent).
    fn read(&self, path: &Path) -> Value;

    /// Store `value` at `path`.
    ///
    /// Fails with [`Error::InvalidPath`] when an intermediate segment is missing.
    fn write(&self, path: &Path, value: Value) -> Result<bool>;

    /// Remove the value at `path`. Returns whether something was removed.
    fn erase(&self, path: &Path) -> Result<bool>;
}

// =============================================================================
// Access
// =============================================================================

/// Result of reading one property through a wrapper.
#[derive(Clone)]
pub enum Access {
    /// A scalar returned verbatim.
    Value(Value),
    /// A plain object, handed out as its (cached) child wrapper.
    Nested(Reactive),
}

impl Access {
    /// Materialize into a plain value (reads the subtree for nested access).
    pub fn into_value(self) -> Value {
        match self {
            Access::Value(value) => value,
            Access::Nested(reactive) => reactive.value(),
        }
    }

    pub fn as_nested(&self) -> Option<&Reactive> {
        match self {
            Access::Nested(reactive) => Some(reactive),
            Access::Value(_) => None,
        }
    }
}

// =============================================================================
// Reactive
// =============================================================================

struct ReactiveNode {
    handler: Rc<dyn Handler>,
    path: Path,
    parent: Weak<ReactiveNode>,
    children: RefCell<HashMap<String, Rc<ReactiveNode>>>,
}

/// Live handle over one model subtree.
///
/// Cloning is cheap and yields a handle to the same wrapper.
#[derive(Clone)]
pub struct Reactive {
    node: Rc<ReactiveNode>,
}

impl Reactive {
    /// Create the root wrapper over a handler.
    pub fn new(handler: Rc<dyn Handler>) -> Self {
        Self {
            node: Rc::new(ReactiveNode {
                handler,
                path: Path::root(),
                parent: Weak::new(),
                children: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// Absolute path of this wrapper, fixed at construction.
    pub fn path(&self) -> &Path {
        &self.node.path
    }

    /// Property name under the parent (`None` for the root).
    pub fn key(&self) -> Option<&str> {
        self.node.path.last()
    }

    /// Parent wrapper, if it is still alive.
    pub fn parent(&self) -> Option<Reactive> {
        self.node.parent.upgrade().map(|node| Reactive { node })
    }

    pub fn handler(&self) -> &Rc<dyn Handler> {
        &self.node.handler
    }

    /// Identity comparison of two handles.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.node, &b.node)
    }

    /// Whole value of this subtree.
    pub fn value(&self) -> Value {
        self.node.handler.read(&self.node.path)
    }

    /// Whether a child wrapper is currently cached for `prop`.
    pub fn is_cached(&self, prop: &str) -> bool {
        self.node.children.borrow().contains_key(prop)
    }

    /// Number of cached child wrappers.
    pub fn cached_count(&self) -> usize {
        self.node.children.borrow().len()
    }

    // -------------------------------------------------------------------------
    // read
    // -------------------------------------------------------------------------

    /// Read one property.
    ///
    /// A cached child wrapper is returned as-is. Otherwise the Handler is
    /// asked; a plain object result creates (and caches) its child wrapper.
    pub fn read(&self, prop: &str) -> Access {
        if let Some(child) = self.node.children.borrow().get(prop) {
            return Access::Nested(Reactive { node: child.clone() });
        }

        let value = self.node.handler.read(&self.node.path.child(prop));
        if value.is_plain_object() {
            Access::Nested(self.ensure_child(prop))
        } else {
            Access::Value(value)
        }
    }

    /// Read one property as a plain value.
    pub fn get(&self, prop: &str) -> Value {
        self.read(prop).into_value()
    }

    /// Read a path relative to this wrapper.
    pub fn read_path(&self, path: &Path) -> Value {
        self.node.handler.read(&self.node.path.join(path))
    }

    // -------------------------------------------------------------------------
    // write
    // -------------------------------------------------------------------------

    /// Write one property.
    ///
    /// Returns `Ok(false)` when a scalar write was suppressed because the
    /// stored value is already equal.
    pub fn write(&self, prop: &str, value: impl Into<Value>) -> Result<bool> {
        let value = value.into();
        let target = self.node.path.child(prop);

        let Value::Object(fields) = &value else {
            self.drop_child(prop);
            if self.node.handler.read(&target) == value {
                trace!(path = %target, "write suppressed, value unchanged");
                return Ok(false);
            }
            return self.node.handler.write(&target, value);
        };

        // Seed the container so leaf writes have somewhere to land
        if !self.node.handler.read(&target).is_plain_object() {
            self.node.handler.write(&target, Value::object())?;
        }

        let child = self.ensure_child(prop);
        for (key, field) in fields {
            child.write(key, field.clone())?;
        }
        child.retain_children(|key| fields.contains_key(key));

        self.node.handler.write(&target, value)
    }

    /// Write a path relative to this wrapper.
    ///
    /// Wrappers are followed as far as they exist. Sequences are never
    /// wrapped, so a path through an array element continues directly against
    /// the Handler (with the same no-op suppression).
    pub fn write_path(&self, path: &Path, value: impl Into<Value>) -> Result<bool> {
        let value = value.into();
        let Some((last, parents)) = path.split_last() else {
            return Err(Error::invalid_path(&self.node.path, ""));
        };

        let (owner, rest) = self.descend(path, parents)?;
        if rest.is_empty() {
            return owner.write(last, value);
        }

        let target = owner.node.path.join(&Path::from(rest)).child(last);
        if owner.node.handler.read(&target) == value {
            return Ok(false);
        }
        owner.node.handler.write(&target, value)
    }

    // -------------------------------------------------------------------------
    // erase
    // -------------------------------------------------------------------------

    /// Remove one property.
    pub fn erase(&self, prop: &str) -> Result<bool> {
        self.drop_child(prop);
        self.node.handler.erase(&self.node.path.child(prop))
    }

    /// Remove a path relative to this wrapper.
    pub fn erase_path(&self, path: &Path) -> Result<bool> {
        let Some((last, parents)) = path.split_last() else {
            return Err(Error::invalid_path(&self.node.path, ""));
        };

        let (owner, rest) = self.descend(path, parents)?;
        if rest.is_empty() {
            return owner.erase(last);
        }
        let target = owner.node.path.join(&Path::from(rest)).child(last);
        owner.node.handler.erase(&target)
    }

    // -------------------------------------------------------------------------
    // internals
    // -------------------------------------------------------------------------

    fn ensure_child(&self, prop: &str) -> Reactive {
        let mut children = self.node.children.borrow_mut();
        let child = children.entry(prop.to_string()).or_insert_with(|| {
            Rc::new(ReactiveNode {
                handler: self.node.handler.clone(),
                path: self.node.path.child(prop),
                parent: Rc::downgrade(&self.node),
                children: RefCell::new(HashMap::new()),
            })
        });
        Reactive { node: child.clone() }
    }

    fn drop_child(&self, prop: &str) {
        self.node.children.borrow_mut().remove(prop);
    }

    fn retain_children(&self, keep: impl Fn(&str) -> bool) {
        self.node.children.borrow_mut().retain(|key, _| keep(key));
    }

    /// Follow wrappers along `parents`.
    ///
    /// Returns the deepest wrapper reached plus the unwrapped remainder, which
    /// is non-empty only when a sequence interrupted the walk.
    fn descend(&self, full: &Path, parents: &[String]) -> Result<(Reactive, Vec<String>)> {
        let mut current = self.clone();
        for (depth, segment) in parents.iter().enumerate() {
            match current.read(segment) {
                Access::Nested(next) => current = next,
                Access::Value(Value::Array(_)) => {
                    return Ok((current, parents[depth..].to_vec()));
                }
                Access::Value(_) => {
                    return Err(Error::invalid_path(
                        &self.node.path.join(full),
                        segment.clone(),
                    ));
                }
            }
        }
        Ok((current, Vec::new()))
    }
}

impl std::fmt::Debug for Reactive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Reactive({})", self.node.path)
    }
}

// =============================================================================
// Tests
// =============================================================================
