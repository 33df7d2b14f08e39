//! Model - Declaration, storage and the concrete Handler.
//!
//! A [`ModelDefinition`] declares top-level variables, bound methods, watch
//! callbacks and lifecycle hooks. Validating it yields a [`Model`]: the owned
//! value tree, the [`ModelHandler`] that mutates it, and the root
//! [`Reactive`] surface everything else talks to.
//!
//! Every successful mutation bumps a revision signal, which is how the render
//! pipeline learns that the model changed.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use indexmap::IndexMap;
use spark_signals::{signal, Signal};
use tracing::trace;

use crate::engine::reactive::{Handler, Reactive};
use crate::error::{Error, Result};
use crate::types::{Callable, Path, Value};

/// Watch callback: `(new, old)`.
pub type Watcher = Rc<dyn Fn(&Value, &Value)>;

/// Lifecycle hook, called with the unit's reactive surface.
pub type Hook = Rc<dyn Fn(&Reactive)>;

// =============================================================================
// Definition
// =============================================================================

/// Declarative description of a unit's model.
///
/// ```ignore
/// let definition = ModelDefinition::new()
///     .data("count", 0)
///     .method("increment", |this, _| {
///         let next = this.get("count").to_number() + 1.0;
///         let _ = this.write("count", next);
///         Value::Undefined
///     })
///     .watch("count", |new, old| println!("{old:?} -> {new:?}"));
/// ```
#[derive(Clone, Default)]
pub struct ModelDefinition {
    data: IndexMap<String, Value>,
    methods: IndexMap<String, Callable>,
    watchers: HashMap<String, Vec<Watcher>>,
    created: Option<Hook>,
    updated: Option<Hook>,
}

impl ModelDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare every top-level key of a JSON object as a variable.
    ///
    /// A non-object document declares nothing.
    pub fn from_json(json: serde_json::Value) -> Self {
        let mut definition = Self::new();
        if let Value::Object(map) = Value::from(json) {
            definition.data.extend(map);
        }
        definition
    }

    /// Declare a variable with its initial value.
    pub fn data(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.data.insert(name.to_string(), value.into());
        self
    }

    /// Declare a bound method.
    pub fn method(
        mut self,
        name: &str,
        func: impl Fn(&Reactive, &[Value]) -> Value + 'static,
    ) -> Self {
        self.methods.insert(name.to_string(), Callable::new(name, func));
        self
    }

    /// Register a callback for writes whose path is exactly `name`.
    pub fn watch(mut self, name: &str, callback: impl Fn(&Value, &Value) + 'static) -> Self {
        self.watchers
            .entry(name.to_string())
            .or_default()
            .push(Rc::new(callback));
        self
    }

    /// Hook fired once, right after the first successful render.
    pub fn on_created(mut self, hook: impl Fn(&Reactive) + 'static) -> Self {
        self.created = Some(Rc::new(hook));
        self
    }

    /// Hook fired before every render after the first.
    pub fn on_updated(mut self, hook: impl Fn(&Reactive) + 'static) -> Self {
        self.updated = Some(Rc::new(hook));
        self
    }

    /// Check the declaration rules:
    /// - every top-level name matches `[A-Za-z0-9_]+`
    /// - no name is both a variable and a method
    pub fn validate(&self) -> Result<()> {
        for name in self.data.keys().chain(self.methods.keys()) {
            if !is_model_key(name) {
                return Err(Error::invalid_declaration(
                    name,
                    "top-level names must match [A-Za-z0-9_]+",
                ));
            }
        }
        if let Some(name) = self.methods.keys().find(|name| self.data.contains_key(*name)) {
            return Err(Error::invalid_declaration(
                name,
                "declared both as a variable and as a method",
            ));
        }
        Ok(())
    }
}

/// `[A-Za-z0-9_]+`
pub fn is_model_key(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// =============================================================================
// Handler
// =============================================================================

/// Handler over an owned value tree.
///
/// Path segments address object keys and array indices; writing at index
/// `len` appends to an array.
pub struct ModelHandler {
    store: RefCell<Value>,
    revision: Signal<u64>,
    watchers: HashMap<String, Vec<Watcher>>,
}

impl ModelHandler {
    fn new(root: Value, watchers: HashMap<String, Vec<Watcher>>) -> Self {
        Self {
            store: RefCell::new(root),
            revision: signal(0),
            watchers,
        }
    }

    /// Copy of the entire model.
    pub fn snapshot(&self) -> Value {
        self.store.borrow().clone()
    }

    /// Revision signal, bumped after every successful mutation.
    pub fn revision(&self) -> Signal<u64> {
        self.revision.clone()
    }

    fn bump(&self) {
        let next = self.revision.get().wrapping_add(1);
        self.revision.set(next);
    }

    fn fire_watchers(&self, path: &Path, new: &Value, old: &Value) {
        if path.len() != 1 {
            return;
        }
        let Some(callbacks) = path.first().and_then(|key| self.watchers.get(key)) else {
            return;
        };
        for callback in callbacks {
            callback(new, old);
        }
    }
}

/// Walk to the container addressed by `parents`.
fn container_mut<'a>(
    root: &'a mut Value,
    full: &Path,
    parents: &[String],
) -> Result<&'a mut Value> {
    let mut current = root;
    for segment in parents {
        current = match current.get_mut(segment) {
            Some(next) if matches!(next, Value::Object(_) | Value::Array(_)) => next,
            _ => return Err(Error::invalid_path(full, segment.clone())),
        };
    }
    Ok(current)
}

impl Handler for ModelHandler {
    fn read(&self, path: &Path) -> Value {
        self.store
            .borrow()
            .get_path(path)
            .cloned()
            .unwrap_or_default()
    }

    fn write(&self, path: &Path, value: Value) -> Result<bool> {
        let Some((last, parents)) = path.split_last() else {
            return Err(Error::invalid_path(path, ""));
        };

        let old = {
            let mut store = self.store.borrow_mut();
            let parent = container_mut(&mut store, path, parents)?;
            match parent {
                Value::Object(map) => {
                    map.insert(last.to_string(), value.clone()).unwrap_or_default()
                }
                Value::Array(items) => match last.parse::<usize>() {
                    Ok(index) if index < items.len() => {
                        std::mem::replace(&mut items[index], value.clone())
                    }
                    Ok(index) if index == items.len() => {
                        items.push(value.clone());
                        Value::Undefined
                    }
                    _ => return Err(Error::invalid_path(path, last)),
                },
                _ => return Err(Error::invalid_path(path, last)),
            }
        };

        trace!(path = %path, "model write");
        self.bump();
        self.fire_watchers(path, &value, &old);
        Ok(true)
    }

    fn erase(&self, path: &Path) -> Result<bool> {
        let Some((last, parents)) = path.split_last() else {
            return Err(Error::invalid_path(path, ""));
        };

        let removed = {
            let mut store = self.store.borrow_mut();
            let parent = container_mut(&mut store, path, parents)?;
            match parent {
                Value::Object(map) => map.shift_remove(last),
                Value::Array(items) => match last.parse::<usize>() {
                    Ok(index) if index < items.len() => Some(items.remove(index)),
                    _ => None,
                },
                _ => None,
            }
        };

        let Some(old) = removed else {
            return Ok(false);
        };
        trace!(path = %path, "model erase");
        self.bump();
        self.fire_watchers(path, &Value::Undefined, &old);
        Ok(true)
    }
}

// =============================================================================
// Model
// =============================================================================

/// Validated model of one unit.
pub struct Model {
    handler: Rc<ModelHandler>,
    surface: Reactive,
    keys: Rc<HashSet<String>>,
    created: Option<Hook>,
    updated: Option<Hook>,
}

impl Model {
    /// Validate a definition and build the store.
    pub fn new(definition: ModelDefinition) -> Result<Self> {
        definition.validate()?;

        let ModelDefinition {
            data,
            methods,
            watchers,
            created,
            updated,
        } = definition;

        let mut root = data;
        for (name, method) in methods {
            root.insert(name, Value::Function(method));
        }
        let keys: HashSet<String> = root.keys().cloned().collect();

        let handler = Rc::new(ModelHandler::new(Value::Object(root), watchers));
        let surface = Reactive::new(handler.clone());

        Ok(Self {
            handler,
            surface,
            keys: Rc::new(keys),
            created,
            updated,
        })
    }

    /// Root reactive surface.
    pub fn surface(&self) -> &Reactive {
        &self.surface
    }

    /// Declared top-level names (variables and methods).
    pub fn keys(&self) -> &Rc<HashSet<String>> {
        &self.keys
    }

    pub fn has_key(&self, name: &str) -> bool {
        self.keys.contains(name)
    }

    pub fn revision(&self) -> Signal<u64> {
        self.handler.revision()
    }

    pub fn snapshot(&self) -> Value {
        self.handler.snapshot()
    }

    pub(crate) fn created_hook(&self) -> Option<&Hook> {
        self.created.as_ref()
    }

    pub(crate) fn updated_hook(&self) -> Option<&Hook> {
        self.updated.as_ref()
    }
}

// =============================================================================
// Tests
// =============================================================================
