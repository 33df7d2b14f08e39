//! Component Registry - Definitions and live unit instances.
//!
//! One registry is created at process start and passed by reference to
//! whatever mounts units. Entries are added when a component is defined or
//! instantiated and are never removed automatically.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use tracing::debug;

use crate::config::UnitConfig;
use crate::engine::ModelDefinition;
use crate::error::{Error, Result};
use crate::pipeline::{mount, mount_with_parent, Unit};
use crate::primitives::{Node, TemplateNode};

// =============================================================================
// Registry State
// =============================================================================

#[derive(Clone)]
struct Component {
    definition: ModelDefinition,
    template: TemplateNode,
    config: UnitConfig,
}

/// A live unit and the component it was instantiated from.
#[derive(Clone)]
pub struct Instance {
    pub id: String,
    pub component: String,
    pub unit: Unit,
}

#[derive(Default)]
pub struct Registry {
    components: RefCell<HashMap<String, Component>>,
    instances: RefCell<Vec<Instance>>,
    next_id: Cell<usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Definitions
    // =========================================================================

    /// Register a component. The model declaration is validated now so that a
    /// bad definition fails here rather than at first mount.
    ///
    /// Defining an existing name replaces it for future instances.
    pub fn define(
        &self,
        name: &str,
        definition: ModelDefinition,
        template: TemplateNode,
        config: UnitConfig,
    ) -> Result<()> {
        definition.validate()?;
        let previous = self.components.borrow_mut().insert(
            name.to_string(),
            Component {
                definition,
                template,
                config,
            },
        );
        if previous.is_some() {
            debug!(component = name, "component redefined");
        }
        Ok(())
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.components.borrow().contains_key(name)
    }

    /// Defined component names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.components.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    // =========================================================================
    // Instances
    // =========================================================================

    /// Mount a fresh unit of component `name` under `anchor`.
    ///
    /// With `parent`, the unit's expressions can read and write the parent's
    /// surface through `$parent`, and parent writes re-render the child.
    pub fn instantiate(&self, name: &str, anchor: &Node, parent: Option<&Unit>) -> Result<Unit> {
        let component = self
            .components
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownComponent {
                name: name.to_string(),
            })?;

        let Component {
            definition,
            template,
            config,
        } = component;
        let unit = match parent {
            Some(parent) => mount_with_parent(definition, template, anchor, config, parent)?,
            None => mount(definition, template, anchor, config)?,
        };

        let index = self.next_id.get();
        self.next_id.set(index + 1);
        let id = format!("{name}-{index}");
        debug!(component = name, id = %id, "unit instantiated");

        self.instances.borrow_mut().push(Instance {
            id,
            component: name.to_string(),
            unit: unit.clone(),
        });
        Ok(unit)
    }

    /// Every unit instantiated so far, in creation order.
    pub fn instances(&self) -> Vec<Instance> {
        self.instances.borrow().clone()
    }

    /// Look up a live unit by instance id.
    pub fn get(&self, id: &str) -> Option<Unit> {
        self.instances
            .borrow()
            .iter()
            .find(|instance| instance.id == id)
            .map(|instance| instance.unit.clone())
    }

    /// Number of live instances of component `name`.
    pub fn count_of(&self, name: &str) -> usize {
        self.instances
            .borrow()
            .iter()
            .filter(|instance| instance.component == name)
            .count()
    }
}

// =============================================================================
// Tests
// =============================================================================
