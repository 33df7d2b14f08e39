//! # spark-bind
//!
//! Reactive template binding for Rust.
//!
//! Built on [spark-signals](https://github.com/RLabs-Inc/spark-signals) for
//! change notification.
//!
//! ## Architecture
//!
//! A unit binds one mutable, nested data model to one pre-parsed static
//! template and keeps a live output tree in sync with it. Model access goes
//! through an explicit read/write/erase capability ([`Reactive`]) that turns
//! every mutation into a path-qualified notification:
//!
//! ```text
//! Reactive write → revision signal → Scheduler → Renderer → Reconciler → live tree
//! ```
//!
//! The reconciler patches the live tree in place, so nodes keep their
//! identity, focus and listeners across renders.
//!
//! ## Modules
//!
//! - [`types`] - Dynamic values and model paths
//! - [`engine`] - Model store, reactive wrapper, component registry
//! - [`expr`] - Embedded expression language
//! - [`primitives`] - Template and output nodes, directives, loop cache
//! - [`renderer`] - Template renderer, tree reconciler, inspector
//! - [`pipeline`] - Render scheduler and unit mounting
//! - [`state`] - Diagnostics, events, focus

pub mod config;
pub mod engine;
pub mod error;
pub mod expr;
pub mod pipeline;
pub mod primitives;
pub mod renderer;
pub mod state;
pub mod types;

// Re-export commonly used items
pub use types::*;

pub use config::UnitConfig;
pub use error::{Error, Result};

pub use engine::{Model, ModelDefinition, Reactive, Registry};

pub use expr::{Evaluator, Mode, Scope};

pub use pipeline::{mount, mount_with_parent, SchedulerState, Unit};

pub use primitives::{
    Node, NodeFlags, NodeId, NodeKind, StaticPolicy, TemplateAttr, TemplateElement, TemplateNode,
};

pub use renderer::{inspect, inspect_plain, Reconciler, Renderer};

pub use state::{
    // Diagnostics
    Diagnostic, DiagnosticKind, Diagnostics,
    // Events
    Event,
    // Focus
    blur, focus, focused_node, has_focus, is_focused, register_callbacks, reset_focus_state,
    FocusCallbacks,
};
