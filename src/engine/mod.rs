//! Engine - Model storage, reactive interception and the unit registry.
//!
//! - [`reactive`] - Path-qualified read/write/erase capability over a model
//! - [`model`] - Model declaration, validation and the concrete Handler
//! - [`registry`] - Component definitions and live unit instances
//!
//! # Architecture
//!
//! ```text
//! ModelDefinition ──validate──▶ Model ──owns──▶ ModelHandler (value tree + revision signal)
//!                                  │
//!                                  └──▶ Reactive (root surface) ──"key"──▶ Reactive(key) ...
//! ```
//!
//! Everything above the engine (evaluator, renderer, scheduler) reads and
//! writes the model exclusively through [`Reactive`].

mod model;
mod reactive;
mod registry;

pub use model::*;
pub use reactive::*;
pub use registry::*;
