//! State Module - Runtime state around a mounted unit
//!
//! - **Diagnostics** - Bounded history of non-fatal render problems
//! - **Events** - Event payloads dispatched on output nodes
//! - **Focus** - Focused-node signal and focus callbacks

pub mod diagnostics;
pub mod events;
pub mod focus;

pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use events::Event;
pub use focus::{
    blur, focus, focused_node, has_focus, is_focused, register_callbacks, reset_focus_state,
    FocusCallbacks,
};
