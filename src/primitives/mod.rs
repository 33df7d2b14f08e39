//! Primitives - Template input and live output building blocks.
//!
//! - [`template`] - Immutable static template tree (input)
//! - [`directives`] - Directive vocabulary and per-element classification
//! - [`node`] - Live output nodes (output)
//! - [`control_flow`] - Iteration entries and the loop cache
//!
//! # Topology
//!
//! Output mirrors the template 1:1 for plain nodes. A false conditional
//! becomes a placeholder comment (never an omission) so sibling indices stay
//! stable, and an iteration expands to zero or more sibling clones:
//!
//! ```text
//! template                      output
//! <ul>                          <ul>
//!   <li v-if="false"/>            <!--v-if-->
//!   <li v-for="n in 2">{{n}}      <li>1</li>
//! </ul>                           <li>2</li>
//!                               </ul>
//! ```

pub mod control_flow;
pub mod directives;
pub mod node;
pub mod template;

pub use control_flow::{iterate, LoopCache, LoopEntry, LoopKey};
pub use directives::{parse_for, Conditional, ElementDirectives, ForSpec};
pub use node::{Listener, Node, NodeFlags, NodeId, NodeKind, StaticPolicy};
pub use template::{TemplateAttr, TemplateElement, TemplateNode};
