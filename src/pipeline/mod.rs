//! Render Pipeline
//!
//! Connects model mutations to output-tree updates.
//!
//! # Pipeline Architecture
//!
//! ```text
//! Reactive write ─▶ revision signal ─▶ effect ─▶ Scheduler (debounce)
//!                                                    │ tick / flush / unlock
//!                                                    ▼
//!                      Renderer (fresh tree) ─▶ Reconciler (patch live tree)
//! ```
//!
//! ## Key Design Principles
//!
//! - **Synchronous model**: reads after a write see the write immediately;
//!   only the output tree lags, by at most one debounce window.
//! - **One effect per unit**: it notifies the scheduler and nothing else.
//! - **Host-driven**: renders run only from `tick`, `flush` or `unlock`.

pub mod mount;
pub mod scheduler;

pub use mount::{mount, mount_with_parent, Unit};
pub use scheduler::{Scheduler, SchedulerState};
