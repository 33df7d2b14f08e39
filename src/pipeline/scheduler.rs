//! Render Scheduler - Debounced render sequencing.
//!
//! ```text
//!            notify                      deadline reached
//!   Idle ───────────────► DirtyPending ───────────────────► Rendering
//!    ▲                     │   ▲ notify (restart timer)         │
//!    │                     │   └──────┘                         │
//!    │        lock         ▼                                    │
//!    │               ┌── Locked ◄── notify (remember dirty)     │
//!    │    unlock     │                                          │
//!    │  (dirty: one  └──────────────► Rendering                 │
//!    │  immediate render)                                       │
//!    └──────────────────────────────────────────────────────────┘
//!                 finish (dirty again? back to DirtyPending)
//! ```
//!
//! The scheduler is a pure state machine over caller-supplied instants; the
//! owning unit decides when to look at the clock.

use std::time::{Duration, Instant};

use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    DirtyPending,
    Rendering,
    Locked,
}

#[derive(Debug)]
pub struct Scheduler {
    debounce: Duration,
    deadline: Option<Instant>,
    dirty: bool,
    rendering: bool,
    lock_depth: usize,
}

impl Scheduler {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            deadline: None,
            dirty: false,
            rendering: false,
            lock_depth: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.rendering {
            SchedulerState::Rendering
        } else if self.lock_depth > 0 {
            SchedulerState::Locked
        } else if self.deadline.is_some() {
            SchedulerState::DirtyPending
        } else {
            SchedulerState::Idle
        }
    }

    /// A mutation happened at `now`.
    ///
    /// Restarts the debounce timer, unless a render is running or the unit is
    /// locked, in which case the mutation is only remembered.
    pub fn notify(&mut self, now: Instant) {
        self.dirty = true;
        if self.rendering || self.lock_depth > 0 {
            trace!(state = ?self.state(), "mutation deferred");
            return;
        }
        self.deadline = Some(now + self.debounce);
        trace!("debounce timer restarted");
    }

    /// Enter the locked state. Locks nest.
    pub fn lock(&mut self) {
        self.lock_depth += 1;
        self.deadline = None;
    }

    /// Leave one lock level. Returns `true` when the outermost lock was
    /// released with mutations outstanding, meaning one render is due now.
    pub fn unlock(&mut self) -> bool {
        if self.lock_depth == 0 {
            return false;
        }
        self.lock_depth -= 1;
        self.lock_depth == 0 && self.dirty && !self.rendering
    }

    pub fn is_locked(&self) -> bool {
        self.lock_depth > 0
    }

    /// Whether a render has been requested but not yet run.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether the debounce timer has expired.
    pub fn is_due(&self, now: Instant) -> bool {
        !self.rendering && self.lock_depth == 0 && self.deadline.is_some_and(|at| now >= at)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn begin_render(&mut self) {
        self.rendering = true;
        self.dirty = false;
        self.deadline = None;
    }

    /// Mutations that arrived during the render start a fresh timer.
    pub fn finish_render(&mut self, now: Instant) {
        self.rendering = false;
        if self.dirty && self.lock_depth == 0 {
            self.deadline = Some(now + self.debounce);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
