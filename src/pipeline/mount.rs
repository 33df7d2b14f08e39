//! Mount API - Unit lifecycle and the render effect.
//!
//! A unit owns one model and the output tree under one anchor. Mounting
//! renders synchronously once, then installs a single effect on the model's
//! revision signal. The effect never renders; it only notifies the
//! [`Scheduler`], and the host drives rendering by ticking.
//!
//! # Example
//!
//! ```ignore
//! use spark_bind::pipeline::mount;
//!
//! let anchor = Node::element("app");
//! let unit = mount(definition, template, &anchor, UnitConfig::default())?;
//!
//! unit.surface().write("count", 5)?;   // visible to reads immediately
//! unit.flush();                        // or tick() once the window elapses
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::thread;
use std::time::Instant;

use spark_signals::effect;
use tracing::debug;

use super::scheduler::{Scheduler, SchedulerState};
use crate::config::UnitConfig;
use crate::engine::{Model, ModelDefinition, Reactive};
use crate::error::Result;
use crate::expr::{Evaluator, Scope};
use crate::primitives::{Node, TemplateNode};
use crate::renderer::{ReconcileReport, Reconciler, Renderer};
use crate::state::diagnostics::Diagnostics;
use crate::types::Value;

// =============================================================================
// Unit
// =============================================================================

struct UnitInner {
    model: Model,
    template: TemplateNode,
    anchor: Node,
    renderer: Renderer,
    reconciler: Reconciler,
    scheduler: RefCell<Scheduler>,
    render_count: Cell<usize>,
    stop_effect: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl UnitInner {
    /// Initial render: output is attached directly under the anchor.
    fn first_render(&self) {
        let container = Node::element("template");
        self.renderer.begin_pass();
        self.renderer
            .render_into(&self.template, &Scope::new(), &container);
        for child in container.children() {
            self.anchor.append_child(child);
        }
        self.renderer.end_pass(&ReconcileReport::default());
        self.render_count.set(1);
        debug!(anchor = self.anchor.id(), "first render attached");
    }

    fn render(&self) {
        self.scheduler.borrow_mut().begin_render();

        if let Some(hook) = self.model.updated_hook().cloned() {
            hook(self.model.surface());
        }

        let container = Node::element("template");
        self.renderer.begin_pass();
        self.renderer
            .render_into(&self.template, &Scope::new(), &container);
        let report = self.reconciler.reconcile(&self.anchor, &container, true);
        self.renderer.end_pass(&report);

        let count = self.render_count.get() + 1;
        self.render_count.set(count);
        debug!(
            render = count,
            kept = report.kept.len(),
            replaced = report.replaced,
            "render reconciled"
        );

        self.scheduler.borrow_mut().finish_render(Instant::now());
    }
}

impl Drop for UnitInner {
    fn drop(&mut self) {
        if let Some(stop) = self.stop_effect.get_mut().take() {
            stop();
        }
    }
}

/// Handle to a mounted unit. Clones share the same unit.
#[derive(Clone)]
pub struct Unit {
    inner: Rc<UnitInner>,
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("anchor", &self.inner.anchor.id())
            .field("state", &self.state())
            .field("render_count", &self.render_count())
            .finish()
    }
}

impl Unit {
    /// Root reactive surface of this unit's model.
    pub fn surface(&self) -> &Reactive {
        self.inner.model.surface()
    }

    pub fn model(&self) -> &Model {
        &self.inner.model
    }

    /// Copy of the whole model.
    pub fn snapshot(&self) -> Value {
        self.inner.model.snapshot()
    }

    /// The externally owned node the output tree lives under.
    pub fn anchor(&self) -> &Node {
        &self.inner.anchor
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        self.inner.renderer.evaluator().diagnostics()
    }

    pub fn state(&self) -> SchedulerState {
        self.inner.scheduler.borrow().state()
    }

    /// When the pending render becomes due, if one is pending.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.inner.scheduler.borrow().deadline()
    }

    /// Renders executed so far, the first one included.
    pub fn render_count(&self) -> usize {
        self.inner.render_count.get()
    }

    /// Iteration outputs reused instead of rebuilt.
    pub fn loop_cache_hits(&self) -> usize {
        self.inner.renderer.loop_hits()
    }

    // -------------------------------------------------------------------------
    // driving
    // -------------------------------------------------------------------------

    /// Render if the debounce window has elapsed. Returns whether a render ran.
    pub fn tick(&self) -> bool {
        self.tick_at(Instant::now())
    }

    /// [`tick`](Self::tick) against an explicit clock reading.
    pub fn tick_at(&self, now: Instant) -> bool {
        let due = self.inner.scheduler.borrow().is_due(now);
        if due {
            self.inner.render();
        }
        due
    }

    /// Render now if anything is pending, skipping the rest of the window.
    pub fn flush(&self) -> bool {
        let pending = self.state() == SchedulerState::DirtyPending;
        if pending {
            self.inner.render();
        }
        pending
    }

    /// Sleep until the pending render is due, then run it.
    pub fn settle(&self) -> bool {
        let Some(deadline) = self.next_deadline() else {
            return false;
        };
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        }
        self.tick()
    }

    /// Suspend rendering. Mutations are remembered until [`unlock`](Self::unlock).
    pub fn lock(&self) {
        self.inner.scheduler.borrow_mut().lock();
    }

    /// Release one lock level; a dirty unit renders immediately.
    pub fn unlock(&self) -> bool {
        let render_now = self.inner.scheduler.borrow_mut().unlock();
        if render_now {
            self.inner.render();
        }
        render_now
    }

    /// Run `f` against the surface with rendering locked, then render once
    /// if it changed anything.
    pub fn batch<R>(&self, f: impl FnOnce(&Reactive) -> R) -> R {
        self.lock();
        let result = f(self.surface());
        self.unlock();
        result
    }
}

// =============================================================================
// Mount Functions
// =============================================================================

/// Mount a unit under `anchor`.
///
/// The first render is synchronous; the creation hook fires right after it.
pub fn mount(
    definition: ModelDefinition,
    template: TemplateNode,
    anchor: &Node,
    config: UnitConfig,
) -> Result<Unit> {
    mount_unit(definition, template, anchor, config, None)
}

/// Mount a unit whose expressions may reach `parent` through `$parent`.
///
/// The child also re-renders when the parent's model changes, so `$parent`
/// reads stay current.
pub fn mount_with_parent(
    definition: ModelDefinition,
    template: TemplateNode,
    anchor: &Node,
    config: UnitConfig,
    parent: &Unit,
) -> Result<Unit> {
    mount_unit(definition, template, anchor, config, Some(parent))
}

fn mount_unit(
    definition: ModelDefinition,
    template: TemplateNode,
    anchor: &Node,
    config: UnitConfig,
    parent: Option<&Unit>,
) -> Result<Unit> {
    let model = Model::new(definition)?;

    let mut evaluator = Evaluator::new(
        model.surface().clone(),
        model.keys().clone(),
        Diagnostics::new(config.diagnostic_capacity),
    );
    if let Some(parent) = parent {
        evaluator = evaluator.with_parent(parent.surface().clone());
    }

    let unit = Unit {
        inner: Rc::new(UnitInner {
            model,
            template,
            anchor: anchor.clone(),
            renderer: Renderer::new(evaluator, config.loop_memo),
            reconciler: Reconciler::new(config.child_count_tolerance),
            scheduler: RefCell::new(Scheduler::new(config.debounce())),
            render_count: Cell::new(0),
            stop_effect: RefCell::new(None),
        }),
    };

    unit.inner.first_render();

    // The ONE effect: every revision bump becomes a scheduler notification
    let revision = unit.inner.model.revision();
    let parent_revision = parent.map(|parent| parent.model().revision());
    let weak: Weak<UnitInner> = Rc::downgrade(&unit.inner);
    let mut primed = false;
    let stop = effect(move || {
        let _ = revision.get();
        if let Some(parent_revision) = &parent_revision {
            let _ = parent_revision.get();
        }
        if !primed {
            primed = true;
            return;
        }
        if let Some(inner) = weak.upgrade() {
            inner.scheduler.borrow_mut().notify(Instant::now());
        }
    });
    *unit.inner.stop_effect.borrow_mut() = Some(Box::new(stop));

    if let Some(hook) = unit.inner.model.created_hook().cloned() {
        hook(unit.surface());
    }

    Ok(unit)
}

// =============================================================================
// Tests
// =============================================================================
