//! Focus System - Which output node holds input focus.
//!
//! Focus is per thread and tracked by node id in a `spark-signals` signal, so
//! hosts can observe it with an effect:
//!
//! ```ignore
//! use spark_bind::state::focus;
//!
//! focus::focus(input.id());
//! let stop = effect(|| println!("focused: {:?}", focus::focused_node()));
//! ```
//!
//! The reconciler reads this state before replacing a node: if the old node
//! contained focus, the replacement receives it after the swap.

use std::cell::RefCell;
use std::collections::HashMap;

use spark_signals::{signal, Signal};

use crate::primitives::NodeId;

// =============================================================================
// FOCUSED NODE SIGNAL
// =============================================================================

thread_local! {
    static FOCUSED_NODE: Signal<Option<NodeId>> = signal(None);
}

/// Currently focused node, if any.
pub fn focused_node() -> Option<NodeId> {
    FOCUSED_NODE.with(|s| s.get())
}

/// Check if any node is focused
pub fn has_focus() -> bool {
    focused_node().is_some()
}

/// Check if a specific node is focused
pub fn is_focused(id: NodeId) -> bool {
    focused_node() == Some(id)
}

// =============================================================================
// FOCUS CALLBACKS
// =============================================================================

/// Callbacks fired when focus enters or leaves a node
#[derive(Default)]
pub struct FocusCallbacks {
    pub on_focus: Option<Box<dyn Fn()>>,
    pub on_blur: Option<Box<dyn Fn()>>,
}

thread_local! {
    static FOCUS_CALLBACK_REGISTRY: RefCell<HashMap<NodeId, Vec<FocusCallbacks>>> =
        RefCell::new(HashMap::new());
}

/// Register focus callbacks for a node.
/// Returns cleanup function to unregister.
pub fn register_callbacks(id: NodeId, callbacks: FocusCallbacks) -> impl FnOnce() {
    let slot = FOCUS_CALLBACK_REGISTRY.with(|reg| {
        let mut reg = reg.borrow_mut();
        let list = reg.entry(id).or_default();
        list.push(callbacks);
        list.len() - 1
    });

    move || {
        FOCUS_CALLBACK_REGISTRY.with(|reg| {
            let mut reg = reg.borrow_mut();
            if let Some(list) = reg.get_mut(&id) {
                if let Some(entry) = list.get_mut(slot) {
                    entry.on_focus = None;
                    entry.on_blur = None;
                }
                if list.iter().all(|cb| cb.on_focus.is_none() && cb.on_blur.is_none()) {
                    reg.remove(&id);
                }
            }
        });
    }
}

fn fire(id: NodeId, pick: impl Fn(&FocusCallbacks) -> Option<&Box<dyn Fn()>>) {
    FOCUS_CALLBACK_REGISTRY.with(|reg| {
        let reg = reg.borrow();
        for callback in reg.get(&id).into_iter().flatten().filter_map(&pick) {
            callback();
        }
    });
}

/// Set focus and fire callbacks at the source
fn set_focus_with_callbacks(next: Option<NodeId>) {
    let previous = focused_node();
    if previous == next {
        return;
    }

    if let Some(id) = previous {
        fire(id, |cb| cb.on_blur.as_ref());
    }

    FOCUSED_NODE.with(|s| s.set(next));

    if let Some(id) = next {
        fire(id, |cb| cb.on_focus.as_ref());
    }
}

// =============================================================================
// FOCUS API
// =============================================================================

/// Move focus to a node.
pub fn focus(id: NodeId) {
    set_focus_with_callbacks(Some(id));
}

/// Clear focus.
pub fn blur() {
    set_focus_with_callbacks(None);
}

/// Reset all focus state (for testing)
pub fn reset_focus_state() {
    set_focus_with_callbacks(None);
    FOCUS_CALLBACK_REGISTRY.with(|reg| reg.borrow_mut().clear());
}

// =============================================================================
// TESTS
// =============================================================================
