//! Events dispatched on output nodes.
//!
//! Hosts (or tests) simulate interaction by dispatching an [`Event`] on a
//! node; listeners installed by event and two-way bindings receive it.
//!
//! ```ignore
//! button.dispatch(&Event::new("click"));
//! input.input("xyz");       // sets the value field, then dispatches "input"
//! checkbox.toggle(true);    // sets the checked field, then dispatches "change"
//! ```

use crate::types::{Object, Value};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Event {
    /// Event name without the `on` prefix (`click`, `input`, `change`).
    pub kind: String,
    /// Value field of the target at dispatch time.
    pub value: Option<String>,
    /// Checked field of the target at dispatch time.
    pub checked: Option<bool>,
}

impl Event {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_checked(mut self, checked: bool) -> Self {
        self.checked = Some(checked);
        self
    }

    /// Expression-visible form, bound as `$event`.
    pub fn to_value(&self) -> Value {
        let mut map = Object::new();
        map.insert("type".to_string(), Value::from(self.kind.as_str()));
        if let Some(value) = &self.value {
            map.insert("value".to_string(), Value::from(value.as_str()));
        }
        if let Some(checked) = self.checked {
            map.insert("checked".to_string(), Value::Bool(checked));
        }
        Value::Object(map)
    }
}
