//! Diagnostics - Non-fatal problems found while rendering.
//!
//! Expression errors, unknown directives and rejected write-backs never stop
//! a render. Each one is emitted through `tracing` and recorded in a bounded
//! history owned by the unit, so hosts and tests can inspect what went wrong.
//!
//! # Example
//!
//! ```ignore
//! let diagnostics = Diagnostics::new(64);
//! diagnostics.report(DiagnosticKind::Reference, "`missing` is not defined", "missing + 1");
//! assert_eq!(diagnostics.count(DiagnosticKind::Reference), 1);
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use tracing::warn;

/// Category of a recorded diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// Identifier is neither a local nor a model key.
    Reference,
    /// Malformed expression or directive value.
    Syntax,
    /// Operation applied to a value that does not support it.
    Type,
    /// Directive name outside the recognized vocabulary.
    UnknownDirective,
    /// Write-back through a missing intermediate.
    InvalidPath,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::Reference => "reference",
            DiagnosticKind::Syntax => "syntax",
            DiagnosticKind::Type => "type",
            DiagnosticKind::UnknownDirective => "unknown-directive",
            DiagnosticKind::InvalidPath => "invalid-path",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    /// Expression or attribute text the diagnostic is about.
    pub source: String,
}

/// Shared, bounded diagnostic history.
///
/// Clones share the same history. Once `capacity` entries are held the oldest
/// is discarded.
#[derive(Clone)]
pub struct Diagnostics {
    entries: Rc<RefCell<VecDeque<Diagnostic>>>,
    capacity: usize,
}

impl Diagnostics {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Rc::new(RefCell::new(VecDeque::with_capacity(capacity.min(64)))),
            capacity: capacity.max(1),
        }
    }

    /// Emit and record one diagnostic.
    pub fn report(
        &self,
        kind: DiagnosticKind,
        message: impl Into<String>,
        source: impl Into<String>,
    ) {
        let diagnostic = Diagnostic {
            kind,
            message: message.into(),
            source: source.into(),
        };
        warn!(
            kind = %diagnostic.kind,
            source = %diagnostic.source,
            "{}",
            diagnostic.message
        );

        let mut entries = self.entries.borrow_mut();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(diagnostic);
    }

    /// Recorded diagnostics, oldest first.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.borrow().iter().cloned().collect()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.borrow().iter().filter(|d| d.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(256)
    }
}
