use serde_json::{Map, Value};

use crate::entity::path;

/// Pre-context values of every path touched inside a context, in first-touch
/// order.
///
/// A path is not recorded again once it, or an ancestor of it, has been
/// recorded. Restoring walks the log backwards so a later ancestor entry is
/// undone before the earlier, more specific one beneath it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RollbackLog {
    entries: Vec<(String, Option<Value>)>,
}

impl RollbackLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Paths with a recorded pre-context value.
    pub fn paths(&self) -> Vec<&str> {
        self.entries.iter().map(|(p, _)| p.as_str()).collect()
    }

    pub(crate) fn record(&mut self, field_path: &str, value: Option<Value>) {
        let covered = self
            .entries
            .iter()
            .any(|(recorded, _)| recorded == field_path || path::is_ancestor(recorded, field_path));
        if !covered {
            self.entries.push((field_path.to_string(), value));
        }
    }

    /// Take over a joined child's log. Paths this log already covers keep
    /// their older values.
    pub fn merge(&mut self, child: RollbackLog) {
        for (field_path, value) in child.entries {
            self.record(&field_path, value);
        }
    }

    /// Put every recorded path back to its pre-context value.
    pub fn restore(self, fields: &mut Map<String, Value>) {
        for (field_path, value) in self.entries.into_iter().rev() {
            path::restore(fields, &field_path, value);
        }
    }
}
