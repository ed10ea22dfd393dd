use serde_json::{Map, Value};

use super::path;
use crate::operation::{AtomicQueue, FieldChange};

/// Per-entity record of field values as they were at the last successful
/// persist, keyed by the outermost path touched since.
///
/// Whether a path is dirty is computed on demand by comparing the original
/// against the current in-memory value, so a rollback that restores the
/// old value makes the field clean again.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirtyTracker {
    originals: Vec<(String, Option<Value>)>,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the value at `field_path` before it is first modified.
    ///
    /// If a descendant of `field_path` was tracked earlier, its original is
    /// folded back into the ancestor's original and the descendant entry is
    /// dropped.
    pub fn track(&mut self, field_path: &str, fields: &Map<String, Value>) {
        if self
            .originals
            .iter()
            .any(|(tracked, _)| tracked == field_path || path::is_ancestor(tracked, field_path))
        {
            return;
        }

        let mut original = Map::new();
        if let Some(value) = path::get(fields, field_path) {
            original.insert(field_path.to_string(), value.clone());
        }
        for (tracked, value) in &self.originals {
            if path::is_ancestor(field_path, tracked) {
                path::restore(&mut original, tracked, value.clone());
            }
        }
        self.originals
            .retain(|(tracked, _)| !path::is_ancestor(field_path, tracked));
        self.originals
            .push((field_path.to_string(), original.shift_remove(field_path)));
    }

    /// Value of `field_path` at the last persist, if it has been modified since.
    /// `Some(None)` means the field did not exist.
    pub fn original(&self, field_path: &str) -> Option<Option<Value>> {
        for (tracked, value) in &self.originals {
            if tracked == field_path {
                return Some(value.clone());
            }
            if path::is_ancestor(tracked, field_path) {
                let relative = &field_path[tracked.len() + 1..];
                let mut scratch = Map::new();
                if let Some(value) = value {
                    scratch.insert("v".to_string(), value.clone());
                }
                return Some(path::get(&scratch, &format!("v.{}", relative)).cloned());
            }
        }
        None
    }

    /// Tracked paths whose current value differs from the original.
    pub fn changed_paths(&self, fields: &Map<String, Value>) -> Vec<String> {
        self.originals
            .iter()
            .filter(|(tracked, original)| path::get(fields, tracked) != original.as_ref())
            .map(|(tracked, _)| tracked.clone())
            .collect()
    }

    pub fn is_changed(&self, fields: &Map<String, Value>) -> bool {
        !self.changed_paths(fields).is_empty()
    }

    /// `path -> [old, new]` for every changed path.
    pub fn changes(&self, fields: &Map<String, Value>) -> Map<String, Value> {
        self.originals
            .iter()
            .filter_map(|(tracked, original)| {
                let current = path::get(fields, tracked);
                (current != original.as_ref()).then(|| {
                    let pair = Value::Array(vec![
                        original.clone().unwrap_or(Value::Null),
                        current.cloned().unwrap_or(Value::Null),
                    ]);
                    (tracked.clone(), pair)
                })
            })
            .collect()
    }

    /// The minimal `$set` / `$unset` operators that persist every change.
    pub fn operators(&self, fields: &Map<String, Value>) -> AtomicQueue {
        let mut queue = AtomicQueue::new();
        for changed in self.changed_paths(fields) {
            let change = match path::get(fields, &changed) {
                Some(value) => FieldChange::set(changed, value.clone()),
                None => FieldChange::unset(changed),
            };
            queue.record(change, fields);
        }
        queue
    }

    /// Forget tracking for every path overlapping one of `paths`.
    pub fn clear_paths(&mut self, paths: &[String]) {
        self.originals
            .retain(|(tracked, _)| !paths.iter().any(|p| path::overlaps(tracked, p)));
    }

    pub fn clear(&mut self) {
        self.originals.clear();
    }

    /// Drop the tracked original for `field_path`, returning it.
    pub(crate) fn take(&mut self, field_path: &str) -> Option<Option<Value>> {
        let index = self
            .originals
            .iter()
            .position(|(tracked, _)| tracked == field_path)?;
        Some(self.originals.remove(index).1)
    }
}
