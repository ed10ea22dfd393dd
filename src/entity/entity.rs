use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ulid::Ulid;

use super::dirty::DirtyTracker;
use super::path;
use crate::error::OdmError;
use crate::operation::{self, FieldChange};

/// An in-memory record mapped to one database document.
#[derive(Clone, Serialize, Deserialize)]
pub struct Entity {
    id: String,
    fields: Map<String, Value>,
    #[serde(skip, default)]
    persisted: bool,
    #[serde(skip, default)]
    dirty: DirtyTracker,
}

impl Default for Entity {
    fn default() -> Self {
        Entity::with_id(Ulid::new().to_string())
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("fields", &self.fields)
            .field("persisted", &self.persisted)
            .field("changed", &self.dirty.changed_paths(&self.fields))
            .finish()
    }
}

impl Entity {
    /// A new, unsaved entity with a freshly generated id.
    pub fn new() -> Self {
        Entity::default()
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Entity {
            id: id.into(),
            fields: Map::new(),
            persisted: false,
            dirty: DirtyTracker::new(),
        }
    }

    /// Hydrate a persisted, clean entity from a stored document.
    pub fn from_document(mut document: Map<String, Value>) -> Result<Self, OdmError> {
        let id = match document.shift_remove("_id") {
            Some(Value::String(id)) => id,
            Some(other) => other.to_string(),
            None => return Err(OdmError::Serde("document has no _id".into())),
        };
        Ok(Entity {
            id,
            fields: document,
            persisted: true,
            dirty: DirtyTracker::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, field_path: &str) -> Option<&Value> {
        path::get(&self.fields, field_path)
    }

    /// True once an insert or upsert of this entity has succeeded.
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// The full document as stored: `_id` followed by every field.
    pub fn document(&self) -> Map<String, Value> {
        let mut document = Map::with_capacity(self.fields.len() + 1);
        document.insert("_id".to_string(), Value::String(self.id.clone()));
        document.extend(self.fields.clone());
        document
    }

    /// Plain attribute assignment: marks the field dirty without queuing an
    /// atomic operator. Persisted by `Session::save`.
    pub fn assign(&mut self, field_path: &str, value: impl Into<Value>) -> Result<(), OdmError> {
        self.apply(&FieldChange::set(field_path, value))
    }

    /// Plain attribute removal, persisted by `Session::save` as `$unset`.
    pub fn remove(&mut self, field_path: &str) -> Result<(), OdmError> {
        self.apply(&FieldChange::unset(field_path))
    }

    pub fn changed(&self) -> bool {
        self.dirty.is_changed(&self.fields)
    }

    pub fn changed_paths(&self) -> Vec<String> {
        self.dirty.changed_paths(&self.fields)
    }

    /// `path -> [old, new]` for every field changed since the last persist.
    pub fn changes(&self) -> Map<String, Value> {
        self.dirty.changes(&self.fields)
    }

    /// The value `field_path` had at the last persist, if it changed since.
    pub fn attribute_was(&self, field_path: &str) -> Option<Value> {
        self.dirty.original(field_path).flatten()
    }

    /// Put `field_path` back to its value at the last persist.
    pub fn reset_attribute(&mut self, field_path: &str) {
        let original = match self.dirty.take(field_path) {
            Some(original) => original,
            None => match self.dirty.original(field_path) {
                Some(original) => original,
                None => return,
            },
        };
        path::restore(&mut self.fields, field_path, original);
    }

    pub fn dirty(&self) -> &DirtyTracker {
        &self.dirty
    }

    /// Apply an atomic operator in memory, tracking every affected path.
    pub(crate) fn apply(&mut self, change: &FieldChange) -> Result<(), OdmError> {
        let mut next = self.fields.clone();
        operation::apply(&mut next, change)?;
        for affected in change.affected_paths() {
            self.dirty.track(affected, &self.fields);
        }
        self.fields = next;
        Ok(())
    }

    pub(crate) fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.fields
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.persisted = true;
    }

    pub(crate) fn mark_removed(&mut self) {
        self.persisted = false;
    }

    /// Clear dirty tracking after a successful write. `None` clears all.
    pub(crate) fn clear_changes(&mut self, paths: Option<&[String]>) {
        match paths {
            Some(paths) => self.dirty.clear_paths(paths),
            None => self.dirty.clear(),
        }
    }
}
