use serde_json::{Map, Value};
use tracing::{debug, info};

use super::Session;
use crate::entity::{entity_key, Document, Entity};
use crate::error::OdmError;
use crate::store::{DocumentStore, WriteOperation};

fn id_filter(id: &str) -> Map<String, Value> {
    let mut filter = Map::new();
    filter.insert("_id".to_string(), Value::String(id.to_string()));
    filter
}

impl<S: DocumentStore> Session<S> {
    /// Persist plain attribute changes: the whole document for an unsaved
    /// entity, otherwise the minimal `$set`/`$unset` for what changed.
    ///
    /// Anything retained from a failed flush is covered by the same write.
    /// Fails with `ContextOpen` while a context is open for the entity.
    pub fn save<D: Document>(&mut self, doc: &mut D) -> Result<(), OdmError> {
        let key = entity_key(doc);
        self.ensure_idle(&key)?;
        let (target, scoped) = self.scoped_target::<D>(Some(&key), None);

        let operation = if doc.entity().is_persisted() {
            let queue = doc.entity().dirty().operators(doc.entity().fields());
            if queue.is_empty() {
                debug!(entity = %key, "nothing to save");
                return Ok(());
            }
            WriteOperation::UpdateById {
                id: doc.entity().id().to_string(),
                operators: queue.to_wire_operators(),
            }
        } else {
            WriteOperation::Insert {
                document: doc.entity().document(),
            }
        };

        info!(entity = %key, target = %target, write = operation.kind(), "saving");
        self.submit(&target, scoped.as_ref(), operation)?;
        self.settle(&key, doc);
        Ok(())
    }

    /// Write every field with `upsert({_id}, {$set: fields})`.
    pub fn upsert<D: Document>(&mut self, doc: &mut D) -> Result<(), OdmError> {
        let key = entity_key(doc);
        self.ensure_idle(&key)?;
        let (target, scoped) = self.scoped_target::<D>(Some(&key), None);

        let mut operators = Map::new();
        operators.insert(
            "$set".to_string(),
            Value::Object(doc.entity().fields().clone()),
        );
        let operation = WriteOperation::Upsert {
            filter: id_filter(doc.entity().id()),
            operators,
        };

        info!(entity = %key, target = %target, write = operation.kind(), "upserting");
        self.submit(&target, scoped.as_ref(), operation)?;
        self.settle(&key, doc);
        Ok(())
    }

    /// Remove the stored document. The entity stays in memory, unsaved.
    pub fn delete<D: Document>(&mut self, doc: &mut D) -> Result<(), OdmError> {
        let key = entity_key(doc);
        self.ensure_idle(&key)?;
        let (target, scoped) = self.scoped_target::<D>(Some(&key), None);
        let operation = WriteOperation::Delete {
            filter: id_filter(doc.entity().id()),
        };

        info!(entity = %key, target = %target, write = operation.kind(), "deleting");
        self.submit(&target, scoped.as_ref(), operation)?;
        doc.entity_mut().mark_removed();
        if let Some(stack) = self.stacks.get_mut(&key) {
            stack.take_retained();
        }
        self.drop_idle(&key);
        Ok(())
    }

    /// Load a document of model `D` by id through the resolved target.
    pub fn find<D: Document + Default>(&self, id: &str) -> Result<Option<D>, OdmError> {
        let key = format!("{}:{}", D::COLLECTION, id);
        let (target, scoped) = self.scoped_target::<D>(Some(&key), None);

        let found = match scoped {
            Some(client) => self.store.find_by_id(&client, &target, id)?,
            None => {
                let client = self.store.resolve_client(&target.client)?;
                let result = self.store.find_by_id(&client, &target, id);
                self.store.release_client(&client);
                result?
            }
        };
        debug!(entity = %key, target = %target, found = found.is_some(), "find");

        found
            .map(|document| {
                let mut doc = D::default();
                *doc.entity_mut() = Entity::from_document(document)?;
                Ok::<D, OdmError>(doc)
            })
            .transpose()
    }

    fn ensure_idle(&self, key: &str) -> Result<(), OdmError> {
        match self.stacks.get(key) {
            Some(stack) if stack.depth() > 0 => Err(OdmError::ContextOpen(key.to_string())),
            _ => Ok(()),
        }
    }

    fn settle<D: Document>(&mut self, key: &str, doc: &mut D) {
        let entity = doc.entity_mut();
        entity.mark_persisted();
        entity.clear_changes(None);
        if let Some(stack) = self.stacks.get_mut(key) {
            stack.take_retained();
        }
        self.drop_idle(key);
    }
}
