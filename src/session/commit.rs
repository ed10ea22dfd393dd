use serde_json::{Map, Value};
use tracing::{info, warn};

use super::Session;
use crate::entity::{entity_key, Document};
use crate::error::OdmError;
use crate::operation::AtomicQueue;
use crate::store::{Acknowledgment, ClientHandle, DocumentStore, WriteOperation};
use crate::target::{Target, TargetOverride};

impl<S: DocumentStore> Session<S> {
    /// Write `queue` for `doc` as one command.
    ///
    /// An unsaved entity is upserted by id with the queue's operators, so
    /// only what this context changed reaches storage. A persisted one gets
    /// an update by id carrying every operator group. An empty queue writes
    /// nothing. On failure the queue is retained for the entity's next flush.
    pub(crate) fn flush<D: Document>(
        &mut self,
        doc: &mut D,
        queue: AtomicQueue,
        explicit: Option<&TargetOverride>,
    ) -> Result<(), OdmError> {
        if queue.is_empty() {
            return Ok(());
        }

        let key = entity_key(doc);
        let (target, scoped) = self.scoped_target::<D>(Some(&key), explicit);
        let id = doc.entity().id().to_string();
        let operators = queue.to_wire_operators();
        let operation = if doc.entity().is_persisted() {
            WriteOperation::UpdateById { id, operators }
        } else {
            let mut filter = Map::new();
            filter.insert("_id".to_string(), Value::String(id));
            WriteOperation::Upsert { filter, operators }
        };

        info!(
            entity = %key,
            target = %target,
            write = operation.kind(),
            operators = queue.len(),
            "flushing"
        );

        match self.submit(&target, scoped.as_ref(), operation) {
            Ok(_) => {
                let entity = doc.entity_mut();
                entity.mark_persisted();
                entity.clear_changes(Some(&queue.paths()));
                Ok(())
            }
            Err(err) => {
                warn!(entity = %key, operators = queue.len(), "flush failed, retaining changes");
                self.stacks.entry(key).or_default().retain(queue);
                Err(err)
            }
        }
    }

    /// Resolve a target and pick up the client of the innermost applicable
    /// runtime scope when it points at the same client.
    pub(crate) fn scoped_target<D: Document>(
        &self,
        key: Option<&str>,
        explicit: Option<&TargetOverride>,
    ) -> (Target, Option<ClientHandle>) {
        let (target, scope) = self.resolve_for::<D>(key, explicit);
        let handle = scope
            .map(|scope| scope.binding.handle())
            .filter(|handle| handle.name() == target.client)
            .cloned();
        (target, handle)
    }

    /// Send one write. Without a scoped client, a client is acquired for
    /// the write and released right after it.
    pub(crate) fn submit(
        &self,
        target: &Target,
        scoped: Option<&ClientHandle>,
        operation: WriteOperation,
    ) -> Result<Acknowledgment, OdmError> {
        let ack = match scoped {
            Some(client) => self.store.write(client, target, operation)?,
            None => {
                let client = self.store.resolve_client(&target.client)?;
                let result = self.store.write(&client, target, operation);
                self.store.release_client(&client);
                result?
            }
        };

        if !ack.success {
            let message = ack
                .error
                .unwrap_or_else(|| "write not acknowledged".to_string());
            warn!(target = %target, error = %message, "write rejected");
            return Err(OdmError::StorageWrite {
                target: target.to_string(),
                message,
            });
        }
        Ok(ack)
    }
}
