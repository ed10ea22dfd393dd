//! InMemoryStore - HashMap-backed document store for testing and development.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde_json::{Map, Value};
use ulid::Ulid;

use super::{Acknowledgment, ClientHandle, DocumentStore, WriteOperation};
use crate::entity::path;
use crate::error::OdmError;
use crate::operation::{apply, FieldChange};
use crate::target::Target;

/// A write as the store received it.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRecord {
    pub target: Target,
    pub operation: WriteOperation,
}

/// In-memory document store.
///
/// Collections are keyed by `"client/database.collection"`. Every submitted
/// write is logged, accepted or not. Clone-friendly via Arc; clones share
/// the same data.
#[derive(Clone)]
pub struct InMemoryStore {
    collections: Arc<RwLock<HashMap<String, Vec<Map<String, Value>>>>>,
    clients: Arc<RwLock<HashSet<String>>>,
    live: Arc<Mutex<HashSet<u64>>>,
    next_handle: Arc<AtomicU64>,
    log: Arc<RwLock<Vec<WriteRecord>>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// A store with a single client named `default`.
    pub fn new() -> Self {
        let mut clients = HashSet::new();
        clients.insert("default".to_string());
        InMemoryStore {
            collections: Arc::new(RwLock::new(HashMap::new())),
            clients: Arc::new(RwLock::new(clients)),
            live: Arc::new(Mutex::new(HashSet::new())),
            next_handle: Arc::new(AtomicU64::new(1)),
            log: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register another client name.
    pub fn with_client(self, name: impl Into<String>) -> Self {
        if let Ok(mut clients) = self.clients.write() {
            clients.insert(name.into());
        }
        self
    }

    fn namespace(target: &Target) -> String {
        format!("{}/{}.{}", target.client, target.database, target.collection)
    }

    /// A stored document by `_id`.
    pub fn document(&self, target: &Target, id: &str) -> Option<Map<String, Value>> {
        let collections = self.collections.read().ok()?;
        collections
            .get(&Self::namespace(target))?
            .iter()
            .find(|doc| has_id(doc, id))
            .cloned()
    }

    /// Every document in the target collection, in insertion order.
    pub fn documents(&self, target: &Target) -> Vec<Map<String, Value>> {
        self.collections
            .read()
            .ok()
            .and_then(|collections| collections.get(&Self::namespace(target)).cloned())
            .unwrap_or_default()
    }

    /// Every write submitted so far, in order.
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.log.read().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn write_count(&self) -> usize {
        self.log.read().map(|log| log.len()).unwrap_or_default()
    }

    /// Client handles acquired and not yet released.
    pub fn live_clients(&self) -> usize {
        self.live.lock().map(|live| live.len()).unwrap_or_default()
    }

    fn ensure_live(handle: &ClientHandle) -> Result<(), OdmError> {
        if handle.is_released() {
            return Err(OdmError::ScopeViolation(format!(
                "client `{}` (#{}) used after release",
                handle.name(),
                handle.id()
            )));
        }
        Ok(())
    }
}

fn has_id(doc: &Map<String, Value>, id: &str) -> bool {
    doc.get("_id").and_then(Value::as_str) == Some(id)
}

fn matches(doc: &Map<String, Value>, filter: &Map<String, Value>) -> bool {
    filter
        .iter()
        .all(|(field, expected)| path::get(doc, field) == Some(expected))
}

/// Apply a wire update to a copy of `doc`; the original is untouched on error.
fn apply_update(doc: &Map<String, Value>, operators: &Map<String, Value>) -> Result<Map<String, Value>, OdmError> {
    let mut next = doc.clone();
    for change in FieldChange::from_wire(operators)? {
        apply(&mut next, &change)?;
    }
    Ok(next)
}

impl DocumentStore for InMemoryStore {
    fn resolve_client(&self, name: &str) -> Result<ClientHandle, OdmError> {
        let known = self
            .clients
            .read()
            .map_err(|_| OdmError::LockPoisoned("client read"))?
            .contains(name);
        if !known {
            return Err(OdmError::UnknownClient(name.to_string()));
        }

        let handle = ClientHandle::new(name, self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.live
            .lock()
            .map_err(|_| OdmError::LockPoisoned("client acquire"))?
            .insert(handle.id());
        Ok(handle)
    }

    fn release_client(&self, handle: &ClientHandle) {
        handle.release();
        if let Ok(mut live) = self.live.lock() {
            live.remove(&handle.id());
        }
    }

    fn write(
        &self,
        client: &ClientHandle,
        target: &Target,
        operation: WriteOperation,
    ) -> Result<Acknowledgment, OdmError> {
        Self::ensure_live(client)?;

        self.log
            .write()
            .map_err(|_| OdmError::LockPoisoned("log write"))?
            .push(WriteRecord {
                target: target.clone(),
                operation: operation.clone(),
            });

        let mut collections = self
            .collections
            .write()
            .map_err(|_| OdmError::LockPoisoned("write"))?;
        let docs = collections.entry(Self::namespace(target)).or_default();

        let ack = match operation {
            WriteOperation::Insert { document } => {
                let Some(id) = document.get("_id").and_then(Value::as_str) else {
                    return Ok(Acknowledgment::failed("document has no string _id"));
                };
                if docs.iter().any(|doc| has_id(doc, id)) {
                    Acknowledgment::failed(format!(
                        "E11000 duplicate key error collection: {} dup key: {{ _id: \"{}\" }}",
                        target, id
                    ))
                } else {
                    docs.push(document);
                    Acknowledgment::ok(1)
                }
            }
            WriteOperation::UpdateById { id, operators } => {
                match docs.iter_mut().find(|doc| has_id(doc, &id)) {
                    None => Acknowledgment::ok(0),
                    Some(doc) => match apply_update(doc, &operators) {
                        Ok(next) => {
                            *doc = next;
                            Acknowledgment::ok(1)
                        }
                        Err(err) => Acknowledgment::failed(err.to_string()),
                    },
                }
            }
            WriteOperation::Upsert { filter, operators } => {
                match docs.iter_mut().find(|doc| matches(doc, &filter)) {
                    Some(doc) => match apply_update(doc, &operators) {
                        Ok(next) => {
                            *doc = next;
                            Acknowledgment::ok(1)
                        }
                        Err(err) => Acknowledgment::failed(err.to_string()),
                    },
                    None => {
                        let mut seed = Map::new();
                        if !filter.contains_key("_id") {
                            seed.insert("_id".to_string(), Value::String(Ulid::new().to_string()));
                        }
                        for (field, value) in &filter {
                            if !field.starts_with('$') {
                                seed.insert(field.clone(), value.clone());
                            }
                        }
                        match apply_update(&seed, &operators) {
                            Ok(inserted) => {
                                docs.push(inserted);
                                Acknowledgment::ok(0)
                            }
                            Err(err) => Acknowledgment::failed(err.to_string()),
                        }
                    }
                }
            }
            WriteOperation::Delete { filter } => {
                let before = docs.len();
                docs.retain(|doc| !matches(doc, &filter));
                Acknowledgment::ok((before - docs.len()) as u64)
            }
        };

        Ok(ack)
    }

    fn find_by_id(
        &self,
        client: &ClientHandle,
        target: &Target,
        id: &str,
    ) -> Result<Option<Map<String, Value>>, OdmError> {
        Self::ensure_live(client)?;
        let collections = self
            .collections
            .read()
            .map_err(|_| OdmError::LockPoisoned("read"))?;
        Ok(collections
            .get(&Self::namespace(target))
            .and_then(|docs| docs.iter().find(|doc| has_id(doc, id)).cloned()))
    }
}
