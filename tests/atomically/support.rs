//! Test domain: an `Artist` document and a store that can be told to reject writes.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use atomic_odm::{
    Acknowledgment, ClientHandle, Document, DocumentStore, Entity, InMemoryStore, OdmError, Session,
    Target, WriteOperation,
};
use serde_json::{Map, Value};

#[derive(Debug, Default, Document)]
#[document(collection = "artists", database = "music")]
pub struct Artist {
    pub entity: Entity,
}

impl Artist {
    pub fn named(name: &str) -> Self {
        let mut artist = Artist::default();
        artist.entity.assign("name", name).expect("assign name");
        artist
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.entity.get(path)
    }
}

/// An artist that has already been inserted.
pub fn saved_artist<S: DocumentStore>(session: &mut Session<S>, name: &str) -> Artist {
    let mut artist = Artist::named(name);
    session.save(&mut artist).expect("save artist");
    artist
}

pub fn session() -> Session<InMemoryStore> {
    init_tracing();
    Session::new(InMemoryStore::new())
}

pub fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("json object")
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Wraps an `InMemoryStore` and rejects writes while failing is switched on.
///
/// Rejected writes never reach the inner store's log.
#[derive(Clone)]
pub struct FailingStore {
    inner: InMemoryStore,
    failing: Arc<AtomicBool>,
}

impl FailingStore {
    pub fn new() -> Self {
        FailingStore {
            inner: InMemoryStore::new(),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn recover(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }
}

impl DocumentStore for FailingStore {
    fn resolve_client(&self, name: &str) -> Result<ClientHandle, OdmError> {
        self.inner.resolve_client(name)
    }

    fn release_client(&self, handle: &ClientHandle) {
        self.inner.release_client(handle)
    }

    fn write(
        &self,
        client: &ClientHandle,
        target: &Target,
        operation: WriteOperation,
    ) -> Result<Acknowledgment, OdmError> {
        if self.failing.load(Ordering::SeqCst) {
            return Ok(Acknowledgment::failed("write concern timeout"));
        }
        self.inner.write(client, target, operation)
    }

    fn find_by_id(
        &self,
        client: &ClientHandle,
        target: &Target,
        id: &str,
    ) -> Result<Option<Map<String, Value>>, OdmError> {
        self.inner.find_by_id(client, target, id)
    }
}
