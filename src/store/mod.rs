//! The storage collaborator: collection-level writes with acknowledgments,
//! and client handle acquisition.
//!
//! The core never talks to a database directly. It resolves a target,
//! acquires a client for it, submits one `WriteOperation`, and releases the
//! client. `InMemoryStore` is the reference implementation used in tests
//! and development.

mod in_memory;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::OdmError;
use crate::target::Target;

pub use in_memory::{InMemoryStore, WriteRecord};

/// Opaque handle to a named client, valid until released.
#[derive(Clone)]
pub struct ClientHandle {
    name: String,
    id: u64,
    released: Arc<AtomicBool>,
}

impl ClientHandle {
    pub fn new(name: impl Into<String>, id: u64) -> Self {
        ClientHandle {
            name: name.into(),
            id,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Mark the handle released. Returns false if it already was.
    pub fn release(&self) -> bool {
        !self.released.swap(true, Ordering::AcqRel)
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("released", &self.is_released())
            .finish()
    }
}

/// One write command.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOperation {
    Insert {
        document: Map<String, Value>,
    },
    UpdateById {
        id: String,
        operators: Map<String, Value>,
    },
    Upsert {
        filter: Map<String, Value>,
        operators: Map<String, Value>,
    },
    Delete {
        filter: Map<String, Value>,
    },
}

impl WriteOperation {
    pub fn kind(&self) -> &'static str {
        match self {
            WriteOperation::Insert { .. } => "insert",
            WriteOperation::UpdateById { .. } => "update",
            WriteOperation::Upsert { .. } => "upsert",
            WriteOperation::Delete { .. } => "delete",
        }
    }
}

/// The storage layer's answer to a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgment {
    pub success: bool,
    pub matched_count: u64,
    pub error: Option<String>,
}

impl Acknowledgment {
    pub fn ok(matched_count: u64) -> Self {
        Acknowledgment {
            success: true,
            matched_count,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Acknowledgment {
            success: false,
            matched_count: 0,
            error: Some(error.into()),
        }
    }
}

/// Collection-level storage consumed by the session.
///
/// Implementations apply a multi-operator update atomically per document.
/// No retries happen above this trait; retry policy belongs here.
pub trait DocumentStore: Send + Sync {
    /// Acquire a handle for the named client.
    fn resolve_client(&self, name: &str) -> Result<ClientHandle, OdmError>;

    /// Release a handle obtained from `resolve_client`.
    fn release_client(&self, handle: &ClientHandle);

    /// Submit one write. A rejected write is `Ok` with `success == false`;
    /// `Err` is reserved for failures to talk to the store at all.
    fn write(
        &self,
        client: &ClientHandle,
        target: &Target,
        operation: WriteOperation,
    ) -> Result<Acknowledgment, OdmError>;

    /// Load one document by `_id`.
    fn find_by_id(
        &self,
        client: &ClientHandle,
        target: &Target,
        id: &str,
    ) -> Result<Option<Map<String, Value>>, OdmError>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    fn resolve_client(&self, name: &str) -> Result<ClientHandle, OdmError> {
        (**self).resolve_client(name)
    }

    fn release_client(&self, handle: &ClientHandle) {
        (**self).release_client(handle)
    }

    fn write(
        &self,
        client: &ClientHandle,
        target: &Target,
        operation: WriteOperation,
    ) -> Result<Acknowledgment, OdmError> {
        (**self).write(client, target, operation)
    }

    fn find_by_id(
        &self,
        client: &ClientHandle,
        target: &Target,
        id: &str,
    ) -> Result<Option<Map<String, Value>>, OdmError> {
        (**self).find_by_id(client, target, id)
    }
}
