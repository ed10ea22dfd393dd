//! Atomic persistence core for a document mapper.
//!
//! Field changes on in-memory entities become minimal update operators,
//! grouped per entity into one write per persistence context. Contexts nest,
//! join their parent or flush on their own, and roll back in memory when
//! their work fails. Every write is routed to a target resolved from runtime
//! scopes, a session-wide override, the model's declared defaults and the
//! configured defaults.

#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

// Lets the derive macro's `::atomic_odm::` paths resolve inside this crate.
extern crate self as atomic_odm;

mod config;
mod context;
mod entity;
mod error;
mod operation;
mod session;
mod store;
mod target;

pub use config::Config;
pub use context::{AtomicOptions, ContextKind, ContextStack, Outcome, PersistenceContext, RollbackLog};
pub use entity::{DirtyTracker, Document, Entity};
pub use error::OdmError;
pub use operation::{apply, AtomicQueue, FieldChange, Operator};
pub use session::Session;
pub use store::{
    Acknowledgment, ClientHandle, DocumentStore, InMemoryStore, WriteOperation, WriteRecord,
};
pub use target::{ReadPreference, ScopeKey, ScopedTarget, Target, TargetOverride, TargetResolver};

// Re-export the derive macro
pub use atomic_odm_macros::Document;
