//! Persistence contexts: the per-entity units of atomic work that nest
//! inside one another and end by flushing, joining their parent, or rolling
//! back.

mod context;
mod rollback;
mod stack;

pub use context::{AtomicOptions, ContextKind, Outcome, PersistenceContext};
pub use rollback::RollbackLog;
pub use stack::ContextStack;
