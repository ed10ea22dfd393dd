//! Atomic operators, their in-memory semantics, and the per-entity queue
//! that batches them into one update command.

mod apply;
mod operator;
mod queue;

pub use apply::apply;
pub use operator::{FieldChange, Operator};
pub use queue::AtomicQueue;
