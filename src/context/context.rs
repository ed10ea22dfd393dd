use serde_json::Value;

use super::RollbackLog;
use crate::entity::{path, Entity};
use crate::error::OdmError;
use crate::operation::{AtomicQueue, FieldChange};
use crate::target::TargetOverride;

/// How a context ends on success, decided when it opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// Flushes its queue to storage on close.
    Flushing,
    /// Hands its queue and rollback log to the parent on close.
    Joining,
}

/// How the scoped work of a context ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// Per-call options for `Session::atomically` and `Session::open`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AtomicOptions {
    join_context: Option<bool>,
    target: Option<TargetOverride>,
}

impl AtomicOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for `AtomicOptions::new().join_context(true)`.
    pub fn joined() -> Self {
        Self::new().join_context(true)
    }

    /// Override the configured `join_contexts` default for this call.
    pub fn join_context(mut self, join: bool) -> Self {
        self.join_context = Some(join);
        self
    }

    /// Target override for this context's own flush. Takes priority over
    /// every other layer.
    pub fn target(mut self, target: TargetOverride) -> Self {
        self.target = Some(target);
        self
    }

    pub fn wants_join(&self, default: bool) -> bool {
        self.join_context.unwrap_or(default)
    }

    pub fn target_override(&self) -> Option<&TargetOverride> {
        self.target.as_ref()
    }
}

/// One logical unit of atomic work on one entity.
#[derive(Debug, Clone)]
pub struct PersistenceContext {
    kind: ContextKind,
    depth: usize,
    queue: AtomicQueue,
    rollback: RollbackLog,
    target_override: Option<TargetOverride>,
}

impl PersistenceContext {
    pub(crate) fn new(kind: ContextKind, depth: usize, target_override: Option<TargetOverride>) -> Self {
        PersistenceContext {
            kind,
            depth,
            queue: AtomicQueue::new(),
            rollback: RollbackLog::new(),
            target_override,
        }
    }

    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    /// 1 for an outermost context.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn queue(&self) -> &AtomicQueue {
        &self.queue
    }

    pub fn rollback(&self) -> &RollbackLog {
        &self.rollback
    }

    pub fn target_override(&self) -> Option<&TargetOverride> {
        self.target_override.as_ref()
    }

    /// Apply `change` to the entity and queue it. On error nothing is
    /// recorded and the entity is unchanged.
    pub(crate) fn record_change(&mut self, entity: &mut Entity, change: FieldChange) -> Result<(), OdmError> {
        let before: Vec<(String, Option<Value>)> = change
            .affected_paths()
            .into_iter()
            .map(|affected| (affected.to_string(), path::get(entity.fields(), affected).cloned()))
            .collect();

        entity.apply(&change)?;

        for (affected, value) in before {
            self.rollback.record(&affected, value);
        }
        self.queue.record(change, entity.fields());
        Ok(())
    }

    /// Absorb a joined child: its queue collapses into ours and its rollback
    /// log extends ours.
    pub(crate) fn absorb(&mut self, child: PersistenceContext, entity: &Entity) {
        self.queue.merge(child.queue, entity.fields());
        self.rollback.merge(child.rollback);
    }

    pub(crate) fn into_parts(self) -> (AtomicQueue, RollbackLog, Option<TargetOverride>) {
        (self.queue, self.rollback, self.target_override)
    }
}
