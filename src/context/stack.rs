use super::{AtomicOptions, ContextKind, PersistenceContext};
use crate::operation::AtomicQueue;

/// The open contexts of one entity, innermost last, plus whatever a failed
/// flush left behind.
#[derive(Debug, Clone, Default)]
pub struct ContextStack {
    contexts: Vec<PersistenceContext>,
    retained: AtomicQueue,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a new context. It joins only when asked to and a parent exists.
    pub(crate) fn open(&mut self, options: &AtomicOptions, default_join: bool) -> &PersistenceContext {
        let kind = if options.wants_join(default_join) && !self.contexts.is_empty() {
            ContextKind::Joining
        } else {
            ContextKind::Flushing
        };
        let depth = self.contexts.len() + 1;
        self.contexts.push(PersistenceContext::new(
            kind,
            depth,
            options.target_override().cloned(),
        ));
        &self.contexts[depth - 1]
    }

    pub(crate) fn pop(&mut self) -> Option<PersistenceContext> {
        self.contexts.pop()
    }

    pub fn top(&self) -> Option<&PersistenceContext> {
        self.contexts.last()
    }

    pub(crate) fn top_mut(&mut self) -> Option<&mut PersistenceContext> {
        self.contexts.last_mut()
    }

    pub fn contexts(&self) -> &[PersistenceContext] {
        &self.contexts
    }

    pub fn depth(&self) -> usize {
        self.contexts.len()
    }

    /// Changes from a failed flush, sent ahead of the next one.
    pub fn retained(&self) -> &AtomicQueue {
        &self.retained
    }

    pub(crate) fn take_retained(&mut self) -> AtomicQueue {
        std::mem::take(&mut self.retained)
    }

    pub(crate) fn retain(&mut self, queue: AtomicQueue) {
        self.retained = queue;
    }

    /// Nothing open and nothing retained.
    pub fn is_idle(&self) -> bool {
        self.contexts.is_empty() && self.retained.is_empty()
    }
}
