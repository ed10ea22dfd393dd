use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use super::Session;
use crate::context::{AtomicOptions, ContextKind, Outcome};
use crate::entity::{entity_key, Document};
use crate::error::OdmError;
use crate::store::DocumentStore;

impl<S: DocumentStore> Session<S> {
    /// Run `work` inside a persistence context for `doc`.
    ///
    /// `Ok` closes the context successfully: it flushes, or hands its
    /// changes to the parent when joined. `Err` rolls back every change made
    /// inside the context and returns the error untouched. A panic is
    /// treated like `Err` and then resumed.
    ///
    /// ```ignore
    /// session.atomically(&mut artist, AtomicOptions::new(), |session, artist| {
    ///     session.inc(artist, "likes", 1)?;
    ///     session.set(artist, "name", "Jake")?;
    ///     Ok::<_, OdmError>(())
    /// })?;
    /// ```
    pub fn atomically<D, T, E, F>(&mut self, doc: &mut D, options: AtomicOptions, work: F) -> Result<T, E>
    where
        D: Document,
        E: From<OdmError>,
        F: FnOnce(&mut Self, &mut D) -> Result<T, E>,
    {
        self.open(doc, options)?;

        let result = panic::catch_unwind(AssertUnwindSafe(|| work(&mut *self, &mut *doc)));
        match result {
            Ok(Ok(value)) => {
                self.close(doc, Outcome::Success)?;
                Ok(value)
            }
            Ok(Err(err)) => {
                if let Err(close_err) = self.close(doc, Outcome::Failure) {
                    warn!(entity = %entity_key(doc), error = %close_err, "rollback failed");
                }
                Err(err)
            }
            Err(payload) => {
                if let Err(close_err) = self.close(doc, Outcome::Failure) {
                    warn!(entity = %entity_key(doc), error = %close_err, "rollback after panic failed");
                }
                panic::resume_unwind(payload)
            }
        }
    }

    /// Push a new context for `doc`. Returns its depth (1 = outermost).
    ///
    /// Prefer `atomically`; a context opened here must be closed with
    /// `close`.
    pub fn open<D: Document>(&mut self, doc: &mut D, options: AtomicOptions) -> Result<usize, OdmError> {
        let key = entity_key(doc);
        let default_join = self.config.join_contexts;
        let context = self
            .stacks
            .entry(key.clone())
            .or_default()
            .open(&options, default_join);

        debug!(entity = %key, depth = context.depth(), kind = ?context.kind(), "context opened");
        Ok(context.depth())
    }

    /// Pop the innermost context of `doc` and settle it.
    ///
    /// On `Success` a flushing context writes its queue (plus anything
    /// retained from an earlier failed flush) and a joining one merges into
    /// its parent. On `Failure` every path touched in the context is put
    /// back to its value at `open`. A failed write returns `StorageWrite`
    /// and keeps the changes pending; nothing is rolled back.
    pub fn close<D: Document>(&mut self, doc: &mut D, outcome: Outcome) -> Result<(), OdmError> {
        let key = entity_key(doc);
        let stack = self
            .stacks
            .get_mut(&key)
            .ok_or_else(|| OdmError::NoActiveContext(key.clone()))?;
        let context = stack
            .pop()
            .ok_or_else(|| OdmError::NoActiveContext(key.clone()))?;
        let depth = context.depth();

        match (outcome, context.kind()) {
            (Outcome::Failure, _) => {
                let (_, rollback, _) = context.into_parts();
                debug!(entity = %key, depth, paths = ?rollback.paths(), "context rolled back");
                rollback.restore(doc.entity_mut().fields_mut());
                self.drop_idle(&key);
                Ok(())
            }
            (Outcome::Success, ContextKind::Joining) => {
                let parent = stack
                    .top_mut()
                    .ok_or_else(|| OdmError::NoActiveContext(key.clone()))?;
                debug!(entity = %key, depth, "context joined parent");
                parent.absorb(context, doc.entity());
                Ok(())
            }
            (Outcome::Success, ContextKind::Flushing) => {
                let (queue, _, target_override) = context.into_parts();
                let mut pending = self.retained_queue(&key);
                pending.merge(queue, doc.entity().fields());
                self.drop_idle(&key);
                self.flush(doc, pending, target_override.as_ref())
            }
        }
    }
}
