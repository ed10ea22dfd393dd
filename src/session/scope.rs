use std::panic::{self, AssertUnwindSafe};

use tracing::debug;

use super::Session;
use crate::entity::{entity_key, Document};
use crate::error::OdmError;
use crate::store::DocumentStore;
use crate::target::{ScopeKey, ScopedTarget, TargetOverride, TargetScope};

impl<S: DocumentStore> Session<S> {
    /// Run `work` with `target` as the highest-priority layer for every
    /// operation on model `D`.
    ///
    /// The client for the resolved target is acquired on entry and released
    /// on every exit path. The `ScopedTarget` handed to `work` stops working
    /// once the scope has exited.
    pub fn with_target<D, T, E, F>(&mut self, target: TargetOverride, work: F) -> Result<T, E>
    where
        D: Document,
        E: From<OdmError>,
        F: FnOnce(&mut Self, &ScopedTarget) -> Result<T, E>,
    {
        let binding = self.enter_scope::<D>(ScopeKey::Model(D::COLLECTION), None, target)?;
        let result = panic::catch_unwind(AssertUnwindSafe(|| work(&mut *self, &binding)));
        self.exit_scope(&binding);
        match result {
            Ok(result) => result,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Like `with_target`, but only operations on `doc` are redirected.
    pub fn with_entity_target<D, T, E, F>(&mut self, doc: &mut D, target: TargetOverride, work: F) -> Result<T, E>
    where
        D: Document,
        E: From<OdmError>,
        F: FnOnce(&mut Self, &mut D, &ScopedTarget) -> Result<T, E>,
    {
        let key = entity_key(doc);
        let binding = self.enter_scope::<D>(ScopeKey::Entity(key.clone()), Some(&key), target)?;
        let result = panic::catch_unwind(AssertUnwindSafe(|| work(&mut *self, &mut *doc, &binding)));
        self.exit_scope(&binding);
        match result {
            Ok(result) => result,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    fn enter_scope<D: Document>(
        &mut self,
        key: ScopeKey,
        entity: Option<&str>,
        target_override: TargetOverride,
    ) -> Result<ScopedTarget, OdmError> {
        let target = self.resolver.resolve(
            Some(&target_override),
            self.process_override.as_ref(),
            &D::storage_options(),
            D::COLLECTION,
        );
        let client = self.store.resolve_client(&target.client)?;
        debug!(scope = ?key, entity = ?entity, target = %target, "target scope entered");

        let binding = ScopedTarget::new(target, client);
        self.scopes.push(TargetScope {
            key,
            target_override,
            binding: binding.clone(),
        });
        Ok(binding)
    }

    fn exit_scope(&mut self, binding: &ScopedTarget) {
        if let Some(scope) = self.scopes.pop() {
            debug!(scope = ?scope.key, "target scope exited");
        }
        self.store.release_client(binding.handle());
    }
}
