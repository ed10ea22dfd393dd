use super::{Target, TargetOverride};
use crate::error::OdmError;
use crate::store::ClientHandle;

/// What a runtime target scope applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeKey {
    /// Every entity of the model with this collection name.
    Model(&'static str),
    /// One entity, by `"<collection>:<id>"` key.
    Entity(String),
}

impl ScopeKey {
    pub(crate) fn applies_to(&self, collection: &str, entity_key: Option<&str>) -> bool {
        match self {
            ScopeKey::Model(name) => *name == collection,
            ScopeKey::Entity(key) => Some(key.as_str()) == entity_key,
        }
    }
}

/// The binding a `with_target` scope hands to its work: the resolved
/// target and the client handle acquired for it.
///
/// Both become unusable once the scope exits.
#[derive(Debug, Clone)]
pub struct ScopedTarget {
    target: Target,
    client: ClientHandle,
}

impl ScopedTarget {
    pub(crate) fn new(target: Target, client: ClientHandle) -> Self {
        ScopedTarget { target, client }
    }

    pub fn target(&self) -> Result<&Target, OdmError> {
        self.ensure_live()?;
        Ok(&self.target)
    }

    pub fn client(&self) -> Result<&ClientHandle, OdmError> {
        self.ensure_live()?;
        Ok(&self.client)
    }

    /// The handle without the liveness check, for the owning session.
    pub(crate) fn handle(&self) -> &ClientHandle {
        &self.client
    }

    pub fn is_live(&self) -> bool {
        !self.client.is_released()
    }

    fn ensure_live(&self) -> Result<(), OdmError> {
        if self.client.is_released() {
            return Err(OdmError::ScopeViolation(format!(
                "binding to {} was released",
                self.target
            )));
        }
        Ok(())
    }
}

/// An entered runtime scope, kept on the session's scope stack.
#[derive(Debug, Clone)]
pub(crate) struct TargetScope {
    pub key: ScopeKey,
    pub target_override: TargetOverride,
    pub binding: ScopedTarget,
}
