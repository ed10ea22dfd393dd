//! The execution scope of the persistence core.
//!
//! A `Session` owns every piece of state the core keeps between calls:
//! per-entity context stacks, runtime target scopes and the session-wide
//! target override. Work that must stay isolated gets its own session;
//! sessions share storage by sharing the store.

mod atomic;
mod commit;
mod persistence;
mod scope;

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::trace;

use crate::config::Config;
use crate::context::{AtomicOptions, ContextStack, Outcome};
use crate::entity::{entity_key, Document};
use crate::error::OdmError;
use crate::operation::{AtomicQueue, FieldChange, Operator};
use crate::store::DocumentStore;
use crate::target::{Target, TargetOverride, TargetResolver, TargetScope};

pub struct Session<S: DocumentStore> {
    store: S,
    config: Config,
    resolver: TargetResolver,
    stacks: HashMap<String, ContextStack>,
    scopes: Vec<TargetScope>,
    process_override: Option<TargetOverride>,
}

impl<S: DocumentStore> Session<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, Config::default())
    }

    pub fn with_config(store: S, config: Config) -> Self {
        Session {
            resolver: TargetResolver::new(&config),
            store,
            config,
            stacks: HashMap::new(),
            scopes: Vec::new(),
            process_override: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ------------------------------------------------------------------
    // Session-wide target override
    // ------------------------------------------------------------------

    /// Replace the session-wide override layer.
    pub fn set_override(&mut self, target: TargetOverride) {
        self.process_override = Some(target);
    }

    pub fn override_client(&mut self, client: impl Into<String>) {
        let current = self.process_override.take().unwrap_or_default();
        self.process_override = Some(current.client(client));
    }

    pub fn override_database(&mut self, database: impl Into<String>) {
        let current = self.process_override.take().unwrap_or_default();
        self.process_override = Some(current.database(database));
    }

    pub fn override_collection(&mut self, collection: impl Into<String>) {
        let current = self.process_override.take().unwrap_or_default();
        self.process_override = Some(current.collection(collection));
    }

    pub fn reset_override(&mut self) {
        self.process_override = None;
    }

    pub fn current_override(&self) -> Option<&TargetOverride> {
        self.process_override.as_ref()
    }

    // ------------------------------------------------------------------
    // Target resolution
    // ------------------------------------------------------------------

    /// Where a write for `doc` would go right now.
    pub fn resolve_target<D: Document>(&self, doc: &D) -> Target {
        self.resolve_for::<D>(Some(&entity_key(doc)), None).0
    }

    /// Where a model-level operation on `D` would go right now.
    pub fn resolve_model_target<D: Document>(&self) -> Target {
        self.resolve_for::<D>(None, None).0
    }

    /// Resolve a target along with the innermost applicable runtime scope.
    /// `explicit` outranks that scope's override field by field.
    fn resolve_for<D: Document>(
        &self,
        key: Option<&str>,
        explicit: Option<&TargetOverride>,
    ) -> (Target, Option<&TargetScope>) {
        let scope = self
            .scopes
            .iter()
            .rev()
            .find(|scope| scope.key.applies_to(D::COLLECTION, key));

        let layered = match (explicit, scope) {
            (Some(explicit), Some(scope)) => Some(explicit.or(&scope.target_override)),
            (Some(explicit), None) => Some(explicit.clone()),
            (None, Some(scope)) => Some(scope.target_override.clone()),
            (None, None) => None,
        };

        let target = self.resolver.resolve(
            layered.as_ref(),
            self.process_override.as_ref(),
            &D::storage_options(),
            D::COLLECTION,
        );
        (target, scope)
    }

    // ------------------------------------------------------------------
    // Change notification
    // ------------------------------------------------------------------

    /// Apply an atomic operator to `doc` in memory and queue it.
    ///
    /// Inside an open context the change waits for that context to close.
    /// Otherwise it is flushed at once in an implicit single-change context.
    pub fn notify_field_changed<D: Document>(
        &mut self,
        doc: &mut D,
        path: &str,
        operator: Operator,
        operand: Value,
    ) -> Result<(), OdmError> {
        let change = FieldChange::new(path, operator, operand);
        let key = entity_key(doc);

        let implicit = self.depth(doc) == 0;
        if implicit {
            self.open(doc, AtomicOptions::new())?;
        }

        let recorded = self.record(&key, doc, change);
        if !implicit {
            return recorded;
        }
        match recorded {
            Ok(()) => self.close(doc, Outcome::Success),
            Err(err) => {
                self.close(doc, Outcome::Failure)?;
                Err(err)
            }
        }
    }

    fn record<D: Document>(&mut self, key: &str, doc: &mut D, change: FieldChange) -> Result<(), OdmError> {
        let context = self
            .stacks
            .get_mut(key)
            .and_then(ContextStack::top_mut)
            .ok_or_else(|| OdmError::NoActiveContext(key.to_string()))?;

        trace!(entity = %key, path = %change.path, operator = %change.operator, "recording change");
        context.record_change(doc.entity_mut(), change)
    }

    pub fn set<D: Document>(&mut self, doc: &mut D, path: &str, value: impl Into<Value>) -> Result<(), OdmError> {
        self.notify_field_changed(doc, path, Operator::Set, value.into())
    }

    pub fn inc<D: Document>(&mut self, doc: &mut D, path: &str, amount: impl Into<Value>) -> Result<(), OdmError> {
        self.notify_field_changed(doc, path, Operator::Inc, amount.into())
    }

    pub fn push<D: Document>(&mut self, doc: &mut D, path: &str, value: impl Into<Value>) -> Result<(), OdmError> {
        self.notify_field_changed(doc, path, Operator::Push, value.into())
    }

    pub fn pull<D: Document>(&mut self, doc: &mut D, path: &str, value: impl Into<Value>) -> Result<(), OdmError> {
        self.notify_field_changed(doc, path, Operator::Pull, value.into())
    }

    pub fn pull_all<D: Document>(&mut self, doc: &mut D, path: &str, values: Vec<Value>) -> Result<(), OdmError> {
        self.notify_field_changed(doc, path, Operator::PullAll, Value::Array(values))
    }

    pub fn add_to_set<D: Document>(&mut self, doc: &mut D, path: &str, value: impl Into<Value>) -> Result<(), OdmError> {
        self.notify_field_changed(doc, path, Operator::AddToSet, value.into())
    }

    /// `operation` is one of `and`, `or`, `xor`.
    pub fn bit<D: Document>(&mut self, doc: &mut D, path: &str, operation: &str, mask: i64) -> Result<(), OdmError> {
        let mut operand = Map::new();
        operand.insert(operation.to_string(), Value::from(mask));
        self.notify_field_changed(doc, path, Operator::Bit, Value::Object(operand))
    }

    /// Remove the last element (`1`) or the first (`-1`).
    pub fn pop<D: Document>(&mut self, doc: &mut D, path: &str, direction: i64) -> Result<(), OdmError> {
        self.notify_field_changed(doc, path, Operator::Pop, Value::from(direction))
    }

    pub fn rename<D: Document>(&mut self, doc: &mut D, path: &str, new_path: &str) -> Result<(), OdmError> {
        self.notify_field_changed(doc, path, Operator::Rename, Value::String(new_path.to_string()))
    }

    pub fn unset<D: Document>(&mut self, doc: &mut D, path: &str) -> Result<(), OdmError> {
        self.notify_field_changed(doc, path, Operator::Unset, Value::Bool(true))
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// Every change pending for `doc`, retained and open contexts alike,
    /// merged into one update document.
    pub fn snapshot<D: Document>(&self, doc: &D) -> Map<String, Value> {
        let Some(stack) = self.stacks.get(&entity_key(doc)) else {
            return Map::new();
        };
        let fields = doc.entity().fields();
        let mut merged = stack.retained().clone();
        for context in stack.contexts() {
            merged.merge(context.queue().clone(), fields);
        }
        merged.to_wire_operators()
    }

    /// Changes kept back by a failed flush, sent ahead of the next one.
    pub fn pending<D: Document>(&self, doc: &D) -> Map<String, Value> {
        self.stacks
            .get(&entity_key(doc))
            .map(|stack| stack.retained().to_wire_operators())
            .unwrap_or_default()
    }

    /// Number of open contexts for `doc`.
    pub fn depth<D: Document>(&self, doc: &D) -> usize {
        self.stacks
            .get(&entity_key(doc))
            .map(ContextStack::depth)
            .unwrap_or(0)
    }

    pub fn is_executing_atomically<D: Document>(&self, doc: &D) -> bool {
        self.depth(doc) > 0
    }

    fn retained_queue(&mut self, key: &str) -> AtomicQueue {
        self.stacks
            .get_mut(key)
            .map(ContextStack::take_retained)
            .unwrap_or_default()
    }

    fn drop_idle(&mut self, key: &str) {
        if self.stacks.get(key).is_some_and(ContextStack::is_idle) {
            self.stacks.remove(key);
        }
    }
}
