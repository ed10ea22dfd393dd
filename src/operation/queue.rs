use serde_json::{json, Map, Value};

use super::apply::add_numbers;
use super::{FieldChange, Operator};
use crate::entity::path;

/// One pending operator on one field path, with its ordered operands.
#[derive(Debug, Clone, PartialEq)]
struct QueuedOperation {
    operator: Operator,
    path: String,
    operands: Vec<Value>,
}

impl QueuedOperation {
    fn from_change(change: FieldChange) -> Self {
        let operands = match (change.operator, change.operand) {
            (Operator::PullAll, Value::Array(items)) => items,
            (_, operand) => vec![operand],
        };
        QueuedOperation {
            operator: change.operator,
            path: change.path,
            operands,
        }
    }

    fn rename_target(&self) -> Option<&str> {
        match self.operator {
            Operator::Rename => self.operands.first().and_then(Value::as_str),
            _ => None,
        }
    }

    fn paths(&self) -> Vec<&str> {
        let mut paths = vec![self.path.as_str()];
        paths.extend(self.rename_target());
        paths
    }

    fn touches(&self, other: &str) -> bool {
        self.paths().into_iter().any(|p| path::overlaps(p, other))
    }

    /// Fold `change` into this entry. Returns false when the two cannot be
    /// expressed as one operand on the same field.
    fn coalesce(&mut self, change: &FieldChange) -> bool {
        if self.path != change.path || self.operator != change.operator {
            return false;
        }
        match self.operator {
            Operator::Set => {
                self.operands = vec![change.operand.clone()];
                true
            }
            Operator::Unset => true,
            Operator::Inc => match add_numbers(&self.operands[0], &change.operand) {
                Some(sum) => {
                    self.operands[0] = sum;
                    true
                }
                None => false,
            },
            Operator::Push | Operator::AddToSet | Operator::Pull => {
                self.operands.push(change.operand.clone());
                true
            }
            Operator::PullAll => match change.operand.as_array() {
                Some(items) => {
                    self.operands.extend(items.iter().cloned());
                    true
                }
                None => false,
            },
            Operator::Bit => merge_bit(&mut self.operands[0], &change.operand),
            Operator::Pop | Operator::Rename => false,
        }
    }

    fn wire_operand(&self) -> Value {
        match self.operator {
            Operator::Unset => Value::Bool(true),
            Operator::PullAll => Value::Array(self.operands.clone()),
            Operator::Push | Operator::AddToSet if self.operands.len() > 1 => {
                json!({ "$each": self.operands })
            }
            Operator::Pull if self.operands.len() > 1 => json!({ "$in": self.operands }),
            _ => self.operands[0].clone(),
        }
    }

    fn into_changes(self) -> Vec<FieldChange> {
        let QueuedOperation {
            operator,
            path,
            operands,
        } = self;
        match operator {
            Operator::Push | Operator::AddToSet | Operator::Pull => operands
                .into_iter()
                .map(|operand| FieldChange::new(path.clone(), operator, operand))
                .collect(),
            Operator::PullAll => vec![FieldChange::new(path, operator, Value::Array(operands))],
            _ => {
                let operand = operands.into_iter().next().unwrap_or(Value::Null);
                vec![FieldChange::new(path, operator, operand)]
            }
        }
    }
}

/// Combine bitwise masks when the result is order-equivalent: the same
/// operation as the last one folds, a new operation appends.
fn merge_bit(existing: &mut Value, incoming: &Value) -> bool {
    let (Some(current), Some(incoming)) = (existing.as_object(), incoming.as_object()) else {
        return false;
    };
    let mut merged = current.clone();
    for (name, mask) in incoming {
        let last = merged.keys().last().cloned();
        if last.as_deref() == Some(name.as_str()) {
            let (Some(a), Some(b)) = (merged[name].as_i64(), mask.as_i64()) else {
                return false;
            };
            let combined = match name.as_str() {
                "and" => a & b,
                "or" => a | b,
                "xor" => a ^ b,
                _ => return false,
            };
            merged.insert(name.clone(), Value::from(combined));
        } else if merged.contains_key(name) {
            return false;
        } else {
            merged.insert(name.clone(), mask.clone());
        }
    }
    *existing = Value::Object(merged);
    true
}

/// Pending atomic operators for one entity, ready to become one update command.
///
/// Entries never overlap: two queued operators never address the same path
/// or a path nested inside another. A change that cannot be coalesced with
/// an overlapping entry collapses everything involved into a `$set` (or
/// `$unset`) of the current in-memory value at the outermost path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AtomicQueue {
    kinds: Vec<Operator>,
    entries: Vec<QueuedOperation>,
}

impl AtomicQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of queued field operations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Record a change. `current` is the entity's in-memory state after the
    /// change was applied.
    pub fn record(&mut self, change: FieldChange, current: &Map<String, Value>) {
        let touched: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| change.affected_paths().into_iter().any(|p| entry.touches(p)))
            .map(|(index, _)| index)
            .collect();

        match touched.as_slice() {
            [] => self.push(QueuedOperation::from_change(change)),
            [index] if self.entries[*index].coalesce(&change) => {}
            _ => self.materialize(&change, &touched, current),
        }
    }

    /// Fold another queue into this one, in its recorded order, using the
    /// same collapsing rules as `record`.
    pub fn merge(&mut self, other: AtomicQueue, current: &Map<String, Value>) {
        for entry in other.entries {
            for change in entry.into_changes() {
                self.record(change, current);
            }
        }
    }

    /// Render the queue as an update document: one group per operator kind,
    /// in the order the kinds were first touched.
    pub fn to_wire_operators(&self) -> Map<String, Value> {
        let mut wire = Map::new();
        for kind in &self.kinds {
            let group: Map<String, Value> = self
                .entries
                .iter()
                .filter(|entry| entry.operator == *kind)
                .map(|entry| (entry.path.clone(), entry.wire_operand()))
                .collect();
            if !group.is_empty() {
                wire.insert(kind.wire_name().to_string(), Value::Object(group));
            }
        }
        wire
    }

    /// Every path a flush of this queue writes to.
    pub fn paths(&self) -> Vec<String> {
        self.entries
            .iter()
            .flat_map(|entry| entry.paths())
            .map(str::to_string)
            .collect()
    }

    /// Operator kinds with at least one entry, in first-touched order.
    pub fn operators(&self) -> Vec<Operator> {
        self.kinds
            .iter()
            .copied()
            .filter(|kind| self.entries.iter().any(|entry| entry.operator == *kind))
            .collect()
    }

    pub fn clear(&mut self) {
        self.kinds.clear();
        self.entries.clear();
    }

    fn push(&mut self, entry: QueuedOperation) {
        if !self.kinds.contains(&entry.operator) {
            self.kinds.push(entry.operator);
        }
        self.entries.push(entry);
    }

    fn materialize(&mut self, change: &FieldChange, touched: &[usize], current: &Map<String, Value>) {
        let mut candidates: Vec<String> = change.affected_paths().into_iter().map(str::to_string).collect();
        for index in touched {
            candidates.extend(self.entries[*index].paths().into_iter().map(str::to_string));
        }

        let mut roots: Vec<String> = Vec::new();
        for candidate in &candidates {
            let covered = candidates
                .iter()
                .any(|other| path::is_ancestor(other, candidate));
            if !covered && !roots.contains(candidate) {
                roots.push(candidate.clone());
            }
        }

        self.entries
            .retain(|entry| !roots.iter().any(|root| entry.touches(root)));

        for root in roots {
            let replacement = match path::get(current, &root) {
                Some(value) => FieldChange::set(root, value.clone()),
                None => FieldChange::unset(root),
            };
            self.push(QueuedOperation::from_change(replacement));
        }
    }
}
