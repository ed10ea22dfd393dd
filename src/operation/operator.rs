use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::OdmError;

/// The category of atomic mutation applied to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Set,
    Inc,
    Push,
    Pull,
    PullAll,
    AddToSet,
    Bit,
    Pop,
    Rename,
    Unset,
}

impl Operator {
    pub const ALL: [Operator; 10] = [
        Operator::Set,
        Operator::Inc,
        Operator::Push,
        Operator::Pull,
        Operator::PullAll,
        Operator::AddToSet,
        Operator::Bit,
        Operator::Pop,
        Operator::Rename,
        Operator::Unset,
    ];

    /// Name of the operator in an update command (`$set`, `$inc`, ...).
    pub fn wire_name(self) -> &'static str {
        match self {
            Operator::Set => "$set",
            Operator::Inc => "$inc",
            Operator::Push => "$push",
            Operator::Pull => "$pull",
            Operator::PullAll => "$pullAll",
            Operator::AddToSet => "$addToSet",
            Operator::Bit => "$bit",
            Operator::Pop => "$pop",
            Operator::Rename => "$rename",
            Operator::Unset => "$unset",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Operator> {
        Operator::ALL.into_iter().find(|op| op.wire_name() == name)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// One atomic mutation of a single field path.
///
/// Operand shapes:
/// - `Set`: the new value. `Unset`: ignored.
/// - `Inc`: a number.
/// - `Push`, `AddToSet`, `Pull`: a single element.
/// - `PullAll`: an array of elements.
/// - `Pop`: `1` (last element) or `-1` (first element).
/// - `Bit`: an object with `and`, `or` and/or `xor` integer keys.
/// - `Rename`: the destination path as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub path: String,
    pub operator: Operator,
    pub operand: Value,
}

impl FieldChange {
    pub fn new(path: impl Into<String>, operator: Operator, operand: Value) -> Self {
        FieldChange {
            path: path.into(),
            operator,
            operand,
        }
    }

    pub fn set(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(path, Operator::Set, value.into())
    }

    pub fn inc(path: impl Into<String>, amount: impl Into<Value>) -> Self {
        Self::new(path, Operator::Inc, amount.into())
    }

    pub fn unset(path: impl Into<String>) -> Self {
        Self::new(path, Operator::Unset, Value::Bool(true))
    }

    /// Destination path of a rename, if this is one.
    pub fn rename_target(&self) -> Option<&str> {
        match self.operator {
            Operator::Rename => self.operand.as_str(),
            _ => None,
        }
    }

    /// Every path whose value this change may modify.
    pub fn affected_paths(&self) -> Vec<&str> {
        let mut paths = vec![self.path.as_str()];
        if let Some(target) = self.rename_target() {
            paths.push(target);
        }
        paths
    }

    /// Decode one wire operator group (`{"$push": {...}}` style) into
    /// element-level changes, expanding `$each` and `$in` sequences.
    pub fn from_wire(operators: &Map<String, Value>) -> Result<Vec<FieldChange>, OdmError> {
        let mut changes = Vec::new();
        for (name, group) in operators {
            let operator = Operator::from_wire_name(name).ok_or_else(|| {
                OdmError::Serde(format!("unknown update operator `{}`", name))
            })?;
            let fields = group.as_object().ok_or_else(|| {
                OdmError::Serde(format!("operator `{}` expects a document", name))
            })?;

            for (path, operand) in fields {
                match sequence(operand, operator) {
                    Some(items) => {
                        for item in items {
                            changes.push(FieldChange::new(path.clone(), operator, item.clone()));
                        }
                    }
                    None => changes.push(FieldChange::new(path.clone(), operator, operand.clone())),
                }
            }
        }
        Ok(changes)
    }
}

/// The wrapped sequence of a `{"$each": [...]}` or `{"$in": [...]}` operand.
fn sequence(operand: &Value, operator: Operator) -> Option<&Vec<Value>> {
    let key = match operator {
        Operator::Push | Operator::AddToSet => "$each",
        Operator::Pull => "$in",
        _ => return None,
    };
    let object = operand.as_object()?;
    if object.len() != 1 {
        return None;
    }
    object.get(key)?.as_array()
}
