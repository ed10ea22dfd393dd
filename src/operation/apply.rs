//! In-memory application of atomic operators.
//!
//! Shared by `Entity` (so in-memory state reflects queued changes
//! immediately) and by `InMemoryStore` (which applies decoded wire commands).

use serde_json::{Map, Number, Value};

use super::{FieldChange, Operator};
use crate::entity::path;
use crate::error::OdmError;

/// Apply one change to `fields`. On error `fields` is left untouched.
pub fn apply(fields: &mut Map<String, Value>, change: &FieldChange) -> Result<(), OdmError> {
    let path = change.path.as_str();
    let op = change.operator;
    if path.is_empty() || path.split('.').any(str::is_empty) {
        return Err(OdmError::invalid(path, op, "empty path segment"));
    }
    if path == "_id" || path.starts_with("_id.") {
        return Err(OdmError::invalid(path, op, "_id is immutable"));
    }

    match op {
        Operator::Set => write(fields, change, change.operand.clone()),
        Operator::Unset => {
            path::remove(fields, path);
            Ok(())
        }
        Operator::Inc => {
            let current = path::get(fields, path).cloned().unwrap_or(Value::from(0));
            let sum = add_numbers(&current, &change.operand)
                .ok_or_else(|| OdmError::invalid(path, op, "operands must be numbers"))?;
            write(fields, change, sum)
        }
        Operator::Bit => {
            let current = match path::get(fields, path) {
                None => 0,
                Some(value) => value
                    .as_i64()
                    .ok_or_else(|| OdmError::invalid(path, op, "field is not an integer"))?,
            };
            let result = bitwise(current, &change.operand).map_err(|reason| OdmError::invalid(path, op, reason))?;
            write(fields, change, Value::from(result))
        }
        Operator::Rename => {
            let target = change
                .rename_target()
                .ok_or_else(|| OdmError::invalid(path, op, "target must be a string"))?;
            if path::overlaps(path, target) {
                return Err(OdmError::invalid(path, op, "source and target overlap"));
            }
            if target == "_id" || target.starts_with("_id.") {
                return Err(OdmError::invalid(path, op, "_id is immutable"));
            }
            let Some(value) = path::get(fields, path).cloned() else {
                return Ok(());
            };
            let mut next = fields.clone();
            path::remove(&mut next, path);
            path::set(&mut next, target, value).map_err(|reason| OdmError::invalid(target, op, reason))?;
            *fields = next;
            Ok(())
        }
        Operator::Push
        | Operator::AddToSet
        | Operator::Pull
        | Operator::PullAll
        | Operator::Pop => apply_list(fields, change),
    }
}

fn write(fields: &mut Map<String, Value>, change: &FieldChange, value: Value) -> Result<(), OdmError> {
    path::set(fields, &change.path, value)
        .map(|_| ())
        .map_err(|reason| OdmError::invalid(&change.path, change.operator, reason))
}

fn apply_list(fields: &mut Map<String, Value>, change: &FieldChange) -> Result<(), OdmError> {
    let path = change.path.as_str();
    let op = change.operator;

    let mut items = match path::get(fields, path) {
        None if matches!(op, Operator::Push | Operator::AddToSet) => Vec::new(),
        None => return Ok(()),
        Some(Value::Array(items)) => items.clone(),
        Some(_) => return Err(OdmError::invalid(path, op, "field is not an array")),
    };

    match op {
        Operator::Push => items.push(change.operand.clone()),
        Operator::AddToSet => {
            if !items.contains(&change.operand) {
                items.push(change.operand.clone());
            }
        }
        Operator::Pull => items.retain(|item| item != &change.operand),
        Operator::PullAll => {
            let values = change
                .operand
                .as_array()
                .ok_or_else(|| OdmError::invalid(path, op, "operand must be an array"))?;
            items.retain(|item| !values.contains(item));
        }
        Operator::Pop => match change.operand.as_i64() {
            Some(1) => {
                items.pop();
            }
            Some(-1) => {
                if !items.is_empty() {
                    items.remove(0);
                }
            }
            _ => return Err(OdmError::invalid(path, op, "operand must be 1 or -1")),
        },
        _ => unreachable!("non-list operator routed to apply_list"),
    }

    write(fields, change, Value::Array(items))
}

/// Add two JSON numbers. Integers stay integral unless the sum overflows.
pub(crate) fn add_numbers(a: &Value, b: &Value) -> Option<Value> {
    let (a, b) = (a.as_number()?, b.as_number()?);
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Some(Value::from(sum));
        }
    }
    let sum = a.as_f64()? + b.as_f64()?;
    Number::from_f64(sum).map(Value::Number)
}

fn bitwise(mut current: i64, operand: &Value) -> Result<i64, String> {
    let ops = operand
        .as_object()
        .filter(|ops| !ops.is_empty())
        .ok_or("operand must be an object of and/or/xor")?;
    for (name, value) in ops {
        let mask = value
            .as_i64()
            .ok_or_else(|| format!("`{}` mask must be an integer", name))?;
        current = match name.as_str() {
            "and" => current & mask,
            "or" => current | mask,
            "xor" => current ^ mask,
            other => return Err(format!("unknown bitwise operation `{}`", other)),
        };
    }
    Ok(current)
}
