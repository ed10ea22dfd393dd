//! Dot-separated field paths over JSON documents.
//!
//! `"address.city"` addresses a nested object field; numeric segments
//! (`"tags.0"`) address array elements.

use serde_json::{Map, Value};

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.')
}

/// True when `a` and `b` address the same value or one contains the other.
pub fn overlaps(a: &str, b: &str) -> bool {
    a == b || is_ancestor(a, b) || is_ancestor(b, a)
}

/// True when `ancestor` is a strict prefix of `path` at a segment boundary.
pub fn is_ancestor(ancestor: &str, path: &str) -> bool {
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'.'
}

pub fn get<'a>(fields: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = segments(path);
    let mut current = fields.get(parts.next()?)?;
    for part in parts {
        current = child(current, part)?;
    }
    Some(current)
}

fn child<'a>(value: &'a Value, part: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(part),
        Value::Array(items) => items.get(part.parse::<usize>().ok()?),
        _ => None,
    }
}

fn child_mut<'a>(value: &'a mut Value, part: &str) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(part),
        Value::Array(items) => items.get_mut(part.parse::<usize>().ok()?),
        _ => None,
    }
}

pub fn get_mut<'a>(fields: &'a mut Map<String, Value>, path: &str) -> Option<&'a mut Value> {
    let mut parts = segments(path);
    let mut current = fields.get_mut(parts.next()?)?;
    for part in parts {
        current = child_mut(current, part)?;
    }
    Some(current)
}

/// Write `value` at `path`, creating intermediate objects as needed.
///
/// Returns `Err` with the blocking path prefix when an intermediate value is
/// a scalar (or an array indexed out of bounds).
pub fn set(fields: &mut Map<String, Value>, path: &str, value: Value) -> Result<Option<Value>, String> {
    let (parent, last) = match path.rsplit_once('.') {
        Some((parent, last)) => (Some(parent), last),
        None => (None, path),
    };

    let container = match parent {
        None => return Ok(fields.insert(last.to_string(), value)),
        Some(parent) => ensure_container(fields, parent)?,
    };

    match container {
        Value::Object(map) => Ok(map.insert(last.to_string(), value)),
        Value::Array(items) => {
            let index = last
                .parse::<usize>()
                .map_err(|_| format!("`{}` is not an array index", last))?;
            if index < items.len() {
                Ok(Some(std::mem::replace(&mut items[index], value)))
            } else if index == items.len() {
                items.push(value);
                Ok(None)
            } else {
                Err(format!("index {} is out of bounds", index))
            }
        }
        _ => Err(format!("`{}` is not a document", parent.unwrap_or_default())),
    }
}

fn ensure_container<'a>(fields: &'a mut Map<String, Value>, path: &str) -> Result<&'a mut Value, String> {
    let mut parts = segments(path);
    let first = parts.next().unwrap_or_default();
    let mut current = fields
        .entry(first.to_string())
        .or_insert_with(|| Value::Object(Map::new()));

    let mut walked = first.to_string();
    for part in parts {
        walked.push('.');
        walked.push_str(part);
        let parent = current;
        current = match parent {
            Value::Object(map) => map
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            Value::Array(items) => {
                let index = part
                    .parse::<usize>()
                    .map_err(|_| format!("`{}` is not an array index", walked))?;
                items
                    .get_mut(index)
                    .ok_or_else(|| format!("index {} is out of bounds", index))?
            }
            _ => return Err(format!("`{}` is not a document", walked)),
        };
    }
    Ok(current)
}

/// Remove the value at `path`. Array elements are removed by index.
pub fn remove(fields: &mut Map<String, Value>, path: &str) -> Option<Value> {
    match path.rsplit_once('.') {
        None => fields.shift_remove(path),
        Some((parent, last)) => match get_mut(fields, parent)? {
            Value::Object(map) => map.shift_remove(last),
            Value::Array(items) => {
                let index = last.parse::<usize>().ok()?;
                (index < items.len()).then(|| items.remove(index))
            }
            _ => None,
        },
    }
}

/// Restore `path` to `value`, removing it when `value` is `None`.
pub fn restore(fields: &mut Map<String, Value>, path: &str, value: Option<Value>) {
    match value {
        Some(value) => {
            let _ = set(fields, path, value);
        }
        None => {
            remove(fields, path);
        }
    }
}
