//! Lenient field accessors for loosely typed documents.
//!
//! Documents written by older clients store numbers as floats and use
//! alternate key names, so every accessor accepts a list of keys and returns
//! the first value with a usable type.

use crate::store::Document;
use serde_json::Value;

pub(crate) fn str_field(doc: &Document, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| doc.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

pub(crate) fn i64_field(doc: &Document, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| match doc.get(*key)? {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|value| value as i64)),
        _ => None,
    })
}

pub(crate) fn bool_field(doc: &Document, keys: &[&str]) -> Option<bool> {
    keys.iter()
        .find_map(|key| doc.get(*key).and_then(Value::as_bool))
}

pub(crate) fn string_list_field(doc: &Document, key: &str) -> Vec<String> {
    match doc.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn optional_i64(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::from)
}
