//! Per-exchange scratch storage shared between pipeline stages.
//!
//! Each middleware stores its intermediate data under a namespace, a
//! dotted key denoting nesting, e.g. an authentication stage might write
//! `auth.user_id`. The IO pipeline's own payload and status live in
//! dedicated slots rather than the generic map, so their types are known
//! to the response stage.
//!
//! Write semantics:
//!
//! - `set(ns, None)` deletes the namespace.
//! - an object written into an existing object merges (deep,
//!   non-destructive union; the incoming value wins on scalar collisions).
//! - anything else replaces, creating intermediate objects as needed.

use crate::status::Status;
use serde_json::{Map, Value};

/// Namespaced key/value storage attached to an [`Exchange`](crate::Exchange).
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Locals {
    entries: Map<String, Value>,
    io_data: Option<Value>,
    io_status: Option<Status>,
}

impl Locals {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the value stored under `namespace`, following dotted paths.
    #[must_use]
    pub fn get(&self, namespace: &str) -> Option<&Value> {
        let mut segments = namespace.split('.');
        let first = segments.next()?;
        let mut current = self.entries.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Reads the value stored under `namespace`, or `default` when absent.
    #[must_use]
    pub fn get_or<'a>(&'a self, namespace: &str, default: &'a Value) -> &'a Value {
        self.get(namespace).unwrap_or(default)
    }

    /// Writes `value` under `namespace`.
    ///
    /// `None` deletes the namespace. An object written over an existing
    /// object merges; any other combination replaces. Intermediate path
    /// segments are created (or overwritten when they hold non-objects).
    /// Namespace well-formedness is not validated.
    pub fn set(&mut self, namespace: &str, value: Option<Value>) -> &mut Self {
        match value {
            None => unset_path(&mut self.entries, namespace),
            Some(value) => set_path(&mut self.entries, namespace, value),
        }
        self
    }

    /// Returns the IO payload slot.
    #[must_use]
    pub fn io_data(&self) -> Option<&Value> {
        self.io_data.as_ref()
    }

    /// Writes the IO payload slot.
    pub fn set_io_data(&mut self, data: Option<Value>) {
        self.io_data = data;
    }

    /// Returns a mutable borrow of the IO payload slot.
    pub fn io_data_mut(&mut self) -> &mut Option<Value> {
        &mut self.io_data
    }

    /// Returns the IO status slot.
    #[must_use]
    pub fn io_status(&self) -> Option<Status> {
        self.io_status
    }

    /// Writes the IO status slot.
    pub fn set_io_status(&mut self, status: Option<Status>) {
        self.io_status = status;
    }
}

fn set_path(root: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(last) = segments.pop() else { return };

    let mut current = root;
    for segment in segments {
        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(map) = slot else {
            unreachable!("slot was just made an object")
        };
        current = map;
    }

    match current.get_mut(last) {
        Some(existing) if existing.is_object() && value.is_object() => {
            merge_values(existing, value);
        }
        _ => {
            current.insert(last.to_string(), value);
        }
    }
}

fn unset_path(root: &mut Map<String, Value>, path: &str) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(last) = segments.pop() else { return };

    let mut current = root;
    for segment in segments {
        match current.get_mut(segment).and_then(Value::as_object_mut) {
            Some(map) => current = map,
            None => return,
        }
    }
    current.remove(last);
}

/// Deep non-destructive union: objects merge recursively, everything else
/// is replaced by the incoming value.
pub(crate) fn merge_values(target: &mut Value, incoming: Value) {
    if !(target.is_object() && incoming.is_object()) {
        *target = incoming;
        return;
    }
    let Value::Object(target_map) = target else {
        unreachable!("checked above")
    };
    let Value::Object(incoming_map) = incoming else {
        unreachable!("checked above")
    };

    for (key, value) in incoming_map {
        match target_map.get_mut(&key) {
            Some(slot) => merge_values(slot, value),
            None => {
                target_map.insert(key, value);
            }
        }
    }
}
