use std::fmt;
use std::str::FromStr;

use mongodb::bson::oid::ObjectId;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use crate::error::StoreError;

/// Key under which the store-assigned identifier is exposed.
pub const ID_FIELD: &str = "_id";

/// Open-schema document body: string keys mapped to arbitrary JSON values.
pub type Fields = Map<String, Value>;

/// Opaque, store-assigned document identifier (rendered as 24 hex characters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(ObjectId);

impl DocumentId {
    pub fn new() -> Self {
        Self(ObjectId::new())
    }

    pub fn object_id(&self) -> ObjectId {
        self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ObjectId> for DocumentId {
    fn from(oid: ObjectId) -> Self {
        Self(oid)
    }
}

impl FromStr for DocumentId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectId::parse_str(s)
            .map(Self)
            .map_err(|_| StoreError::InvalidId(s.to_string()))
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_hex())
    }
}

impl Serialize for DocumentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_hex())
    }
}

/// A document as persisted: its identifier plus the caller-supplied fields.
///
/// Serializes flat, with `_id` first: `{"_id": "...", "title": "..."}`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: DocumentId,
    pub fields: Fields,
}

impl StoredDocument {
    /// Build a document, dropping any `_id` the caller smuggled into `fields`.
    pub fn new(id: DocumentId, mut fields: Fields) -> Self {
        fields.remove(ID_FIELD);
        Self { id, fields }
    }

    /// Resolve a dotted field path (`"author.name"`) against this document.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        if path == ID_FIELD {
            return Some(Value::String(self.id.to_string()));
        }

        let mut segments = path.split('.');
        let mut current = self.fields.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current.clone())
    }

    /// Assign `value` at a dotted path with MongoDB `$set` semantics: missing
    /// objects along the path are created and numeric segments index into arrays.
    pub fn set(&mut self, path: &str, value: Value) -> Result<(), StoreError> {
        let segments: Vec<&str> = path.split('.').collect();
        if segments.iter().any(|segment| segment.is_empty() || segment.starts_with('$')) {
            return Err(rejected(format!("invalid update path '{path}'")));
        }
        if segments.len() > 1 && segments[0] == ID_FIELD {
            return Err(rejected(format!("field '{ID_FIELD}' is immutable")));
        }

        let Some((last, parents)) = segments.split_last() else {
            return Err(rejected(format!("invalid update path '{path}'")));
        };
        let Some((first, rest)) = parents.split_first() else {
            self.fields.insert(last.to_string(), value);
            return Ok(());
        };

        let mut slot = self
            .fields
            .entry(first.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        for segment in rest {
            slot = child_mut(slot, segment, path)?;
        }

        match slot {
            Value::Object(map) => {
                map.insert(last.to_string(), value);
            }
            Value::Array(items) => {
                let index = array_index(last, path)?;
                if index >= items.len() {
                    items.resize(index + 1, Value::Null);
                }
                items[index] = value;
            }
            other => return Err(cannot_create(last, other, path)),
        }
        Ok(())
    }
}

fn rejected(message: String) -> StoreError {
    StoreError::Rejected(message.into())
}

fn cannot_create(segment: &str, parent: &Value, path: &str) -> StoreError {
    rejected(format!(
        "cannot create field '{segment}' in element {parent} while setting '{path}'"
    ))
}

fn array_index(segment: &str, path: &str) -> Result<usize, StoreError> {
    segment
        .parse::<usize>()
        .map_err(|_| rejected(format!("cannot create field '{segment}' in an array while setting '{path}'")))
}

/// Step one segment down, creating the child when it is missing.
fn child_mut<'a>(slot: &'a mut Value, segment: &str, path: &str) -> Result<&'a mut Value, StoreError> {
    match slot {
        Value::Object(map) => Ok(map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()))),
        Value::Array(items) => {
            let index = array_index(segment, path)?;
            if index >= items.len() {
                items.resize(index, Value::Null);
                items.push(Value::Object(Map::new()));
            }
            Ok(&mut items[index])
        }
        other => Err(cannot_create(segment, other, path)),
    }
}

impl Serialize for StoredDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry(ID_FIELD, &self.id)?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
