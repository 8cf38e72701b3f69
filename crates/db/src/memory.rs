//! In-process backend with MongoDB-like query semantics.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::document::{DocumentId, Fields, StoredDocument, ID_FIELD};
use crate::error::StoreError;
use crate::query::{FindOptions, IndexSpec, SortDirection};
use crate::store::{DocumentDatabase, DocumentStore};

/// Collections keyed by name, created on first use.
#[derive(Default)]
pub struct MemoryDatabase {
    collections: Mutex<HashMap<String, Arc<MemoryStore>>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concrete handle to a collection, for inspection in tests.
    pub fn store(&self, name: &str) -> Arc<MemoryStore> {
        let mut collections = self
            .collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryStore::new(name)))
            .clone()
    }
}

#[async_trait]
impl DocumentDatabase for MemoryDatabase {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn collection(&self, name: &str) -> Arc<dyn DocumentStore> {
        self.store(name)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Documents kept in insertion order.
pub struct MemoryStore {
    name: String,
    documents: RwLock<Vec<StoredDocument>>,
    indexes: RwLock<Vec<IndexSpec>>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: RwLock::new(Vec::new()),
            indexes: RwLock::new(Vec::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    pub async fn index_names(&self) -> Vec<String> {
        self.indexes
            .read()
            .await
            .iter()
            .map(|index| index.name.clone())
            .collect()
    }
}

/// Equality as MongoDB applies it: arrays match when any element is equal.
fn matches_value(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        Some(Value::Array(items)) if !expected.is_array() => items.contains(expected),
        Some(value) => value == expected,
        None => expected.is_null(),
    }
}

/// Position of a JSON type in MongoDB's cross-type sort order. Missing sorts as null.
fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            let a = a.as_f64().unwrap_or(f64::NAN);
            let b = b.as_f64().unwrap_or(f64::NAN);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(Value::Array(a)), Some(Value::Array(b))) => a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| compare_values(Some(x), Some(y)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        _ => type_rank(left).cmp(&type_rank(right)),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn collection_name(&self) -> &str {
        &self.name
    }

    async fn insert(&self, fields: Fields) -> Result<StoredDocument, StoreError> {
        let document = StoredDocument::new(DocumentId::new(), fields);
        self.documents.write().await.push(document.clone());
        Ok(document)
    }

    async fn find(&self, options: &FindOptions) -> Result<Vec<StoredDocument>, StoreError> {
        let documents = self.documents.read().await;

        let mut matched: Vec<StoredDocument> = documents
            .iter()
            .filter(|doc| {
                options
                    .equals
                    .iter()
                    .all(|(field, value)| matches_value(doc.lookup(field).as_ref(), value))
            })
            .cloned()
            .collect();

        if let Some((field, direction)) = &options.sort {
            // Stable sort: ties keep insertion order.
            matched.sort_by(|a, b| {
                let ordering = compare_values(a.lookup(field).as_ref(), b.lookup(field).as_ref());
                match direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = options.limit {
            matched.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }

        Ok(matched)
    }

    async fn find_by_id(&self, id: DocumentId) -> Result<Option<StoredDocument>, StoreError> {
        let documents = self.documents.read().await;
        Ok(documents.iter().find(|doc| doc.id == id).cloned())
    }

    async fn update_by_id(
        &self,
        id: DocumentId,
        fields: Fields,
    ) -> Result<Option<StoredDocument>, StoreError> {
        let mut documents = self.documents.write().await;
        let Some(document) = documents.iter_mut().find(|doc| doc.id == id) else {
            return Ok(None);
        };

        // Applied to a copy so a rejected path leaves the stored document untouched.
        let mut updated = document.clone();
        for (key, value) in fields {
            if key != ID_FIELD {
                updated.set(&key, value)?;
            }
        }
        *document = updated;

        Ok(Some(document.clone()))
    }

    async fn delete_by_id(&self, id: DocumentId) -> Result<Option<StoredDocument>, StoreError> {
        let mut documents = self.documents.write().await;
        let removed = documents
            .iter()
            .position(|doc| doc.id == id)
            .map(|position| documents.remove(position));
        Ok(removed)
    }

    async fn ensure_index(&self, index: &IndexSpec) -> Result<(), StoreError> {
        let mut indexes = self.indexes.write().await;
        if !indexes.iter().any(|existing| existing.name == index.name) {
            indexes.push(index.clone());
        }
        Ok(())
    }
}
