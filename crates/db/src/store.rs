use std::sync::Arc;

use async_trait::async_trait;

use crate::document::{DocumentId, Fields, StoredDocument};
use crate::error::StoreError;
use crate::query::{FindOptions, IndexSpec};

/// One collection of schema-flexible documents.
///
/// Lookups by id return `Ok(None)` when nothing matches; a miss is not an error.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn collection_name(&self) -> &str;

    /// Insert `fields` under a freshly assigned identifier.
    async fn insert(&self, fields: Fields) -> Result<StoredDocument, StoreError>;

    async fn find(&self, options: &FindOptions) -> Result<Vec<StoredDocument>, StoreError>;

    async fn find_by_id(&self, id: DocumentId) -> Result<Option<StoredDocument>, StoreError>;

    /// Set each of `fields` on the document and return it as it is after the update.
    async fn update_by_id(
        &self,
        id: DocumentId,
        fields: Fields,
    ) -> Result<Option<StoredDocument>, StoreError>;

    /// Remove the document, returning what was removed.
    async fn delete_by_id(&self, id: DocumentId) -> Result<Option<StoredDocument>, StoreError>;

    async fn ensure_index(&self, index: &IndexSpec) -> Result<(), StoreError>;
}

/// A database handle that hands out collection stores.
#[async_trait]
pub trait DocumentDatabase: Send + Sync {
    /// Short backend name used in logs and readiness output.
    fn backend(&self) -> &'static str;

    fn collection(&self, name: &str) -> Arc<dyn DocumentStore>;

    async fn ping(&self) -> Result<(), StoreError>;
}
