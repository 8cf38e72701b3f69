//! Document store crate for Shelf.
//!
//! Exposes a small collection-oriented abstraction ([`DocumentStore`]) with two
//! backends: MongoDB for deployments and an in-process store used by tests and
//! local runs.

pub mod document;
pub mod error;
pub mod memory;
pub mod mongo;
pub mod query;
pub mod store;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use document::{DocumentId, Fields, StoredDocument, ID_FIELD};
pub use error::StoreError;
pub use memory::{MemoryDatabase, MemoryStore};
pub use mongo::{ConnectConfig, MongoDatabase, MongoStore};
pub use query::{FindOptions, IndexSpec, SortDirection};
pub use store::{DocumentDatabase, DocumentStore};

/// Storage backend selected at startup.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Mongo,
    Memory,
}

/// Open the configured backend and return it behind the shared trait object.
pub async fn connect(
    backend: Backend,
    config: &ConnectConfig,
) -> Result<Arc<dyn DocumentDatabase>, StoreError> {
    match backend {
        Backend::Mongo => Ok(Arc::new(MongoDatabase::connect(config).await?)),
        Backend::Memory => {
            tracing::warn!(
                target: "shelf-db",
                "using in-memory document store; data is lost on shutdown"
            );
            Ok(Arc::new(MemoryDatabase::new()))
        }
    }
}
