//! MongoDB backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::options::{ClientOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};
use serde_json::Value;

use crate::document::{DocumentId, Fields, StoredDocument, ID_FIELD};
use crate::error::StoreError;
use crate::query::{FindOptions, IndexSpec};
use crate::store::{DocumentDatabase, DocumentStore};

/// Connection parameters for [`MongoDatabase::connect`].
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    pub uri: String,
    pub database: String,
    pub app_name: Option<String>,
    pub connect_timeout: Duration,
    pub server_selection_timeout: Duration,
}

/// Shared MongoDB client bound to one database. The driver pools connections internally.
#[derive(Clone, Debug)]
pub struct MongoDatabase {
    database: Database,
}

impl MongoDatabase {
    pub async fn connect(config: &ConnectConfig) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(&config.uri).await?;
        if let Some(app_name) = &config.app_name {
            options.app_name = Some(app_name.clone());
        }
        options.connect_timeout = Some(config.connect_timeout);
        options.server_selection_timeout = Some(config.server_selection_timeout);

        let client = Client::with_options(options)?;
        let database = client.database(&config.database);

        tracing::info!(
            target: "shelf-db",
            database = %config.database,
            "mongodb client created"
        );

        Ok(Self { database })
    }
}

#[async_trait]
impl DocumentDatabase for MongoDatabase {
    fn backend(&self) -> &'static str {
        "mongo"
    }

    fn collection(&self, name: &str) -> Arc<dyn DocumentStore> {
        Arc::new(MongoStore {
            collection: self.database.collection::<Document>(name),
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}

/// A single MongoDB collection.
pub struct MongoStore {
    collection: Collection<Document>,
}

fn id_filter(id: DocumentId) -> Document {
    doc! { ID_FIELD: id.object_id() }
}

fn to_bson_document(fields: &Fields) -> Result<Document, StoreError> {
    let mut document = bson::to_document(fields)?;
    document.remove(ID_FIELD);
    Ok(document)
}

fn from_bson_document(mut document: Document) -> Result<StoredDocument, StoreError> {
    let id = match document.remove(ID_FIELD) {
        Some(Bson::ObjectId(oid)) => DocumentId::from(oid),
        other => {
            return Err(StoreError::Serialization(format!(
                "expected an ObjectId {ID_FIELD}, found {other:?}"
            )))
        }
    };

    let Value::Object(fields) = Bson::Document(document).into_relaxed_extjson() else {
        return Err(StoreError::Serialization(
            "document did not convert to a JSON object".to_string(),
        ));
    };

    Ok(StoredDocument::new(id, fields))
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn collection_name(&self) -> &str {
        self.collection.name()
    }

    async fn insert(&self, fields: Fields) -> Result<StoredDocument, StoreError> {
        let id = DocumentId::new();
        let mut document = doc! { ID_FIELD: id.object_id() };
        for (key, value) in to_bson_document(&fields)? {
            document.insert(key, value);
        }

        self.collection.insert_one(document).await?;

        Ok(StoredDocument::new(id, fields))
    }

    async fn find(&self, options: &FindOptions) -> Result<Vec<StoredDocument>, StoreError> {
        let mut filter = Document::new();
        for (field, value) in &options.equals {
            filter.insert(field.clone(), bson::to_bson(value)?);
        }

        let mut find = self.collection.find(filter);
        if let Some((field, direction)) = &options.sort {
            let mut sort = Document::new();
            sort.insert(field.clone(), direction.as_i32());
            find = find.sort(sort);
        }
        if let Some(limit) = options.limit {
            find = find.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let documents: Vec<Document> = find.await?.try_collect().await?;
        documents.into_iter().map(from_bson_document).collect()
    }

    async fn find_by_id(&self, id: DocumentId) -> Result<Option<StoredDocument>, StoreError> {
        self.collection
            .find_one(id_filter(id))
            .await?
            .map(from_bson_document)
            .transpose()
    }

    async fn update_by_id(
        &self,
        id: DocumentId,
        fields: Fields,
    ) -> Result<Option<StoredDocument>, StoreError> {
        let set = to_bson_document(&fields)?;
        // MongoDB rejects an empty $set; nothing to change means a plain read.
        if set.is_empty() {
            return self.find_by_id(id).await;
        }

        self.collection
            .find_one_and_update(id_filter(id), doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await?
            .map(from_bson_document)
            .transpose()
    }

    async fn delete_by_id(&self, id: DocumentId) -> Result<Option<StoredDocument>, StoreError> {
        self.collection
            .find_one_and_delete(id_filter(id))
            .await?
            .map(from_bson_document)
            .transpose()
    }

    async fn ensure_index(&self, index: &IndexSpec) -> Result<(), StoreError> {
        let mut keys = Document::new();
        for (field, direction) in &index.keys {
            keys.insert(field.clone(), direction.as_i32());
        }

        let options = IndexOptions::builder().name(index.name.clone()).build();
        let model = IndexModel::builder().keys(keys).options(options).build();

        self.collection.create_index(model).await?;

        tracing::info!(
            target: "shelf-db",
            collection = %self.collection.name(),
            index = %index.name,
            "index ensured"
        );
        Ok(())
    }
}
