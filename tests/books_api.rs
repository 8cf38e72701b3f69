use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use shelf_db::{
    DocumentDatabase, DocumentId, DocumentStore, Fields, FindOptions, IndexSpec, MemoryDatabase,
    StoreError, StoredDocument,
};
use shelf_kernel::settings::Settings;
use tower::ServiceExt;

fn test_app() -> Router {
    shelf_app::app(&Settings::default(), Arc::new(MemoryDatabase::new()))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create(app: &Router, book: Value) -> Value {
    let (status, body) = send(app, Method::POST, "/api/books", Some(book)).await;
    assert_eq!(status, StatusCode::OK, "create failed: {body}");
    body["data"].clone()
}

fn id_of(book: &Value) -> String {
    book["_id"].as_str().unwrap().to_string()
}

fn titles(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|book| book["title"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn create_then_get_returns_the_same_document() {
    let app = test_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/books",
        Some(json!({"title": "Dune", "genre": "scifi"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["message"], json!("Book created successfully"));
    assert!(body.get("error").is_none());
    let created = body["data"].clone();
    let id = id_of(&created);
    assert_eq!(id.len(), 24);
    assert_eq!(created, json!({"_id": id, "title": "Dune", "genre": "scifi"}));

    let (status, body) = send(&app, Method::GET, &format!("/api/books/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Book retrieved successfully"));
    assert_eq!(body["data"], created);
}

#[tokio::test]
async fn client_supplied_id_is_ignored() {
    let app = test_app();
    let forged = DocumentId::new().to_string();

    let created = create(&app, json!({"_id": forged, "title": "Dune"})).await;

    assert_ne!(id_of(&created), forged);
}

#[tokio::test]
async fn list_filters_by_genre() {
    let app = test_app();
    create(&app, json!({"title": "Dune", "genre": "scifi"})).await;
    create(&app, json!({"title": "SPQR", "genre": "history"})).await;
    create(&app, json!({"title": "Hyperion", "genre": "scifi"})).await;

    let (status, body) = send(&app, Method::GET, "/api/books?filter=scifi", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Books retrieved successfully"));
    assert_eq!(titles(&body), vec!["Dune", "Hyperion"]);
}

#[tokio::test]
async fn list_sorts_ascending_by_default_and_descending_on_request() {
    let app = test_app();
    for title in ["Hyperion", "Dune", "Solaris", "Anathem"] {
        create(&app, json!({"title": title})).await;
    }

    let (_, ascending) = send(&app, Method::GET, "/api/books?sortBy=title", None).await;
    assert_eq!(titles(&ascending), vec!["Anathem", "Dune", "Hyperion", "Solaris"]);

    let (_, explicit) = send(&app, Method::GET, "/api/books?sortBy=title&sort=asc", None).await;
    assert_eq!(titles(&explicit), titles(&ascending));

    let (_, descending) = send(&app, Method::GET, "/api/books?sortBy=title&sort=desc", None).await;
    assert_eq!(titles(&descending), vec!["Solaris", "Hyperion", "Dune", "Anathem"]);
}

#[tokio::test]
async fn list_limits_result_count() {
    let app = test_app();
    for n in 0..5 {
        create(&app, json!({"title": format!("Book {n}")})).await;
    }

    let (status, body) = send(&app, Method::GET, "/api/books?limit=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (_, everything) = send(&app, Method::GET, "/api/books", None).await;
    assert_eq!(everything["data"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn configured_default_limit_applies_without_limit_param() {
    let mut settings = Settings::default();
    settings.books.default_limit = Some(3);
    let app = shelf_app::app(&settings, Arc::new(MemoryDatabase::new()));
    for n in 0..5 {
        create(&app, json!({"title": format!("Book {n}")})).await;
    }

    let (_, body) = send(&app, Method::GET, "/api/books", None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let (_, body) = send(&app, Method::GET, "/api/books?limit=4", None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn list_of_empty_collection_is_an_empty_array() {
    let app = test_app();
    let (status, body) = send(&app, Method::GET, "/api/books?filter=poetry", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn invalid_list_parameters_are_client_errors() {
    let app = test_app();

    for (uri, field) in [
        ("/api/books?sortBy=title&sort=sideways", "sort"),
        ("/api/books?limit=abc", "limit"),
        ("/api/books?limit=0", "limit"),
    ] {
        let (status, body) = send(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["data"], Value::Null);
        assert_eq!(body["error"]["code"], json!("validation_failed"));
        assert_eq!(body["error"]["details"][0]["field"], json!(field));
    }
}

#[tokio::test]
async fn update_merges_only_the_given_fields() {
    let app = test_app();
    let created = create(&app, json!({"title": "Dune", "genre": "scifi", "year": 1965})).await;
    let id = id_of(&created);

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/books/{id}"),
        Some(json!({"genre": "classic"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Book updated successfully"));
    assert_eq!(
        body["data"],
        json!({"_id": id, "title": "Dune", "genre": "classic", "year": 1965})
    );

    let (_, fetched) = send(&app, Method::GET, &format!("/api/books/{id}"), None).await;
    assert_eq!(fetched["data"], body["data"]);
}

#[tokio::test]
async fn update_with_dotted_key_changes_the_nested_field() {
    let app = test_app();
    let created = create(
        &app,
        json!({"title": "Dune", "author": {"name": "Herbert", "born": 1920}}),
    )
    .await;
    let id = id_of(&created);

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/books/{id}"),
        Some(json!({"author.name": "F. Herbert"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({"_id": id, "title": "Dune", "author": {"name": "F. Herbert", "born": 1920}})
    );
}

#[tokio::test]
async fn empty_update_returns_current_document() {
    let app = test_app();
    let created = create(&app, json!({"title": "Dune"})).await;

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/books/{}", id_of(&created)),
        Some(json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], created);
}

#[tokio::test]
async fn delete_then_get_is_not_found_and_delete_is_idempotent() {
    let app = test_app();
    let created = create(&app, json!({"title": "Dune"})).await;
    let uri = format!("/api/books/{}", id_of(&created));

    let (status, body) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"success": true, "message": "Book deleted successfully", "data": null})
    );

    let (status, _) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    for _ in 0..2 {
        let (status, body) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["data"], Value::Null);
    }
}

#[tokio::test]
async fn unknown_ids_are_not_found_for_every_operation() {
    let app = test_app();
    let uri = format!("/api/books/{}", DocumentId::new());
    let expected = json!({"success": false, "message": "Book not found", "data": null});

    let (status, body) = send(&app, Method::GET, &uri, None).await;
    assert_eq!((status, body), (StatusCode::NOT_FOUND, expected.clone()));

    let (status, body) = send(&app, Method::PUT, &uri, Some(json!({"genre": "x"}))).await;
    assert_eq!((status, body), (StatusCode::NOT_FOUND, expected.clone()));

    let (status, body) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!((status, body), (StatusCode::NOT_FOUND, expected));
}

#[tokio::test]
async fn malformed_ids_are_server_errors() {
    let app = test_app();

    let requests = [
        (Method::GET, None),
        (Method::PUT, Some(json!({"genre": "x"}))),
        (Method::DELETE, None),
    ];
    for (method, body) in requests {
        let (status, body) = send(&app, method, "/api/books/not-an-id", body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["message"], json!("invalid identifier 'not-an-id'"));
        assert_eq!(body["error"]["code"], json!("validation_failed"));
    }
}

#[tokio::test]
async fn non_object_bodies_get_an_envelope() {
    let app = test_app();

    let (status, body) = send(&app, Method::POST, "/api/books", Some(json!(["Dune"]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"]["code"], json!("validation_failed"));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/books")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn scenario_create_then_filter() {
    let app = test_app();
    let created = create(&app, json!({"title": "Dune", "genre": "scifi"})).await;

    let (status, body) = send(&app, Method::GET, "/api/books?filter=scifi", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"], json!([created]));
}

/// Store whose every call fails as if the database were down.
struct DownStore;

#[async_trait]
impl DocumentStore for DownStore {
    fn collection_name(&self) -> &str {
        "books"
    }

    async fn insert(&self, _fields: Fields) -> Result<StoredDocument, StoreError> {
        Err(StoreError::Unavailable("connection refused (os error 111)".into()))
    }

    async fn find(&self, _options: &FindOptions) -> Result<Vec<StoredDocument>, StoreError> {
        Err(StoreError::Unavailable("connection refused (os error 111)".into()))
    }

    async fn find_by_id(&self, _id: DocumentId) -> Result<Option<StoredDocument>, StoreError> {
        Err(StoreError::Other("unexpected reply".into()))
    }

    async fn update_by_id(
        &self,
        _id: DocumentId,
        _fields: Fields,
    ) -> Result<Option<StoredDocument>, StoreError> {
        Err(StoreError::Unavailable("connection refused (os error 111)".into()))
    }

    async fn delete_by_id(&self, _id: DocumentId) -> Result<Option<StoredDocument>, StoreError> {
        Err(StoreError::Unavailable("connection refused (os error 111)".into()))
    }

    async fn ensure_index(&self, _index: &IndexSpec) -> Result<(), StoreError> {
        Ok(())
    }
}

struct DownDatabase;

#[async_trait]
impl DocumentDatabase for DownDatabase {
    fn backend(&self) -> &'static str {
        "down"
    }

    fn collection(&self, _name: &str) -> Arc<dyn DocumentStore> {
        Arc::new(DownStore)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused (os error 111)".into()))
    }
}

#[tokio::test]
async fn database_failures_are_opaque_server_errors() {
    let app = shelf_app::app(&Settings::default(), Arc::new(DownDatabase));
    let uri = format!("/api/books/{}", DocumentId::new());

    let cases = [
        (Method::POST, "/api/books".to_string(), Some(json!({"title": "Dune"})), "Book creation failed", "storage_unavailable"),
        (Method::GET, "/api/books".to_string(), None, "Book retrieval failed", "storage_unavailable"),
        (Method::GET, uri.clone(), None, "Book retrieval failed", "unknown"),
        (Method::PUT, uri.clone(), Some(json!({"genre": "x"})), "Book update failed", "storage_unavailable"),
        (Method::DELETE, uri, None, "Book deletion failed", "storage_unavailable"),
    ];

    for (method, uri, body, message, code) in cases {
        let (status, body) = send(&app, method, &uri, body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["message"], json!(message));
        assert_eq!(body["data"], Value::Null);
        assert_eq!(body["error"]["code"], json!(code));
        assert!(!body.to_string().contains("os error"));
    }
}

/// Store that answers writes only after a noticeable delay.
struct SlowStore {
    inner: Arc<dyn DocumentStore>,
    delay: Duration,
}

#[async_trait]
impl DocumentStore for SlowStore {
    fn collection_name(&self) -> &str {
        self.inner.collection_name()
    }

    async fn insert(&self, fields: Fields) -> Result<StoredDocument, StoreError> {
        let stored = self.inner.insert(fields).await?;
        tokio::time::sleep(self.delay).await;
        Ok(stored)
    }

    async fn find(&self, options: &FindOptions) -> Result<Vec<StoredDocument>, StoreError> {
        self.inner.find(options).await
    }

    async fn find_by_id(&self, id: DocumentId) -> Result<Option<StoredDocument>, StoreError> {
        self.inner.find_by_id(id).await
    }

    async fn update_by_id(
        &self,
        id: DocumentId,
        fields: Fields,
    ) -> Result<Option<StoredDocument>, StoreError> {
        let updated = self.inner.update_by_id(id, fields).await?;
        tokio::time::sleep(self.delay).await;
        Ok(updated)
    }

    async fn delete_by_id(&self, id: DocumentId) -> Result<Option<StoredDocument>, StoreError> {
        self.inner.delete_by_id(id).await
    }

    async fn ensure_index(&self, index: &IndexSpec) -> Result<(), StoreError> {
        self.inner.ensure_index(index).await
    }
}

struct SlowDatabase {
    inner: MemoryDatabase,
    delay: Duration,
}

#[async_trait]
impl DocumentDatabase for SlowDatabase {
    fn backend(&self) -> &'static str {
        "slow"
    }

    fn collection(&self, name: &str) -> Arc<dyn DocumentStore> {
        Arc::new(SlowStore {
            inner: self.inner.collection(name),
            delay: self.delay,
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn slow_writes_run_to_completion() {
    let app = shelf_app::app(
        &Settings::default(),
        Arc::new(SlowDatabase {
            inner: MemoryDatabase::new(),
            delay: Duration::from_millis(200),
        }),
    );

    let (status, body) = send(&app, Method::POST, "/api/books", Some(json!({"title": "Dune"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["message"], json!("Book created successfully"));
    let id = id_of(&body["data"]);

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/books/{id}"),
        Some(json!({"genre": "scifi"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"_id": id, "title": "Dune", "genre": "scifi"}));

    let (_, listed) = send(&app, Method::GET, "/api/books", None).await;
    assert_eq!(titles(&listed), vec!["Dune"]);
}
