pub mod models;
pub mod query;
pub mod routes;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use shelf_db::{DocumentStore, IndexSpec, SortDirection};
use shelf_kernel::{settings::BooksSettings, InitCtx, Migration, Module};

use routes::BooksState;

/// Book records resource: create, list, get, update, and delete over one collection
pub struct BooksModule {
    state: BooksState,
}

impl BooksModule {
    pub fn new(store: Arc<dyn DocumentStore>, settings: &BooksSettings) -> Self {
        Self {
            state: BooksState {
                store,
                default_limit: settings.default_limit,
            },
        }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            backend = ctx.db.backend(),
            collection = self.state.store.collection_name(),
            default_limit = ?self.state.default_limit,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_genre_index",
            collection: self.state.store.collection_name().to_string(),
            index: IndexSpec::new("genre_1").key(models::GENRE_FIELD, SortDirection::Ascending),
        }]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

fn envelope_response(description: &str, data_schema: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": {
                    "allOf": [
                        { "$ref": "#/components/schemas/Envelope" },
                        { "type": "object", "properties": { "data": data_schema } }
                    ]
                }
            }
        }
    })
}

fn failure_responses(with_not_found: bool) -> serde_json::Value {
    let null_data = serde_json::json!({ "nullable": true });
    let mut responses = serde_json::json!({
        "400": envelope_response("Invalid query parameter or body", null_data.clone()),
        "500": envelope_response("Database failure or malformed identifier", null_data.clone())
    });
    if with_not_found {
        responses["404"] = envelope_response("Book not found", null_data);
    }
    responses
}

fn with_success(mut responses: serde_json::Value, description: &str, data: serde_json::Value) -> serde_json::Value {
    responses["200"] = envelope_response(description, data);
    responses
}

fn openapi_fragment() -> serde_json::Value {
    let book = serde_json::json!({ "$ref": "#/components/schemas/Book" });
    let book_body = serde_json::json!({
        "required": true,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/BookFields" }
            }
        }
    });
    let id_param = serde_json::json!({
        "name": "book_id",
        "in": "path",
        "required": true,
        "description": "Database-assigned identifier (24 hex characters)",
        "schema": { "type": "string" }
    });
    let query_param = |name: &str, description: &str, schema: serde_json::Value| {
        serde_json::json!({
            "name": name,
            "in": "query",
            "required": false,
            "description": description,
            "schema": schema
        })
    };

    serde_json::json!({
        "paths": {
            "/": {
                "get": {
                    "summary": "List books",
                    "tags": ["Books"],
                    "parameters": [
                        query_param("filter", "Only books whose genre equals this value", serde_json::json!({"type": "string"})),
                        query_param("sortBy", "Field to sort by", serde_json::json!({"type": "string"})),
                        query_param("sort", "Sort direction", serde_json::json!({"type": "string", "enum": ["asc", "desc"], "default": "asc"})),
                        query_param("limit", "Maximum number of books returned", serde_json::json!({"type": "integer", "minimum": 1}))
                    ],
                    "responses": with_success(
                        failure_responses(false),
                        "Matching books",
                        serde_json::json!({ "type": "array", "items": book.clone() })
                    )
                },
                "post": {
                    "summary": "Create a book",
                    "tags": ["Books"],
                    "requestBody": book_body.clone(),
                    "responses": with_success(failure_responses(false), "Created book", book.clone())
                }
            },
            "/{book_id}": {
                "parameters": [id_param],
                "get": {
                    "summary": "Get a book by id",
                    "tags": ["Books"],
                    "responses": with_success(failure_responses(true), "The book", book.clone())
                },
                "put": {
                    "summary": "Update fields of a book",
                    "tags": ["Books"],
                    "requestBody": book_body,
                    "responses": with_success(failure_responses(true), "Book after the update", book)
                },
                "delete": {
                    "summary": "Delete a book",
                    "tags": ["Books"],
                    "responses": with_success(
                        failure_responses(true),
                        "Book deleted",
                        serde_json::json!({ "nullable": true })
                    )
                }
            }
        },
        "components": {
            "schemas": {
                "BookFields": {
                    "type": "object",
                    "description": "Arbitrary book fields; stored as sent",
                    "properties": {
                        "title": { "type": "string" },
                        "genre": { "type": "string" }
                    },
                    "additionalProperties": true
                },
                "Book": {
                    "allOf": [
                        { "$ref": "#/components/schemas/BookFields" },
                        {
                            "type": "object",
                            "properties": {
                                "_id": {
                                    "type": "string",
                                    "description": "Database-assigned identifier"
                                }
                            },
                            "required": ["_id"]
                        }
                    ]
                }
            }
        }
    })
}

/// Create the books module over the given collection store
pub fn create_module(store: Arc<dyn DocumentStore>, settings: &BooksSettings) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(store, settings))
}
