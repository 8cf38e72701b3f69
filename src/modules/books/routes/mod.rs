//! HTTP handlers for the books resource.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    routing::get,
    Json, Router,
};
use shelf_db::{DocumentId, DocumentStore, StoredDocument};
use shelf_http::{error::ApiError, response::Envelope};

use super::models::{BookFields, ListParams};
use super::query::ListQuery;

const NOT_FOUND: &str = "Book not found";

/// Shared handler state; cloned per request.
#[derive(Clone)]
pub struct BooksState {
    pub store: Arc<dyn DocumentStore>,
    pub default_limit: Option<u64>,
}

pub fn router(state: BooksState) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route(
            "/{book_id}",
            get(get_book).put(update_book).delete(delete_book),
        )
        .with_state(state)
}

fn parse_id(path: Result<Path<String>, PathRejection>) -> Result<DocumentId, ApiError> {
    let Path(raw) = path?;
    raw.parse::<DocumentId>()
        .map_err(|err| ApiError::from_store(err, "invalid book id"))
}

async fn create_book(
    State(state): State<BooksState>,
    body: Result<Json<BookFields>, JsonRejection>,
) -> Result<Envelope<StoredDocument>, ApiError> {
    let Json(fields) = body?;

    let book = state
        .store
        .insert(fields)
        .await
        .map_err(|err| ApiError::from_store(err, "Book creation failed"))?;

    tracing::info!(book_id = %book.id, "book created");
    Ok(Envelope::ok("Book created successfully", book))
}

async fn list_books(
    State(state): State<BooksState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Envelope<Vec<StoredDocument>>, ApiError> {
    let Query(params) = params?;
    let query = ListQuery::parse(params, state.default_limit)?;

    let books = state
        .store
        .find(&query.to_find_options())
        .await
        .map_err(|err| ApiError::from_store(err, "Book retrieval failed"))?;

    tracing::debug!(count = books.len(), ?query, "books listed");
    Ok(Envelope::ok("Books retrieved successfully", books))
}

async fn get_book(
    State(state): State<BooksState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Envelope<StoredDocument>, ApiError> {
    let id = parse_id(path)?;

    state
        .store
        .find_by_id(id)
        .await
        .map_err(|err| ApiError::from_store(err, "Book retrieval failed"))?
        .map(|book| Envelope::ok("Book retrieved successfully", book))
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))
}

async fn update_book(
    State(state): State<BooksState>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<BookFields>, JsonRejection>,
) -> Result<Envelope<StoredDocument>, ApiError> {
    let id = parse_id(path)?;
    let Json(fields) = body?;

    let book = state
        .store
        .update_by_id(id, fields)
        .await
        .map_err(|err| ApiError::from_store(err, "Book update failed"))?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;

    tracing::info!(book_id = %book.id, "book updated");
    Ok(Envelope::ok("Book updated successfully", book))
}

async fn delete_book(
    State(state): State<BooksState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Envelope<()>, ApiError> {
    let id = parse_id(path)?;

    let removed = state
        .store
        .delete_by_id(id)
        .await
        .map_err(|err| ApiError::from_store(err, "Book deletion failed"))?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;

    tracing::info!(book_id = %removed.id, "book deleted");
    Ok(Envelope::ok_empty("Book deleted successfully"))
}
