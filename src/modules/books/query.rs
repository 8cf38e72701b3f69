//! Typed list query built from the raw `filter`/`sortBy`/`sort`/`limit` parameters.

use serde_json::json;
use shelf_db::{FindOptions, SortDirection};
use shelf_http::error::ApiError;
use thiserror::Error;

use super::models::{ListParams, GENRE_FIELD};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

/// Validated list options. Empty parameter values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub genre: Option<String>,
    pub sort: Option<SortSpec>,
    pub limit: Option<u64>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ListQueryError {
    #[error("invalid sort direction '{0}'; expected 'asc' or 'desc'")]
    InvalidSortDirection(String),

    #[error("invalid limit '{0}'; expected a positive integer")]
    InvalidLimit(String),
}

impl ListQueryError {
    /// Query parameter the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            ListQueryError::InvalidSortDirection(_) => "sort",
            ListQueryError::InvalidLimit(_) => "limit",
        }
    }
}

impl From<ListQueryError> for ApiError {
    fn from(err: ListQueryError) -> Self {
        ApiError::validation(
            vec![json!({"field": err.field(), "error": err.to_string()})],
            err.to_string(),
        )
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_direction(raw: Option<String>) -> Result<SortDirection, ListQueryError> {
    match raw.as_deref() {
        None | Some("asc") => Ok(SortDirection::Ascending),
        Some("desc") => Ok(SortDirection::Descending),
        Some(other) => Err(ListQueryError::InvalidSortDirection(other.to_string())),
    }
}

fn parse_limit(raw: Option<String>, default_limit: Option<u64>) -> Result<Option<u64>, ListQueryError> {
    let Some(raw) = raw else {
        return Ok(default_limit);
    };
    match raw.trim().parse::<u64>() {
        Ok(limit) if limit > 0 => Ok(Some(limit)),
        _ => Err(ListQueryError::InvalidLimit(raw)),
    }
}

impl ListQuery {
    /// Validate raw parameters; `default_limit` applies when `limit` is absent.
    pub fn parse(params: ListParams, default_limit: Option<u64>) -> Result<Self, ListQueryError> {
        // Direction is validated even when there is no sort field to apply it to.
        let direction = parse_direction(non_empty(params.sort))?;
        let limit = parse_limit(non_empty(params.limit), default_limit)?;

        Ok(Self {
            genre: non_empty(params.filter),
            sort: non_empty(params.sort_by).map(|field| SortSpec { field, direction }),
            limit,
        })
    }

    pub fn to_find_options(&self) -> FindOptions {
        let mut options = FindOptions::new();
        if let Some(genre) = &self.genre {
            options = options.equals(GENRE_FIELD, genre.as_str());
        }
        if let Some(sort) = &self.sort {
            options = options.sort(sort.field.as_str(), sort.direction);
        }
        if let Some(limit) = self.limit {
            options = options.limit(limit);
        }
        options
    }
}
