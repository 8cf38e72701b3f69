use serde::Deserialize;

/// Open-schema book body as sent by clients and persisted as-is.
pub type BookFields = shelf_db::Fields;

/// Field the list `filter` parameter matches against.
pub const GENRE_FIELD: &str = "genre";

/// Raw list query string. Every value is kept as text so parse failures
/// surface as validation envelopes rather than extractor rejections.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub filter: Option<String>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<String>,
}
