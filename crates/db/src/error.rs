use mongodb::error::ErrorKind;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures surfaced by a [`crate::DocumentStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid document id '{0}'")]
    InvalidId(String),

    #[error("document store unavailable: {0}")]
    Unavailable(#[source] BoxError),

    #[error("document rejected by store: {0}")]
    Rejected(#[source] BoxError),

    #[error("failed to convert document: {0}")]
    Serialization(String),

    #[error("document store error: {0}")]
    Other(#[source] BoxError),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        let unavailable = matches!(
            *err.kind,
            ErrorKind::Io(_)
                | ErrorKind::ServerSelection { .. }
                | ErrorKind::ConnectionPoolCleared { .. }
        );
        let rejected = matches!(
            *err.kind,
            ErrorKind::Write(_) | ErrorKind::Command(_) | ErrorKind::InsertMany(_)
        );
        let conversion = matches!(
            *err.kind,
            ErrorKind::BsonSerialization(_) | ErrorKind::BsonDeserialization(_)
        );

        if unavailable {
            Self::Unavailable(Box::new(err))
        } else if rejected {
            Self::Rejected(Box::new(err))
        } else if conversion {
            Self::Serialization(err.to_string())
        } else {
            Self::Other(Box::new(err))
        }
    }
}

impl From<mongodb::bson::ser::Error> for StoreError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
