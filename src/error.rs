use thiserror::Error;

/// SQLSTATE for unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

/// A page request that ended pagination early.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("page {page} returned status {status}")]
    Status {
        page: u32,
        status: reqwest::StatusCode,
    },

    #[error("request for page {page} failed: {source}")]
    Transport {
        page: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("page {page} could not be decoded: {source}")]
    Decode {
        page: u32,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("rows already present (violates {constraint}); ingestion rolled back")]
    Conflict { constraint: String },

    #[error("database error during ingestion: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for IngestError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return IngestError::Conflict {
                    constraint: db_err.constraint().unwrap_or("primary key").to_string(),
                };
            }
        }
        IngestError::Database(err)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not connected to the database")]
    NotConnected,

    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),
}
