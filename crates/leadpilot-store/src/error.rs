use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("lead with email {0} already exists")]
    DuplicateEmail(String),

    #[error("lead {0} not found")]
    LeadNotFound(i64),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("storage task panicked: {0}")]
    Task(#[from] tokio::task::JoinError),
}
