use leadpilot_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutreachError {
    /// Message is the client-facing detail, e.g. `Lead not found`
    #[error("{0}")]
    NotFound(String),

    #[error("Lead with email {0} already exists")]
    DuplicateEmail(String),

    #[error("{0}")]
    Validation(String),

    #[error("delivery failed: {0:#}")]
    Delivery(anyhow::Error),

    #[error("storage error: {0}")]
    Store(StoreError),

    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

impl OutreachError {
    pub fn lead_not_found() -> Self {
        Self::NotFound("Lead not found".to_string())
    }
}

impl From<StoreError> for OutreachError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail(email) => Self::DuplicateEmail(email),
            StoreError::LeadNotFound(_) => Self::lead_not_found(),
            other => Self::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, OutreachError>;
