use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response; `body` is the raw response text
    #[error("{status} {body}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Validation(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }

    /// The `detail` field of a JSON error body, falling back to the raw text
    pub fn detail(&self) -> Option<String> {
        let Self::Status { body, .. } = self else {
            return None;
        };
        let parsed = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string));
        Some(parsed.unwrap_or_else(|| body.clone()))
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
