use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Cancelled because the document changed or the app is shutting down.
    #[error("request aborted")]
    Aborted,
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        match self {
            ClientError::NotFound(_) => true,
            ClientError::Status { status, .. } => *status == 404,
            _ => false,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, ClientError::Aborted)
    }
}
