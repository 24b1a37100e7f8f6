use shared::error::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid backend url: {0}")]
    Url(#[from] url::ParseError),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl ClientError {
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_relevance_rejection(&self) -> bool {
        self.api().is_some_and(ApiError::is_relevance_rejection)
    }

    pub fn is_quota_exceeded(&self) -> bool {
        self.api().is_some_and(ApiError::is_quota_exceeded)
    }

    /// The local session has already been cleared when this is true.
    pub fn requires_reauth(&self) -> bool {
        self.api().is_some_and(ApiError::is_unauthorized)
    }
}
