//! Error types for the remote source, storage, and identifier handling.
//!
//! None of these cross into the presentation layer: orchestrators fold them
//! into a status value (`ListStatus`, `DetailStatus`) or log and drop them.

/// Failure of a remote data source call.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum SourceError {
    #[error("pokemon not found: {0}")]
    NotFound(String),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("response parse error: {0}")]
    Decode(String),
}

impl SourceError {
    /// Not-found is terminal; everything else may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SourceError::NotFound(_))
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Decode(err.to_string())
        } else {
            SourceError::Transport(err.to_string())
        }
    }
}

/// A list summary reference that does not name a pokemon resource.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("invalid PokeAPI URL: {0}")]
    UnrecognizedUrl(String),
}

/// Rejected id-or-name input; no query is issued for it.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("empty pokemon identifier")]
    Empty,
    #[error("invalid pokemon identifier: {0:?}")]
    InvalidCharacters(String),
}

/// Durable storage failure.
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize envelope: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Persisted or cross-tab payload that could not be decoded.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("schema version {found} does not match {expected}")]
    VersionMismatch { found: u32, expected: u32 },
}

/// Why a list page could not be assembled.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum PageError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Identifier(#[from] IdentifierError),
}
