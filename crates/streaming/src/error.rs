/// Failures of a single fetch.
///
/// None of these reach the UI: the scheduler logs them and halts the session,
/// leaving whatever was already shown in place.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Transport failure or a non-success HTTP status.
    #[error("backend unavailable: {message}")]
    BackendUnavailable {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// The response is missing fields the loader needs.
    #[error("malformed batch: {0}")]
    MalformedBatch(String),

    #[error("invalid fetch request: page={page} page_size={page_size}")]
    InvalidRequest { page: u32, page_size: u32 },
}

impl LoadError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        LoadError::BackendUnavailable {
            message: message.into(),
            source: None,
        }
    }

    pub fn transport(message: impl Into<String>, source: reqwest::Error) -> Self {
        LoadError::BackendUnavailable {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        LoadError::MalformedBatch(message.into())
    }

    /// Short stable label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::BackendUnavailable { .. } => "backend_unavailable",
            LoadError::MalformedBatch(_) => "malformed_batch",
            LoadError::InvalidRequest { .. } => "invalid_request",
        }
    }
}
