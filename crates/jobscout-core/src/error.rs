use thiserror::Error;

/// Application-wide error types for jobscout.
#[derive(Error, Debug)]
pub enum AppError {
    /// Backend answered with an unexpected HTTP status.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error on a single request.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The login flow hit a verification challenge nobody resolved.
    #[error("Login challenge: {0}")]
    AuthChallenge(String),

    /// The site rejected the credentials, or the session was lost mid-run.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// A page never finished navigating.
    #[error("Navigation to {url} timed out after {secs} seconds")]
    NavigationTimeout { url: String, secs: u64 },

    /// Browser-level failure (launch, CDP, script evaluation).
    #[error("Browser error: {0}")]
    BrowserError(String),

    /// The rendered page yielded no usable record.
    #[error("Nothing to extract: {0}")]
    ExtractionEmpty(String),

    /// The backend already holds this posting.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The cache holding the work queue is unreachable.
    #[error("Queue unavailable: {0}")]
    QueueUnavailable(String),

    /// The backend gateway is unreachable.
    #[error("Gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if the pipeline cannot continue after this error.
    ///
    /// Everything else is a per-item failure: counted, logged, never retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::QueueUnavailable(_)
                | AppError::GatewayUnavailable(_)
                | AppError::AuthChallenge(_)
                | AppError::AuthFailed(_)
                | AppError::ConfigError(_)
        )
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, AppError::AlreadyExists(_))
    }
}
