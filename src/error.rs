//! Error type for session requests, storage and configuration.
//!
//! ERROR HANDLING
//! ==============
//! Payloads are rendered strings so the error stays `Send + Sync` and cheap
//! to log. Derivation never produces errors; only the edges do (HTTP, JSON,
//! storage, env parsing).

/// Errors produced by the auth client layers.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The HTTP request to the session store failed in transport.
    #[error("session request failed: {0}")]
    Request(String),

    /// A success response body could not be deserialized.
    #[error("session response parse failed: {0}")]
    Parse(String),

    /// A non-success response without a readable JSON body.
    #[error("unexpected session response: status {status}")]
    UnexpectedStatus { status: u16, body: String },

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    /// The local key/value store could not be read or written.
    #[error("storage failed: {0}")]
    Storage(String),
}

impl AuthError {
    /// Stable machine-readable code for logs and CLI output.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Request(_) => "E_REQUEST",
            Self::Parse(_) => "E_PARSE",
            Self::UnexpectedStatus { .. } => "E_UNEXPECTED_STATUS",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
            Self::ConfigParse(_) => "E_CONFIG_PARSE",
            Self::Storage(_) => "E_STORAGE",
        }
    }

    /// Whether a caller-initiated retry could reasonably succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::UnexpectedStatus { status: 429 | 500..=599, .. })
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
