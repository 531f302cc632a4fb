use std::time::Duration;

/// Why a single sensor fetch failed.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The HTTP request itself failed (connect, DNS, TLS, body read).
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The upstream returned a non-2xx status code.
    #[error("eGain API error ({status}): {body}")]
    Status {
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The fetch, including the rate-limit wait, exceeded its bound.
    #[error("Fetch timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// The body was not a valid reading document.
    #[error("Failed to decode sensor payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// The configured base URL cannot carry a sensor path segment.
    #[error("Invalid sensor URL: {0}")]
    Url(String),

    /// The shared cancellation token fired before the fetch finished.
    #[error("Fetch cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }

    /// Short label used for the `outcome` metric label.
    pub fn outcome(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "transport",
            FetchError::Status { .. } => "status",
            FetchError::Timeout(_) => "timeout",
            FetchError::Decode(_) => "decode",
            FetchError::Url(_) => "url",
            FetchError::Cancelled => "cancelled",
        }
    }
}
