use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClaudeAgentError {
    /// The assistant binary could not be located or spawned.
    #[error("failed to start '{binary}': {reason}")]
    Startup { binary: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A single stdout line exceeded the configured maximum.
    #[error("stream-json line exceeded {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("Process error: {0}")]
    Process(String),
}
