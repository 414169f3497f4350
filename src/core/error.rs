use thiserror::Error;

/// Error taxonomy for physical actions.
///
/// Local bounded retry applies only to `Blocked` and `Timeout`;
/// everything else surfaces to the caller unchanged.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("missing capability: {0}")]
    CapabilityMissing(String),

    #[error("target unreachable: {0}")]
    Unreachable(String),

    #[error("path blocked: {0}")]
    Blocked(String),

    #[error("timed out after {elapsed_ms}ms ({progress})")]
    Timeout { elapsed_ms: u64, progress: String },

    #[error("another physical action is already in flight")]
    Busy,

    #[error("world link lost")]
    Disconnected,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl AgentError {
    /// Whether a bounded local retry is permitted for this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, AgentError::Blocked(_) | AgentError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
