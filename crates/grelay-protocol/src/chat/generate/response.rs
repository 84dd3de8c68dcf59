use serde::{Deserialize, Serialize};

/// Downstream generate call success body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponseBody {
    /// The generated text, exactly as produced upstream.
    pub response: String,
    /// The fixed model identifier this process is configured with.
    pub model: String,
}

/// Downstream error body: a machine-readable kind plus a human-readable
/// message. Upstream diagnostics never appear here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}
