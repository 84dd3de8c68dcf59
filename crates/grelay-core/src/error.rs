/// Caller-visible error taxonomy of the generate pipeline.
///
/// Display is the public message sent to callers. `detail` carries the
/// original failure (upstream status, body, transport error) for server-side
/// logs only; it is never serialized into a response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerateError {
    #[error("missing or invalid caller identity")]
    Unauthenticated,
    #[error("{0}")]
    InvalidArgument(&'static str),
    #[error("{message}")]
    Internal {
        message: &'static str,
        detail: Option<String>,
    },
}

impl GenerateError {
    pub fn internal(message: &'static str, detail: impl Into<String>) -> Self {
        Self::Internal {
            message,
            detail: Some(detail.into()),
        }
    }

    /// Machine-readable kind carried in the error body.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Internal { .. } => "internal",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthenticated => 401,
            Self::InvalidArgument(_) => 400,
            Self::Internal { .. } => 500,
        }
    }

    /// Server-side diagnostic context, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Internal { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}
