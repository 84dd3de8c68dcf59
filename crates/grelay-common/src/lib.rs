use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum GlobalConfigError {
    #[error("missing required global config field: {0}")]
    MissingField(&'static str),
}

/// Final, merged global configuration used by the running process.
///
/// Merge order: CLI > ENV. Constructed once at startup and passed by
/// reference; handlers never read ambient configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub host: String,
    pub port: u16,
    /// Database DSN used for this process.
    pub dsn: String,
    /// Base URL of the upstream generation API.
    pub upstream_base_url: String,
    /// Upstream credential. May be absent at startup; generate calls then
    /// fail with a configuration-class internal error instead of reaching
    /// upstream.
    pub upstream_api_key: Option<String>,
    /// Fixed model identifier used upstream and reported back to callers.
    pub model: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl GlobalConfig {
    /// The upstream credential, if one is usable (non-empty after trimming).
    pub fn upstream_key(&self) -> Option<&str> {
        self.upstream_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn validate(&self) -> Result<(), GlobalConfigError> {
        if self.host.trim().is_empty() {
            return Err(GlobalConfigError::MissingField("host"));
        }
        if self.dsn.trim().is_empty() {
            return Err(GlobalConfigError::MissingField("dsn"));
        }
        if self.upstream_base_url.trim().is_empty() {
            return Err(GlobalConfigError::MissingField("upstream_base_url"));
        }
        if self.model.trim().is_empty() {
            return Err(GlobalConfigError::MissingField("model"));
        }
        Ok(())
    }
}
