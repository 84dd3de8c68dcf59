use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_TOP_K: u32 = 40;
pub const DEFAULT_TOP_P: f64 = 0.95;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2048;

/// Downstream generate call body.
///
/// `message` is validated by the service (non-empty after trimming); a
/// non-string value decodes to `None` so the service can reject it with the
/// same invalid-argument kind as a missing field.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequestBody {
    #[serde(default, deserialize_with = "lenient")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub model_parameters: ModelParameters,
}

/// Sampling controls. Every field defaults independently: a missing or
/// wrong-typed field resolves to its default instead of rejecting the
/// request, so parameters alone can never fail validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelParameters {
    #[serde(default, deserialize_with = "lenient")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub top_k: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub top_p: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub max_output_tokens: Option<u32>,
}

impl ModelParameters {
    pub fn resolve(&self) -> GenerationSettings {
        GenerationSettings {
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            top_k: self.top_k.unwrap_or(DEFAULT_TOP_K),
            top_p: self.top_p.unwrap_or(DEFAULT_TOP_P),
            max_output_tokens: self.max_output_tokens.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS),
        }
    }
}

/// Fully resolved sampling controls forwarded upstream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    pub temperature: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub max_output_tokens: u32,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}
