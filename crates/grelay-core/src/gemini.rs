use bytes::Bytes;

use grelay_protocol::chat::generate::request::GenerationSettings;
use grelay_protocol::gemini::generate_content::request::GenerateContentRequestBody;
use grelay_protocol::gemini::generate_content::response::GenerateContentResponse;
use grelay_protocol::gemini::generate_content::types::{Content, GenerationConfig, Part};

use crate::error::GenerateError;
use crate::upstream::{Headers, UpstreamRequest};

pub fn build_generate_request(
    base_url: &str,
    api_key: &str,
    model: &str,
    message: &str,
    settings: &GenerationSettings,
) -> Result<UpstreamRequest, GenerateError> {
    let body = GenerateContentRequestBody {
        contents: vec![Content {
            parts: vec![Part {
                text: Some(message.to_string()),
            }],
            role: None,
        }],
        generation_config: Some(GenerationConfig {
            stop_sequences: None,
            candidate_count: None,
            max_output_tokens: Some(settings.max_output_tokens),
            temperature: Some(settings.temperature),
            top_p: Some(settings.top_p),
            top_k: Some(settings.top_k),
        }),
    };
    let body = serde_json::to_vec(&body).map_err(|err| {
        GenerateError::internal("upstream request failed", format!("encode upstream body: {err}"))
    })?;

    let url = format!(
        "{}/v1beta/{}:generateContent",
        base_url.trim_end_matches('/'),
        normalize_model_name(model),
    );

    let mut headers: Headers = Vec::new();
    headers.push(("x-goog-api-key".to_string(), api_key.to_string()));
    headers.push(("accept".to_string(), "application/json".to_string()));
    headers.push(("content-type".to_string(), "application/json".to_string()));

    Ok(UpstreamRequest {
        url,
        headers,
        body: Bytes::from(body),
    })
}

/// First text part of the first candidate. `None` when the response carries
/// no extractable text; an empty generation is not a valid success.
pub fn extract_text(response: &GenerateContentResponse) -> Option<&str> {
    response
        .candidates
        .first()?
        .content
        .as_ref()?
        .parts
        .first()?
        .text
        .as_deref()
        .filter(|text| !text.is_empty())
}

fn normalize_model_name(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}
