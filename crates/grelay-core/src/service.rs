use std::sync::Arc;

use tracing::warn;

use grelay_common::GlobalConfig;
use grelay_protocol::chat::generate::request::GenerateRequestBody;
use grelay_protocol::chat::generate::response::GenerateResponseBody;
use grelay_protocol::gemini::generate_content::response::GenerateContentResponse;

use crate::auth::Principal;
use crate::error::GenerateError;
use crate::gemini;
use crate::upstream::UpstreamClient;
use crate::usage::{SharedUsageSink, UsageRecord};

/// The relay pipeline: authenticate, validate, call upstream exactly once,
/// shape the result, record usage. Holds no mutable state across calls.
pub struct GenerateService {
    config: Arc<GlobalConfig>,
    client: Arc<dyn UpstreamClient>,
    usage: SharedUsageSink,
}

impl GenerateService {
    pub fn new(
        config: Arc<GlobalConfig>,
        client: Arc<dyn UpstreamClient>,
        usage: SharedUsageSink,
    ) -> Self {
        Self {
            config,
            client,
            usage,
        }
    }

    pub async fn generate(
        &self,
        principal: Option<&Principal>,
        raw_body: &[u8],
    ) -> Result<GenerateResponseBody, GenerateError> {
        let result = self.generate_inner(principal, raw_body).await;
        if let Err(err) = &result
            && let Some(detail) = err.detail()
        {
            warn!(kind = err.kind(), detail, "generate request failed");
        }
        result
    }

    async fn generate_inner(
        &self,
        principal: Option<&Principal>,
        raw_body: &[u8],
    ) -> Result<GenerateResponseBody, GenerateError> {
        let Some(principal) = principal else {
            return Err(GenerateError::Unauthenticated);
        };

        let body: GenerateRequestBody = serde_json::from_slice(raw_body)
            .map_err(|_| GenerateError::InvalidArgument("request body must be a JSON object"))?;
        let message = body
            .message
            .as_deref()
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .ok_or(GenerateError::InvalidArgument(
                "message must be a non-empty string",
            ))?;
        let settings = body.model_parameters.resolve();

        let Some(api_key) = self.config.upstream_key() else {
            return Err(GenerateError::internal(
                "service configuration error",
                "upstream api key is not configured",
            ));
        };

        let request = gemini::build_generate_request(
            &self.config.upstream_base_url,
            api_key,
            &self.config.model,
            message,
            &settings,
        )?;

        // Exactly one upstream attempt; timeouts and transport errors map to
        // the same caller-visible kind as a non-2xx status.
        let response = self.client.send(request).await.map_err(|failure| {
            GenerateError::internal("upstream request failed", failure.to_string())
        })?;

        if !(200..300).contains(&response.status) {
            return Err(GenerateError::internal(
                "upstream request failed",
                format!(
                    "upstream status {}: {}",
                    response.status,
                    String::from_utf8_lossy(&response.body)
                ),
            ));
        }

        let decoded: GenerateContentResponse = serde_json::from_slice(&response.body)
            .map_err(|err| GenerateError::internal("malformed upstream response", err.to_string()))?;
        let text = gemini::extract_text(&decoded).ok_or_else(|| {
            GenerateError::internal(
                "empty response from AI service",
                "no text in candidates[0].content.parts[0]",
            )
        })?;

        self.usage.record(UsageRecord {
            user_id: principal.user_id.clone(),
            model: self.config.model.clone(),
            message_chars: message.chars().count() as i64,
            response_chars: text.chars().count() as i64,
        });

        Ok(GenerateResponseBody {
            response: text.to_string(),
            model: self.config.model.clone(),
        })
    }
}
