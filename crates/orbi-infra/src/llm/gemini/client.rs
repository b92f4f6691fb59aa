//! GeminiBackend -- concrete [`GenerationBackend`] for Google Gemini.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and only exposed when
//! building the request header. It never appears in Debug output or logs.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use orbi_core::llm::backend::GenerationBackend;
use orbi_types::config::GeminiSettings;
use orbi_types::llm::{LlmError, MessageRole, Turn};

use super::types::{Content, ErrorEnvelope, GenerateContentRequest, GenerateContentResponse, GenerationConfig};

/// Google Gemini generation backend.
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    settings: GeminiSettings,
    system_prompt: String,
    timeout: Duration,
}

impl GeminiBackend {
    const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com";

    pub fn new(
        api_key: SecretString,
        settings: GeminiSettings,
        system_prompt: String,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Provider {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            settings,
            system_prompt,
            timeout,
        })
    }

    /// Override the base URL (useful for testing or proxies).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.settings.model
        )
    }

    /// Map history plus the new prompt into a `generateContent` body.
    ///
    /// Stored `assistant` turns become Gemini's `model` role.
    fn build_request(&self, history: &[Turn], prompt: &str) -> GenerateContentRequest {
        let mut contents: Vec<Content> = history
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    MessageRole::User => "user",
                    MessageRole::Assistant => "model",
                };
                Content::text(Some(role), &turn.content)
            })
            .collect();
        contents.push(Content::text(Some("user"), prompt));

        let system_instruction = if self.system_prompt.trim().is_empty() {
            None
        } else {
            Some(Content::text(None, &self.system_prompt))
        };

        GenerateContentRequest {
            contents,
            system_instruction,
            generation_config: GenerationConfig {
                temperature: self.settings.temperature,
                top_k: self.settings.top_k,
                top_p: self.settings.top_p,
                max_output_tokens: self.settings.max_output_tokens,
                response_mime_type: "text/plain".to_string(),
            },
        }
    }
}

// No Debug derive: keeps the API key out of any formatted output.

impl GenerationBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    async fn generate(&self, history: &[Turn], prompt: &str) -> Result<String, LlmError> {
        let body = self.build_request(history, prompt);

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout.as_secs())
                } else {
                    LlmError::Provider {
                        message: format!("HTTP request failed: {e}"),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(map_status(status.as_u16(), &error_body));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse response: {e}")))?;

        if let Some(reason) = parsed.candidates.first().and_then(|c| c.finish_reason.as_deref()) {
            tracing::debug!(finish_reason = reason, "gemini response received");
        }

        parsed.text().ok_or(LlmError::EmptyResponse)
    }
}

/// Map a non-success HTTP status and body to an [`LlmError`].
fn map_status(status: u16, body: &str) -> LlmError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|env| env.error.message)
        .unwrap_or_else(|_| body.to_string());

    match status {
        401 | 403 => LlmError::AuthenticationFailed,
        429 => LlmError::RateLimited {
            retry_after_ms: None,
        },
        400 if message.contains("token count") || message.contains("exceeds the maximum") => {
            LlmError::ContextLengthExceeded { max: 0, requested: 0 }
        }
        400 | 404 => LlmError::InvalidRequest(message),
        503 | 529 => LlmError::Overloaded(message),
        _ => LlmError::Provider {
            message: format!("HTTP {status}: {message}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(system_prompt: &str) -> GeminiBackend {
        GeminiBackend::new(
            SecretString::from("test-key"),
            GeminiSettings::default(),
            system_prompt.to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_build_request_maps_roles() {
        let backend = backend("Be brief.");
        let history = vec![Turn::user("hi"), Turn::assistant("hello")];
        let req = backend.build_request(&history, "what's up?");

        let roles: Vec<&str> = req
            .contents
            .iter()
            .map(|c| c.role.as_deref().unwrap())
            .collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
        assert_eq!(
            req.contents[2].parts[0].text.as_deref(),
            Some("what's up?")
        );
        assert!(req.system_instruction.is_some());
    }

    #[test]
    fn test_build_request_serializes_camel_case() {
        let backend = backend("Be brief.");
        let json = serde_json::to_value(backend.build_request(&[], "ping")).unwrap();

        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "Be brief.");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["generationConfig"]["topK"], 64);
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 8192);
        assert_eq!(json["generationConfig"]["responseMimeType"], "text/plain");
        assert_eq!(json["contents"][0]["role"], "user");
    }

    #[test]
    fn test_blank_system_prompt_is_omitted() {
        let json = serde_json::to_value(backend("  ").build_request(&[], "ping")).unwrap();
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn test_url_includes_model() {
        let backend = backend("").with_base_url("http://localhost:9999/".to_string());
        assert_eq!(
            backend.url(),
            "http://localhost:9999/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert_eq!(backend.model(), "gemini-2.0-flash");
        assert_eq!(backend.name(), "gemini");
    }

    #[test]
    fn test_response_text_joins_parts() {
        let resp: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hel"},{"text":"lo"}]},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(resp.text().as_deref(), Some("Hello"));
    }

    #[test]
    fn test_response_without_candidates_is_empty() {
        let resp: GenerateContentResponse = serde_json::from_str(r#"{"promptFeedback":{}}"#).unwrap();
        assert!(resp.text().is_none());
    }

    #[test]
    fn test_map_status() {
        assert!(matches!(map_status(401, ""), LlmError::AuthenticationFailed));
        assert!(matches!(map_status(403, ""), LlmError::AuthenticationFailed));
        assert!(matches!(map_status(429, ""), LlmError::RateLimited { .. }));
        assert!(matches!(map_status(503, "busy"), LlmError::Overloaded(_)));
        assert!(matches!(map_status(500, "boom"), LlmError::Provider { .. }));

        let err = map_status(400, r#"{"error":{"message":"bad field","status":"INVALID_ARGUMENT"}}"#);
        assert!(matches!(err, LlmError::InvalidRequest(ref m) if m == "bad field"));
        assert!(!err.is_transient());
    }
}
