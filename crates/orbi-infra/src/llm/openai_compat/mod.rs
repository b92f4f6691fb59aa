//! OpenAI-compatible generation backend.
//!
//! [`OpenAiCompatibleBackend`] talks to any chat-completions endpoint that
//! speaks the OpenAI wire format. The `azure` backend kind points it at the
//! Azure AI inference endpoint.
//!
//! Uses [`async_openai`] for type-safe request/response handling.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
};
use secrecy::{ExposeSecret, SecretString};

use orbi_core::llm::backend::GenerationBackend;
use orbi_types::config::OpenAiSettings;
use orbi_types::llm::{LlmError, MessageRole, Turn};

/// Generation backend for any OpenAI-compatible chat-completions API.
///
/// Does NOT derive Debug: the `async_openai::Client` holds the API key.
pub struct OpenAiCompatibleBackend {
    client: Client<OpenAIConfig>,
    backend_name: String,
    settings: OpenAiSettings,
    system_prompt: String,
}

impl OpenAiCompatibleBackend {
    pub fn new(
        backend_name: &str,
        api_key: &SecretString,
        settings: OpenAiSettings,
        system_prompt: String,
    ) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key.expose_secret())
            .with_api_base(&settings.endpoint);

        Self {
            client: Client::with_config(openai_config),
            backend_name: backend_name.to_string(),
            settings,
            system_prompt,
        }
    }

    /// Create a backend for the Azure AI inference endpoint.
    pub fn azure(api_key: &SecretString, settings: OpenAiSettings, system_prompt: String) -> Self {
        Self::new("azure", api_key, settings, system_prompt)
    }

    /// Build a [`CreateChatCompletionRequest`]: system prompt, history, then the prompt.
    fn build_request(&self, history: &[Turn], prompt: &str) -> CreateChatCompletionRequest {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(history.len() + 2);

        if !self.system_prompt.trim().is_empty() {
            messages.push(ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(
                        self.system_prompt.clone(),
                    ),
                    name: None,
                },
            ));
        }

        for turn in history {
            messages.push(match turn.role {
                MessageRole::User => user_message(&turn.content),
                MessageRole::Assistant => assistant_message(&turn.content),
            });
        }
        messages.push(user_message(prompt));

        CreateChatCompletionRequest {
            model: self.settings.model.clone(),
            messages,
            max_completion_tokens: Some(self.settings.max_tokens),
            temperature: Some(self.settings.temperature),
            ..Default::default()
        }
    }
}

fn user_message(content: &str) -> ChatCompletionRequestMessage {
    ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
        content: ChatCompletionRequestUserMessageContent::Text(content.to_string()),
        name: None,
    })
}

fn assistant_message(content: &str) -> ChatCompletionRequestMessage {
    #[allow(deprecated)]
    ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
        content: Some(ChatCompletionRequestAssistantMessageContent::Text(
            content.to_string(),
        )),
        refusal: None,
        name: None,
        audio: None,
        tool_calls: None,
        function_call: None,
    })
}

impl GenerationBackend for OpenAiCompatibleBackend {
    fn name(&self) -> &str {
        &self.backend_name
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    async fn generate(&self, history: &[Turn], prompt: &str) -> Result<String, LlmError> {
        let request = self.build_request(history, prompt);

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        if let Some(usage) = &response.usage {
            tracing::debug!(
                gen_ai.usage.input_tokens = usage.prompt_tokens,
                gen_ai.usage.output_tokens = usage.completion_tokens,
                "completion usage"
            );
        }

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

/// Map an `async_openai::error::OpenAIError` to an [`LlmError`].
fn map_openai_error(err: async_openai::error::OpenAIError) -> LlmError {
    use async_openai::error::OpenAIError;

    match &err {
        OpenAIError::ApiError(api_err) => {
            let code = api_err.code.as_deref().unwrap_or("");
            let error_type = api_err.r#type.as_deref().unwrap_or("");

            if code == "authentication_error"
                || code == "unauthorized"
                || error_type == "authentication_error"
                || api_err.message.contains("Incorrect API key")
                || api_err.message.contains("Invalid API key")
            {
                LlmError::AuthenticationFailed
            } else if code == "rate_limit_exceeded"
                || code == "RateLimitReached"
                || error_type == "rate_limit_error"
            {
                LlmError::RateLimited {
                    retry_after_ms: None,
                }
            } else if code == "context_length_exceeded"
                || api_err.message.contains("maximum context length")
            {
                LlmError::ContextLengthExceeded {
                    max: 0,
                    requested: 0,
                }
            } else if code == "server_error" || error_type == "overloaded_error" {
                LlmError::Overloaded(api_err.message.clone())
            } else {
                LlmError::Provider {
                    message: err.to_string(),
                }
            }
        }
        OpenAIError::Reqwest(reqwest_err) => match reqwest_err.status().map(|s| s.as_u16()) {
            Some(401 | 403) => LlmError::AuthenticationFailed,
            Some(429) => LlmError::RateLimited {
                retry_after_ms: None,
            },
            Some(503 | 529) => LlmError::Overloaded(err.to_string()),
            _ => LlmError::Provider {
                message: err.to_string(),
            },
        },
        OpenAIError::JSONDeserialize(_, content) => {
            LlmError::Deserialization(format!("failed to parse response: {content}"))
        }
        OpenAIError::InvalidArgument(msg) => LlmError::InvalidRequest(msg.clone()),
        _ => LlmError::Provider {
            message: err.to_string(),
        },
    }
}
