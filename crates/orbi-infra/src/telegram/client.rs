//! TelegramClient -- concrete [`ChatTransport`] for the Telegram Bot API.
//!
//! Every call is a JSON `POST` to `{base}/bot{token}/{method}`; every reply
//! is an envelope `{ok, result, description, error_code}`.
//!
//! The bot token is part of the URL path, so it is held as a
//! [`SecretString`] and the URL is never logged.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use orbi_core::dispatch::transport::ChatTransport;
use orbi_types::error::TransportError;
use orbi_types::transport::{ChatAction, OutgoingMessage, Update, User};

const DEFAULT_BASE_URL: &str = "https://api.telegram.org";

/// Reply envelope shared by every Bot API method.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, TransportError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (true, None) => Err(TransportError::Deserialization(
                "ok response without result".to_string(),
            )),
            (false, _) => Err(TransportError::Rejected {
                description: self
                    .description
                    .unwrap_or_else(|| "unknown error".to_string()),
                error_code: self.error_code,
            }),
        }
    }
}

/// Telegram Bot API client.
pub struct TelegramClient {
    client: reqwest::Client,
    token: SecretString,
    base_url: String,
}

impl TelegramClient {
    /// Create a client. `request_timeout` must exceed the long-poll timeout.
    pub fn new(token: SecretString, request_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| TransportError::Request(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            token,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Override the base URL (useful for testing or a local Bot API server).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.base_url.trim_end_matches('/'),
            self.token.expose_secret()
        )
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T, TransportError> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            // without_url keeps the token out of the error text
            .map_err(|e| TransportError::Request(e.without_url().to_string()))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Request(e.without_url().to_string()))?;

        parse_envelope(&bytes)
    }
}

fn parse_envelope<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, TransportError> {
    let envelope: ApiResponse<T> = serde_json::from_slice(bytes)
        .map_err(|e| TransportError::Deserialization(e.to_string()))?;
    envelope.into_result()
}

impl ChatTransport for TelegramClient {
    async fn get_me(&self) -> Result<User, TransportError> {
        self.call("getMe", &json!({})).await
    }

    async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, TransportError> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message"],
            }),
        )
        .await
    }

    async fn send_message(&self, message: &OutgoingMessage) -> Result<(), TransportError> {
        let body = serde_json::to_value(message)
            .map_err(|e| TransportError::Deserialization(e.to_string()))?;
        let _sent: serde_json::Value = self.call("sendMessage", &body).await?;
        Ok(())
    }

    async fn send_chat_action(&self, chat_id: i64, action: ChatAction) -> Result<(), TransportError> {
        let _ok: bool = self
            .call("sendChatAction", &json!({ "chat_id": chat_id, "action": action }))
            .await?;
        Ok(())
    }
}
