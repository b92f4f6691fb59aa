//! Relay configuration types for Orbi.
//!
//! `RelayConfig` represents the optional `config.toml` in the data directory.
//! Every field has a default; the CLI layers environment variables and flags
//! on top. Credentials are never part of this file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which generation backend answers questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Google Gemini `generateContent` API.
    #[default]
    Google,
    /// OpenAI-compatible chat completions (Azure OpenAI, GitHub Models).
    Azure,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Google => write!(f, "google"),
            BackendKind::Azure => write!(f, "azure"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "google" | "gemini" => Ok(BackendKind::Google),
            "azure" | "openai" => Ok(BackendKind::Azure),
            other => Err(format!("unsupported AI service: '{other}'")),
        }
    }
}

/// Top-level configuration for the relay.
///
/// Loaded from `~/.orbi/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Public base URL of the mini-app front-end (links are `{webapp_url}/message/{hash}`).
    pub webapp_url: String,
    /// Listen address for the HTTP surface.
    pub server_addr: String,
    /// Directory holding the pre-built front-end bundle.
    pub web_dir: String,
    /// Message bodies older than this many days are swept.
    pub retention_days: u32,
    pub sweep_interval_hours: u32,
    /// Upper bound on generation attempts per question.
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    /// Bound on a single backend call.
    pub http_timeout_secs: u64,
    /// Long-poll wait passed to the transport.
    pub poll_timeout_secs: u64,
    pub keepalive_interval_secs: u64,
    pub max_concurrent_updates: usize,
    pub backend: BackendKind,
    pub system_prompt: String,
    pub gemini: GeminiSettings,
    pub openai: OpenAiSettings,
    pub store: StoreSettings,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            webapp_url: String::new(),
            server_addr: "localhost:8080".to_string(),
            web_dir: "frontend/dist".to_string(),
            retention_days: 30,
            sweep_interval_hours: 24,
            max_retries: 3,
            retry_delay_secs: 2,
            http_timeout_secs: 30,
            poll_timeout_secs: 60,
            keepalive_interval_secs: 4,
            max_concurrent_updates: 64,
            backend: BackendKind::default(),
            system_prompt: "You are a helpful assistant.".to_string(),
            gemini: GeminiSettings::default(),
            openai: OpenAiSettings::default(),
            store: StoreSettings::default(),
        }
    }
}

impl RelayConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(u64::from(self.retention_days) * 24 * 60 * 60)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.sweep_interval_hours.max(1)) * 60 * 60)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs.max(1))
    }
}

/// Sampling parameters for the Gemini backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    pub model: String,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            temperature: 1.0,
            top_k: 64,
            top_p: 0.95,
            max_output_tokens: 8192,
        }
    }
}

/// Parameters for an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://models.inference.ai.azure.com".to_string(),
            model: "gpt-4o".to_string(),
            max_tokens: 4096,
            temperature: 1.0,
        }
    }
}

/// SQLite connection tuning for the message store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Connections in the read-only pool. Writes always use one connection.
    pub reader_connections: u32,
    /// How long a connection waits on a locked database.
    pub busy_timeout_secs: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            reader_connections: 8,
            busy_timeout_secs: 5,
        }
    }
}

impl StoreSettings {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs)
    }
}
