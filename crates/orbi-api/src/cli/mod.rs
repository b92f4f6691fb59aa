//! CLI command definitions for the `orbi` binary.
//!
//! Uses clap derive macros for argument parsing. Settings can come from
//! `config.toml`, environment variables or flags; flags and environment
//! win over the file.

pub mod message;
pub mod serve;
pub mod session;
pub mod sweep;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use secrecy::SecretString;

use orbi_types::config::{BackendKind, RelayConfig};

/// Relay chat messages to a generation backend and share answers by link.
#[derive(Parser)]
#[command(name = "orbi", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(flatten)]
    pub settings: SettingsArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the Telegram relay, the HTTP API and the retention sweeper.
    Serve,

    /// Delete expired message bodies once and exit.
    Sweep,

    /// Inspect stored message bodies.
    Message {
        #[command(subcommand)]
        action: MessageCommand,
    },

    /// Inspect chat sessions.
    #[command(alias = "session")]
    Sessions {
        #[command(subcommand)]
        action: SessionCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum MessageCommand {
    /// Show one body by its hash.
    Show {
        /// 8-character message hash.
        hash: String,
    },
}

#[derive(Subcommand)]
pub enum SessionCommand {
    /// List a user's sessions.
    #[command(alias = "ls")]
    List {
        /// Telegram user ID.
        user_id: i64,
    },
}

/// Settings that override `config.toml`.
#[derive(Args, Debug, Default)]
pub struct SettingsArgs {
    /// Telegram bot token.
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", global = true, hide_env_values = true)]
    pub bot_token: Option<String>,

    /// Base URL of the web front-end.
    #[arg(long, env = "WEBAPP_URL", global = true)]
    pub webapp_url: Option<String>,

    /// HTTP listen address (host:port).
    #[arg(long, env = "SERVER_ADDR", global = true)]
    pub server_addr: Option<String>,

    /// Directory of the built front-end.
    #[arg(long, env = "ORBI_WEB_DIR", global = true)]
    pub web_dir: Option<String>,

    /// Days a message body is kept.
    #[arg(long, env = "MESSAGE_RETENTION_DAYS", global = true)]
    pub retention_days: Option<u32>,

    /// Hours between retention sweeps.
    #[arg(long, env = "CLEANUP_INTERVAL_HOURS", global = true)]
    pub cleanup_interval_hours: Option<u32>,

    /// Attempts per question before giving up.
    #[arg(long, env = "MAX_RETRIES", global = true)]
    pub max_retries: Option<u32>,

    /// Seconds between attempts.
    #[arg(long, env = "RETRY_DELAY_SECS", global = true)]
    pub retry_delay_secs: Option<u64>,

    /// Timeout for one backend call, in seconds.
    #[arg(long, env = "HTTP_TIMEOUT_SECS", global = true)]
    pub http_timeout_secs: Option<u64>,

    /// Updates handled at the same time.
    #[arg(long, env = "MAX_CONCURRENT_UPDATES", global = true)]
    pub max_concurrent_updates: Option<usize>,

    /// Generation backend: google or azure.
    #[arg(long, env = "AI_SERVICE", global = true)]
    pub ai_service: Option<BackendKind>,

    #[arg(long, env = "GEMINI_API_KEY", global = true, hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    #[arg(long, env = "GEMINI_MODEL", global = true)]
    pub gemini_model: Option<String>,

    #[arg(long, env = "GEMINI_TEMPERATURE", global = true)]
    pub gemini_temperature: Option<f32>,

    #[arg(long, env = "GEMINI_TOP_K", global = true)]
    pub gemini_top_k: Option<u32>,

    #[arg(long, env = "GEMINI_TOP_P", global = true)]
    pub gemini_top_p: Option<f32>,

    #[arg(long, env = "GEMINI_MAX_OUTPUT_TOKENS", global = true)]
    pub gemini_max_output_tokens: Option<u32>,

    #[arg(long, env = "AZURE_OPENAI_API_KEY", global = true, hide_env_values = true)]
    pub azure_api_key: Option<String>,

    #[arg(long, env = "AZURE_OPENAI_ENDPOINT", global = true)]
    pub azure_endpoint: Option<String>,

    #[arg(long, env = "AZURE_OPENAI_MODEL", global = true)]
    pub azure_model: Option<String>,

    #[arg(long, env = "AZURE_OPENAI_MAX_TOKENS", global = true)]
    pub azure_max_tokens: Option<u32>,

    #[arg(long, env = "AZURE_OPENAI_TEMPERATURE", global = true)]
    pub azure_temperature: Option<f32>,

    /// System prompt sent with every question.
    #[arg(long, env = "SYSTEM_PROMPT", global = true)]
    pub system_prompt: Option<String>,
}

impl SettingsArgs {
    /// Layer the given settings over `config`.
    pub fn apply(&self, config: &mut RelayConfig) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }

        set(&mut config.webapp_url, &self.webapp_url);
        set(&mut config.server_addr, &self.server_addr);
        set(&mut config.web_dir, &self.web_dir);
        set(&mut config.retention_days, &self.retention_days);
        set(&mut config.sweep_interval_hours, &self.cleanup_interval_hours);
        set(&mut config.max_retries, &self.max_retries);
        set(&mut config.retry_delay_secs, &self.retry_delay_secs);
        set(&mut config.http_timeout_secs, &self.http_timeout_secs);
        set(&mut config.max_concurrent_updates, &self.max_concurrent_updates);
        set(&mut config.backend, &self.ai_service);
        set(&mut config.system_prompt, &self.system_prompt);

        set(&mut config.gemini.model, &self.gemini_model);
        set(&mut config.gemini.temperature, &self.gemini_temperature);
        set(&mut config.gemini.top_k, &self.gemini_top_k);
        set(&mut config.gemini.top_p, &self.gemini_top_p);
        set(&mut config.gemini.max_output_tokens, &self.gemini_max_output_tokens);

        set(&mut config.openai.endpoint, &self.azure_endpoint);
        set(&mut config.openai.model, &self.azure_model);
        set(&mut config.openai.max_tokens, &self.azure_max_tokens);
        set(&mut config.openai.temperature, &self.azure_temperature);
    }

    pub fn bot_token(&self) -> Option<SecretString> {
        non_empty_secret(&self.bot_token)
    }

    /// API key for the selected backend.
    pub fn backend_key(&self, backend: BackendKind) -> Option<SecretString> {
        match backend {
            BackendKind::Google => non_empty_secret(&self.gemini_api_key),
            BackendKind::Azure => non_empty_secret(&self.azure_api_key),
        }
    }
}

fn non_empty_secret(value: &Option<String>) -> Option<SecretString> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .map(|v| SecretString::from(v.to_string()))
}
