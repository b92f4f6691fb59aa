//! `orbi serve`: the long-running relay.
//!
//! Starts three things on one runtime and stops them together:
//! - the update dispatcher polling Telegram,
//! - the retention sweeper,
//! - the HTTP API (axum) with graceful shutdown on Ctrl+C / SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use tokio_util::sync::CancellationToken;

use orbi_core::dispatch::transport::ChatTransport;
use orbi_core::dispatch::{DispatchSettings, ReplyFormatter, UpdateDispatcher};
use orbi_core::gateway::{ConversationGateway, RetryPolicy};
use orbi_infra::llm::create_backend;
use orbi_infra::telegram::TelegramClient;

use super::SettingsArgs;
use crate::http;
use crate::state::{AppState, ConcreteGateway};

/// Margin added to the long-poll timeout for the transport's HTTP client.
const POLL_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

pub async fn serve(state: AppState, settings: &SettingsArgs) -> Result<()> {
    let config = state.config.clone();

    let bot_token = settings
        .bot_token()
        .context("TELEGRAM_BOT_TOKEN is required to serve")?;
    let api_key = settings.backend_key(config.backend);
    let backend = create_backend(&config, api_key.as_ref())
        .with_context(|| format!("no usable API key for the '{}' backend", config.backend))?;

    let state = state.with_bot_token(&bot_token)?;

    let transport = Arc::new(TelegramClient::new(
        bot_token,
        Duration::from_secs(config.poll_timeout_secs) + POLL_TIMEOUT_MARGIN,
    )?);
    let me = transport
        .get_me()
        .await
        .context("failed to reach the Telegram Bot API")?;
    let bot_username = me.username.clone().unwrap_or_default();
    tracing::info!(bot_id = me.id, bot = %bot_username, "connected to Telegram");

    let gateway: Arc<ConcreteGateway> = Arc::new(ConversationGateway::new(
        state.store.clone(),
        Arc::new(backend),
        RetryPolicy::new(config.max_retries, config.retry_delay()),
        config.http_timeout(),
    ));

    let dispatcher = UpdateDispatcher::new(
        transport,
        gateway,
        state.store.clone(),
        ReplyFormatter::new(config.webapp_url.clone(), bot_username.clone()),
        DispatchSettings {
            poll_timeout_secs: config.poll_timeout_secs,
            keepalive_interval: config.keepalive_interval(),
            max_concurrent_updates: config.max_concurrent_updates,
            ..Default::default()
        },
    );
    let sweeper = state.sweeper();

    let cancel = CancellationToken::new();
    let dispatcher_task = tokio::spawn({
        let cancel = cancel.clone();
        async move { dispatcher.run(cancel).await }
    });
    let sweeper_task = tokio::spawn({
        let cancel = cancel.clone();
        async move { sweeper.run(cancel).await }
    });

    let listener = tokio::net::TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server_addr))?;

    println!(
        "  {} Orbi relay @{} listening on {}",
        style("⚡").bold(),
        style(&bot_username).cyan(),
        style(format!("http://{}", config.server_addr)).cyan()
    );
    println!("  {}", style("Press Ctrl+C to stop").dim());

    let router = http::router::build_router(state);
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    cancel.cancel();
    for task in [dispatcher_task, sweeper_task] {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "background task ended abnormally");
        }
    }

    served?;
    println!("\n  Relay stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
