//! Application state wiring the store, config and init-data verifier.
//!
//! AppState holds the concrete instances used by both CLI commands and the
//! HTTP handlers. The core services are generic over the store and backend
//! traits; the aliases below pin them to the infra implementations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use secrecy::SecretString;

use orbi_core::gateway::ConversationGateway;
use orbi_core::llm::BoxGenerationBackend;
use orbi_core::retention::RetentionSweeper;
use orbi_infra::crypto::init_data::InitDataVerifier;
use orbi_infra::sqlite::{DatabasePool, SqliteMessageStore, database_url};
use orbi_types::config::RelayConfig;

pub type ConcreteGateway = ConversationGateway<SqliteMessageStore, BoxGenerationBackend>;

pub type ConcreteSweeper = RetentionSweeper<SqliteMessageStore>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqliteMessageStore>,
    pub config: Arc<RelayConfig>,
    /// Present only when a bot token is configured; identity-bound routes
    /// answer 401 without it.
    pub verifier: Option<Arc<InitDataVerifier>>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Open (and migrate) the database in `data_dir`.
    pub async fn init(data_dir: PathBuf, config: RelayConfig) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let db_url = format!("{}?mode=rwc", database_url(&data_dir));
        let db_pool = DatabasePool::open(&db_url, &config.store)
            .await
            .context("failed to open the message database")?;

        Ok(Self {
            store: Arc::new(SqliteMessageStore::new(db_pool)),
            config: Arc::new(config),
            verifier: None,
            data_dir,
        })
    }

    /// Enable init-data verification for `bot_token`.
    pub fn with_bot_token(mut self, bot_token: &SecretString) -> anyhow::Result<Self> {
        let verifier = InitDataVerifier::new(bot_token).context("invalid bot token")?;
        self.verifier = Some(Arc::new(verifier));
        Ok(self)
    }

    pub fn sweeper(&self) -> ConcreteSweeper {
        RetentionSweeper::new(
            self.store.clone(),
            self.config.retention(),
            self.config.sweep_interval(),
        )
    }
}
