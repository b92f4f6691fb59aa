//! Connection pools for the Orbi message database.
//!
//! Every mutation of the store goes through `writer`, a pool of exactly one
//! connection, so transactions are serialized and the at-most-one-active
//! session rule never races. Reads go through `reader`, a read-only pool
//! sized by `StoreSettings`. WAL lets readers proceed while the writer holds
//! a transaction.

use std::path::Path;
use std::str::FromStr;

use orbi_types::config::StoreSettings;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

/// Writer and reader pools over one SQLite file.
#[derive(Clone)]
pub struct DatabasePool {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

impl DatabasePool {
    /// Open with default `StoreSettings`.
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        Self::open(database_url, &StoreSettings::default()).await
    }

    /// Open both pools and bring the schema up to date.
    ///
    /// Migrations run on the writer before the reader pool connects, so
    /// readers never see a half-migrated schema.
    pub async fn open(database_url: &str, settings: &StoreSettings) -> Result<Self, sqlx::Error> {
        let options = connect_options(database_url, settings)?;

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await?;
        sqlx::migrate!("../../migrations").run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(settings.reader_connections.max(1))
            .connect_with(options.read_only(true))
            .await?;

        tracing::debug!(
            url = database_url,
            readers = settings.reader_connections.max(1),
            "message database ready"
        );
        Ok(Self { reader, writer })
    }
}

fn connect_options(
    database_url: &str,
    settings: &StoreSettings,
) -> Result<SqliteConnectOptions, sqlx::Error> {
    Ok(SqliteConnectOptions::from_str(database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(settings.busy_timeout())
        .create_if_missing(true))
}

/// Database URL for `orbi.db` inside `data_dir`.
pub fn database_url(data_dir: &Path) -> String {
    format!("sqlite://{}/orbi.db", data_dir.display())
}
