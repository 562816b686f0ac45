//! Scoped acquisition of the one session a run uses.

use futures::future::BoxFuture;
use tracing::debug;

use crate::config::Config;
use crate::error::Result;
use crate::store::MysqlStore;

/// Opens and releases sessions.
pub struct ConnectionManager;

impl ConnectionManager {
    /// Open a session. `config.connection.database` of `None` connects to the
    /// server only.
    pub async fn open(config: &Config) -> Result<MysqlStore> {
        debug!("Opening session: {:?}", config.connection);
        MysqlStore::connect(&config.connection, &config.schema).await
    }

    /// Release a session. Safe to call on a session already closed.
    pub async fn close(store: &mut MysqlStore) {
        store.close().await;
    }

    /// Open a session, run `body` on it and close it, whatever `body` returned.
    ///
    /// ```ignore
    /// let report = ConnectionManager::scoped(&config, |store| {
    ///     Box::pin(async move { MigrationRunner::new().run(store, &migration).await })
    /// })
    /// .await?;
    /// ```
    pub async fn scoped<T, F>(config: &Config, body: F) -> Result<T>
    where
        F: for<'s> FnOnce(&'s mut MysqlStore) -> BoxFuture<'s, Result<T>>,
    {
        let mut store = Self::open(config).await?;
        let result = body(&mut store).await;
        Self::close(&mut store).await;
        result
    }
}
