//! SQLite connection setup for the users store.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use sea_orm::{DatabaseConnection, SqlxSqliteConnector};
use sea_orm_migration::MigratorTrait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

use super::migrations::Migrator;

pub const DEFAULT_MAX_CONNS: u32 = 10;
pub const DEFAULT_BUSY_TIMEOUT_MS: u32 = 5000;

#[derive(Debug, Clone)]
pub struct DbOptions {
    pub max_conns: u32,
    pub busy_timeout: Duration,
}

impl Default for DbOptions {
    fn default() -> Self {
        Self {
            max_conns: DEFAULT_MAX_CONNS,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS as u64),
        }
    }
}

pub fn is_memory_dsn(dsn: &str) -> bool {
    dsn.contains(":memory:") || dsn.contains("mode=memory")
}

/// Open a pooled SQLite connection with `REGEXP` registered on every connection.
///
/// An in-memory database lives only as long as its connections, so it gets a
/// single connection that is never recycled.
pub async fn connect(dsn: &str, opts: &DbOptions) -> anyhow::Result<DatabaseConnection> {
    let memory = is_memory_dsn(dsn);

    let mut connect_opts = SqliteConnectOptions::from_str(dsn)
        .with_context(|| format!("invalid sqlite DSN '{dsn}'"))?
        .create_if_missing(true)
        .foreign_keys(true)
        .synchronous(SqliteSynchronous::Normal)
        .with_regexp();
    connect_opts = if memory {
        connect_opts.journal_mode(SqliteJournalMode::Memory)
    } else {
        connect_opts
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(opts.busy_timeout)
    };

    let mut pool_opts = SqlitePoolOptions::new();
    pool_opts = if memory {
        pool_opts
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        pool_opts.max_connections(opts.max_conns.max(1))
    };

    let pool = pool_opts
        .connect_with(connect_opts)
        .await
        .with_context(|| format!("failed to open sqlite database '{dsn}'"))?;
    tracing::debug!(dsn, memory, "sqlite pool ready");

    Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
}

pub async fn migrate(conn: &DatabaseConnection) -> anyhow::Result<()> {
    Migrator::up(conn, None)
        .await
        .context("users migrations failed")
}

/// In-memory database with the schema applied. Used by tests and `--mock`.
pub async fn connect_memory() -> anyhow::Result<DatabaseConnection> {
    let conn = connect("sqlite::memory:", &DbOptions::default()).await?;
    migrate(&conn).await?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_dsn_detection() {
        assert!(is_memory_dsn("sqlite::memory:"));
        assert!(is_memory_dsn("sqlite://file:x?mode=memory&cache=shared"));
        assert!(!is_memory_dsn("sqlite:///var/lib/users.db"));
    }

    #[tokio::test]
    async fn file_database_is_created_and_migrated() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("users.db");
        let dsn = format!("sqlite://{}", path.display());

        let conn = connect(&dsn, &DbOptions::default()).await.unwrap();
        migrate(&conn).await.unwrap();
        // second run is a no-op
        migrate(&conn).await.unwrap();
        assert!(path.exists());
    }
}
