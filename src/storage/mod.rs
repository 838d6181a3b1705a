pub mod repository;

use std::path::{Path, PathBuf};

use rusqlite_migration::{Migrations, M};

use crate::error::{Error, Result};

/// Connection pragmas applied to every handle. `busy_timeout` bounds how long
/// a reader waits on the writer's lock.
const CONNECTION_PRAGMAS: &str = "PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;";

/// The catalog store: one writer and one reader connection over the same
/// SQLite file. All writes go through `writer`, which runs on its own thread
/// and so applies them one at a time.
#[derive(Clone)]
pub struct Database {
    writer: tokio_rusqlite::Connection,
    reader: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if needed) the store at [`default_path`].
    pub async fn open() -> Result<Self> {
        Self::open_at(default_path()?).await
    }

    /// Open (creating if needed) the store at `path`, migrating it to the latest schema.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("cannot create {}: {e}", parent.display())))?;
        }

        let writer = tokio_rusqlite::Connection::open(&path).await?;
        prepare_writer(&writer).await?;
        let reader = tokio_rusqlite::Connection::open(&path).await?;
        prepare_reader(&reader).await?;

        log::debug!("Opened catalog database at {}", path.display());
        Ok(Self { writer, reader })
    }

    /// A private in-memory store. Reads and writes share one connection,
    /// since each in-memory connection is its own database.
    pub async fn open_memory() -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open_in_memory().await?;
        prepare_writer(&conn).await?;
        Ok(Self {
            reader: conn.clone(),
            writer: conn,
        })
    }

    pub fn writer(&self) -> &tokio_rusqlite::Connection {
        &self.writer
    }

    pub fn reader(&self) -> &tokio_rusqlite::Connection {
        &self.reader
    }
}

async fn prepare_writer(conn: &tokio_rusqlite::Connection) -> Result<()> {
    conn.call(|conn| {
        conn.execute_batch(CONNECTION_PRAGMAS)
            .map_err(|e| e.to_string())?;
        migrations().to_latest(conn).map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| Error::Migration(e.to_string()))
}

async fn prepare_reader(conn: &tokio_rusqlite::Connection) -> Result<()> {
    conn.call(|conn| conn.execute_batch(CONNECTION_PRAGMAS))
        .await?;
    Ok(())
}

fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(include_str!("migrations/001_initial.sql"))])
}

/// `~/.catalogsync/catalogsync.db`
pub fn default_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::Config("cannot determine home directory".into()))?;
    Ok(home.join(".catalogsync").join("catalogsync.db"))
}
