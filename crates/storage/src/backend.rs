//! Backend selection from a database URL, with enum dispatch.

use std::path::PathBuf;
#[cfg(feature = "sqlite")]
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use terrareg_schema_core::{Revision, Target};

use crate::error::StorageError;
use crate::plan::{HistoryEntry, MigrationReport};

/// Where a database URL points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    /// `sqlite:///relative.db`, `sqlite:////abs/path.db`, or a bare path.
    Sqlite(PathBuf),
    /// `postgres://` or `postgresql://` URL, passed to sqlx untouched.
    Postgres(String),
}

impl DatabaseLocation {
    pub fn parse(url: &str) -> Result<Self, StorageError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(StorageError::UnsupportedDatabase(String::from("empty database url")));
        }
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            return Ok(Self::Postgres(url.to_owned()));
        }
        if let Some(path) = url.strip_prefix("sqlite:///") {
            if path.is_empty() {
                return Err(StorageError::UnsupportedDatabase(url.to_owned()));
            }
            return Ok(Self::Sqlite(path.into()));
        }
        if url.contains("://") {
            return Err(StorageError::UnsupportedDatabase(url.to_owned()));
        }
        Ok(Self::Sqlite(url.into()))
    }
}

#[cfg(feature = "sqlite")]
fn lock_migrator(
    mutex: &Mutex<crate::Migrator>,
) -> Result<MutexGuard<'_, crate::Migrator>, StorageError> {
    mutex.lock().map_err(|e: PoisonError<_>| {
        StorageError::Migration(format!("migrator lock poisoned: {e}"))
    })
}

/// Runner for whichever database the URL selected. SQLite work runs on the
/// blocking pool so callers can stay async.
#[derive(Clone, Debug)]
pub enum MigrationBackend {
    #[cfg(feature = "sqlite")]
    Sqlite(Arc<Mutex<crate::Migrator>>),
    #[cfg(feature = "postgres")]
    Postgres(crate::pg_runner::PgMigrator),
}

impl MigrationBackend {
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        match DatabaseLocation::parse(url)? {
            #[cfg(feature = "sqlite")]
            DatabaseLocation::Sqlite(path) => Self::open_sqlite(path).await,
            #[cfg(not(feature = "sqlite"))]
            DatabaseLocation::Sqlite(path) => Err(StorageError::UnsupportedDatabase(format!(
                "{} (built without sqlite support)",
                path.display()
            ))),
            #[cfg(feature = "postgres")]
            DatabaseLocation::Postgres(url) => {
                Ok(Self::Postgres(crate::pg_runner::PgMigrator::connect(&url).await?))
            },
            #[cfg(not(feature = "postgres"))]
            DatabaseLocation::Postgres(url) => Err(StorageError::UnsupportedDatabase(format!(
                "{url} (built without postgres support)"
            ))),
        }
    }

    #[cfg(feature = "sqlite")]
    async fn open_sqlite(path: PathBuf) -> Result<Self, StorageError> {
        let migrator = tokio::task::spawn_blocking(move || crate::Migrator::open(&path)).await??;
        Ok(Self::Sqlite(Arc::new(Mutex::new(migrator))))
    }

    pub async fn current(&self) -> Result<Option<&'static Revision>, StorageError> {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(m) => blocking(m, |m| m.current()).await,
            #[cfg(feature = "postgres")]
            Self::Postgres(m) => m.current().await,
        }
    }

    pub async fn upgrade(&self, target: Target) -> Result<MigrationReport, StorageError> {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(m) => blocking(m, move |m| m.upgrade(&target)).await,
            #[cfg(feature = "postgres")]
            Self::Postgres(m) => m.upgrade(&target).await,
        }
    }

    pub async fn downgrade(&self, target: Target) -> Result<MigrationReport, StorageError> {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(m) => blocking(m, move |m| m.downgrade(&target)).await,
            #[cfg(feature = "postgres")]
            Self::Postgres(m) => m.downgrade(&target).await,
        }
    }

    pub async fn stamp(&self, target: Target) -> Result<Option<&'static Revision>, StorageError> {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(m) => blocking(m, move |m| m.stamp(&target)).await,
            #[cfg(feature = "postgres")]
            Self::Postgres(m) => m.stamp(&target).await,
        }
    }

    pub async fn history(&self) -> Result<Vec<HistoryEntry>, StorageError> {
        match self {
            #[cfg(feature = "sqlite")]
            Self::Sqlite(m) => blocking(m, |m| m.history()).await,
            #[cfg(feature = "postgres")]
            Self::Postgres(m) => m.history().await,
        }
    }
}

#[cfg(feature = "sqlite")]
async fn blocking<T, F>(migrator: &Arc<Mutex<crate::Migrator>>, f: F) -> Result<T, StorageError>
where
    T: Send + 'static,
    F: FnOnce(&mut crate::Migrator) -> Result<T, StorageError> + Send + 'static,
{
    let migrator = Arc::clone(migrator);
    tokio::task::spawn_blocking(move || {
        let mut guard = lock_migrator(&migrator)?;
        f(&mut guard)
    })
    .await?
}
