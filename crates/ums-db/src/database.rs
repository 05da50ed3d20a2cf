use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Local;
use rusqlite::{Connection, OpenFlags, params};
use tracing::info;
use ums_common::{Error, MigrationId, Result};

use crate::outcome::{MigrationStatus, RolledBack, RunOutcome};
use crate::runner::Migrator;

/// The single connection the engine works against.
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening database at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(db_path.to_path_buf()),
        })
    }

    /// Open a database that must already exist, for read-mostly commands.
    /// A missing file is `NotFound` and nothing is created; the journal
    /// mode is left as the file has it.
    pub fn open_existing(db_path: &Path) -> Result<Self> {
        if !db_path.is_file() {
            return Err(Error::NotFound(format!(
                "database {} does not exist",
                db_path.display()
            )));
        }
        info!("opening existing database at {}", db_path.display());
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(db_path.to_path_buf()),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    pub fn with_busy_timeout(self, timeout: Duration) -> Result<Self> {
        self.connection()?
            .busy_timeout(timeout)
            .map_err(|e| Error::Database(format!("failed to set busy timeout: {e}")))?;
        Ok(self)
    }

    /// File backing this database, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("database lock poisoned".into()))
    }

    pub fn bootstrap(&self, migrator: &Migrator) -> Result<()> {
        let mut conn = self.connection()?;
        migrator.bootstrap(&mut conn)
    }

    pub fn pending(&self, migrator: &Migrator) -> Result<Vec<MigrationId>> {
        let conn = self.connection()?;
        migrator.pending(&conn)
    }

    pub fn migrate(&self, migrator: &Migrator) -> Result<RunOutcome> {
        let mut conn = self.connection()?;
        migrator.run(&mut conn)
    }

    pub fn migrate_to(&self, migrator: &Migrator, target: Option<u32>) -> Result<RunOutcome> {
        let mut conn = self.connection()?;
        migrator.run_to(&mut conn, target)
    }

    pub fn status(&self, migrator: &Migrator) -> Result<Vec<MigrationStatus>> {
        let conn = self.connection()?;
        migrator.status(&conn)
    }

    pub fn rollback(&self, migrator: &Migrator, ordinal: u32) -> Result<RolledBack> {
        let mut conn = self.connection()?;
        migrator.rollback(&mut conn, ordinal)
    }

    pub fn rollback_latest(&self, migrator: &Migrator) -> Result<Option<RolledBack>> {
        let mut conn = self.connection()?;
        migrator.rollback_latest(&mut conn)
    }

    /// Write a consistent copy of the database to `dest` with `VACUUM INTO`.
    pub fn backup_to(&self, dest: &Path) -> Result<()> {
        if dest.exists() {
            return Err(Error::Other(format!(
                "backup target {} already exists",
                dest.display()
            )));
        }
        let conn = self.connection()?;
        conn.execute("VACUUM INTO ?1", params![dest.to_string_lossy().into_owned()])
            .map_err(|e| Error::Database(format!("failed to back up database: {e}")))?;
        info!("database backed up to {}", dest.display());
        Ok(())
    }

    /// Back up into `dir` as `<stem>.backup_<YYYYmmdd_HHMMSS>.db`. Returns
    /// `None` for in-memory databases.
    pub fn backup_into_dir(&self, dir: &Path) -> Result<Option<PathBuf>> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        std::fs::create_dir_all(dir)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "database".to_string());
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let dest = dir.join(format!("{stem}.backup_{timestamp}.db"));
        self.backup_to(&dest)?;
        Ok(Some(dest))
    }
}
