use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{info, warn};
use ums_config::AppConfig;
use ums_db::{Database, Migrator, SchemaIntrospector, Tracker};
use ums_migrations::{CORE_TABLES, core_catalog};

use crate::report;

/// Everything a subcommand needs: the resolved config, the open database
/// and a migrator over the UMS Core catalog.
pub struct Workspace {
    pub config: AppConfig,
    pub db: Database,
    pub migrator: Migrator,
}

impl Workspace {
    /// For commands that write: a missing database file is created.
    pub fn open(config: AppConfig) -> Result<Self> {
        Self::with_database(config, Database::open)
    }

    /// For commands that only inspect: the database file must exist and is
    /// opened as it is.
    pub fn open_existing(config: AppConfig) -> Result<Self> {
        Self::with_database(config, Database::open_existing)
    }

    fn with_database(
        config: AppConfig,
        open: impl FnOnce(&Path) -> ums_common::Result<Database>,
    ) -> Result<Self> {
        // Catalog problems surface before the database is touched.
        let catalog = core_catalog().context("invalid migration catalog")?;
        let tracker = Tracker::new(config.migrations.table.clone())?;
        let migrator = Migrator::new(catalog)
            .with_tracker(tracker)
            .with_legacy_table(config.migrations.legacy_table.clone());

        let db = open(&config.database.path)
            .with_context(|| format!("cannot open {}", config.database.path.display()))?
            .with_busy_timeout(Duration::from_millis(config.database.busy_timeout_ms))?;

        Ok(Self {
            config,
            db,
            migrator,
        })
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

pub fn up(ws: &Workspace, to: Option<u32>, as_json: bool) -> Result<ExitCode> {
    // Adopted legacy records are not due, so adopt before counting.
    ws.db.bootstrap(&ws.migrator)?;
    let due = ws
        .db
        .pending(&ws.migrator)?
        .into_iter()
    .filter(|id| to.is_none_or(|target| id.ordinal <= target))
    .count();

    if due > 0 {
        if let Some(dir) = &ws.config.migrations.backup_dir {
            if let Some(path) = ws
                .db
                .backup_into_dir(dir)
                .context("pre-migration backup failed")?
            {
                info!("pre-migration backup written to {}", path.display());
            }
        }
    }

    let outcome = ws.db.migrate_to(&ws.migrator, to)?;
    if as_json {
        let failure = outcome.failure().map(|(id, cause)| {
            json!({ "migration": id, "error": cause.to_string() })
        });
        let body = json!({
            "success": outcome.is_success(),
            "applied": outcome.applied_count(),
            "skipped": outcome.skipped_count(),
            "events": outcome.events(),
            "failure": failure,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        print!("{}", report::render_run(&outcome, &ws.config.database.path));
    }
    Ok(exit_code(outcome.exit_code()))
}

pub fn status(ws: &Workspace, as_json: bool) -> Result<ExitCode> {
    let statuses = ws.db.status(&ws.migrator)?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
    } else {
        print!("{}", report::render_status(&statuses));
    }
    Ok(ExitCode::SUCCESS)
}

pub fn plan(ws: &Workspace, as_json: bool) -> Result<ExitCode> {
    let pending = ws.db.pending(&ws.migrator)?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&pending)?);
    } else {
        print!("{}", report::render_plan(&pending));
    }
    Ok(ExitCode::SUCCESS)
}

/// `None` rolls back the latest applied migration.
pub fn rollback(ws: &Workspace, ordinal: Option<u32>, as_json: bool) -> Result<ExitCode> {
    let rolled_back = match ordinal {
        Some(ordinal) => Some(ws.db.rollback(&ws.migrator, ordinal)?),
        None => ws.db.rollback_latest(&ws.migrator)?,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&rolled_back)?);
        return Ok(ExitCode::SUCCESS);
    }
    match rolled_back {
        Some(done) if done.schema_changed => println!("rolled back {}", done.id),
        Some(done) => println!("removed record for {} (no schema change)", done.id),
        None => println!("nothing to roll back"),
    }
    Ok(ExitCode::SUCCESS)
}

pub fn verify(ws: &Workspace, as_json: bool) -> Result<ExitCode> {
    let expected: Vec<String> = match &ws.config.migrations.expected_tables {
        Some(tables) => tables.clone(),
        None => CORE_TABLES.iter().map(|t| t.to_string()).collect(),
    };

    let missing = {
        let conn = ws.db.connection()?;
        let introspector = SchemaIntrospector::new(&conn);
        let mut missing = Vec::new();
        for table in &expected {
            if !introspector.table_exists(table)? {
                missing.push(table.clone());
            }
        }
        missing
    };

    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "expected": expected, "missing": missing }))?
        );
    } else {
        print!("{}", report::render_verify(&expected, &missing));
    }

    if missing.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        warn!("{} expected table(s) missing", missing.len());
        Ok(ExitCode::FAILURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.database.path = dir.join("tournament_bot_core.db");
        config.migrations.backup_dir = Some(dir.join("backups"));
        config
    }

    fn workspace(dir: &Path) -> Workspace {
        Workspace::open(config(dir)).unwrap()
    }

    fn backup_count(dir: &Path) -> usize {
        std::fs::read_dir(dir.join("backups")).map_or(0, |entries| entries.count())
    }

    #[test]
    fn up_backs_up_then_migrates_and_verifies() {
        let dir = tempfile::tempdir().unwrap();
        // give the backup something to copy
        rusqlite::Connection::open(dir.path().join("tournament_bot_core.db"))
            .unwrap()
            .execute_batch("CREATE TABLE guild_config (guild_id INTEGER PRIMARY KEY);")
            .unwrap();

        let ws = workspace(dir.path());
        assert_eq!(up(&ws, None, false).unwrap(), ExitCode::SUCCESS);
        assert_eq!(verify(&ws, false).unwrap(), ExitCode::SUCCESS);
        assert_eq!(backup_count(dir.path()), 1);

        // nothing due, so no second backup
        assert_eq!(up(&ws, None, true).unwrap(), ExitCode::SUCCESS);
        assert_eq!(backup_count(dir.path()), 1);
    }

    #[test]
    fn fully_adopted_legacy_database_is_not_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let conn = rusqlite::Connection::open(dir.path().join("tournament_bot_core.db")).unwrap();
        conn.execute_batch(
            "CREATE TABLE schema_migrations (version TEXT PRIMARY KEY, applied_at TEXT NOT NULL);",
        )
        .unwrap();
        for id in core_catalog().unwrap().ids() {
            conn.execute(
                "INSERT INTO schema_migrations VALUES (?1, '2024-03-01 12:00:00')",
                [id.to_string()],
            )
            .unwrap();
        }
        drop(conn);

        let ws = workspace(dir.path());
        assert_eq!(up(&ws, None, true).unwrap(), ExitCode::SUCCESS);
        assert_eq!(backup_count(dir.path()), 0);
        assert!(ws.db.pending(&ws.migrator).unwrap().is_empty());
    }

    #[test]
    fn inspecting_commands_never_create_the_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.database.path = dir.path().join("typo.db");

        let err = Workspace::open_existing(config).err().unwrap();
        assert!(format!("{err:#}").contains("does not exist"), "{err:#}");
        assert!(!dir.path().join("typo.db").exists());
    }

    #[test]
    fn plan_leaves_an_existing_database_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tournament_bot_core.db");
        rusqlite::Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE guild_config (guild_id INTEGER PRIMARY KEY);")
            .unwrap();

        let ws = Workspace::open_existing(config(dir.path())).unwrap();
        assert_eq!(plan(&ws, true).unwrap(), ExitCode::SUCCESS);
        assert_eq!(status(&ws, true).unwrap(), ExitCode::SUCCESS);
        drop(ws);

        let conn = rusqlite::Connection::open(&path).unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "delete");
        let introspector = SchemaIntrospector::new(&conn);
        assert_eq!(introspector.tables().unwrap(), vec!["guild_config"]);
    }

    #[test]
    fn verify_fails_on_empty_database() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::File::create(dir.path().join("tournament_bot_core.db")).unwrap();
        let ws = Workspace::open_existing(config(dir.path())).unwrap();
        assert_eq!(verify(&ws, true).unwrap(), ExitCode::FAILURE);
    }

    #[test]
    fn rollback_latest_makes_migration_pending_again() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        up(&ws, Some(9), false).unwrap();

        assert_eq!(rollback(&ws, None, false).unwrap(), ExitCode::SUCCESS);
        assert_eq!(plan(&ws, true).unwrap(), ExitCode::SUCCESS);

        let ids = ws.db.pending(&ws.migrator).unwrap();
        assert_eq!(ids.first().map(|id| id.ordinal), Some(9));
    }

    #[test]
    fn unsupported_rollback_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        up(&ws, Some(0), false).unwrap();
        assert!(rollback(&ws, Some(0), false).is_err());
    }
}
