use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use ums_common::{Error, MigrationId, Result, identity::is_valid_name};

use crate::catalog::Catalog;
use crate::introspect::SchemaIntrospector;
use crate::schema::quote_ident;

pub const DEFAULT_TRACKER_TABLE: &str = "applied_migrations";

/// One successfully applied migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedRecord {
    pub ordinal: u32,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

impl AppliedRecord {
    pub fn id(&self) -> MigrationId {
        MigrationId::new(self.ordinal, self.name.clone())
    }
}

/// Persistent applied-set, kept in a single table of
/// `(ordinal, name, applied_at)` rows.
///
/// Every method takes the connection explicitly so that writes land on the
/// caller's transaction.
#[derive(Debug, Clone)]
pub struct Tracker {
    table: String,
}

impl Default for Tracker {
    fn default() -> Self {
        Self {
            table: DEFAULT_TRACKER_TABLE.to_string(),
        }
    }
}

impl Tracker {
    pub fn new(table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        if !is_valid_name(&table) {
            return Err(Error::Config(format!(
                "invalid migration tracking table name `{table}`"
            )));
        }
        Ok(Self { table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the tracking table if it does not exist yet.
    pub fn bootstrap(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                ordinal    INTEGER PRIMARY KEY,
                name       TEXT NOT NULL,
                applied_at TEXT NOT NULL
            );",
            quote_ident(&self.table)
        ))
        .map_err(|e| Error::Database(format!("failed to create {}: {e}", self.table)))?;
        Ok(())
    }

    /// All applied records in ascending ordinal order. A database that was
    /// never bootstrapped reads as empty.
    pub fn applied(&self, conn: &Connection) -> Result<Vec<AppliedRecord>> {
        if !SchemaIntrospector::new(conn).table_exists(&self.table)? {
            return Ok(Vec::new());
        }

        let mut stmt = conn
            .prepare(&format!(
                "SELECT ordinal, name, applied_at FROM {} ORDER BY ordinal ASC",
                quote_ident(&self.table)
            ))
            .map_err(|e| Error::Database(format!("failed to prepare applied query: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(AppliedRecord {
                    ordinal: row.get(0)?,
                    name: row.get(1)?,
                    applied_at: parse_datetime(&row.get::<_, String>(2)?),
                })
            })
            .map_err(|e| Error::Database(format!("failed to query applied migrations: {e}")))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(
                row.map_err(|e| Error::Database(format!("failed to read applied row: {e}")))?,
            );
        }
        Ok(records)
    }

    pub fn is_applied(&self, conn: &Connection, id: &MigrationId) -> Result<bool> {
        if !SchemaIntrospector::new(conn).table_exists(&self.table)? {
            return Ok(false);
        }
        let count: i64 = conn
            .query_row(
                &format!(
                    "SELECT COUNT(*) FROM {} WHERE ordinal = ?1",
                    quote_ident(&self.table)
                ),
                params![id.ordinal],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("failed to look up migration {id}: {e}")))?;
        Ok(count > 0)
    }

    pub fn mark_applied(
        &self,
        conn: &Connection,
        id: &MigrationId,
        applied_at: DateTime<Utc>,
    ) -> Result<()> {
        conn.execute(
            &format!(
                "INSERT INTO {} (ordinal, name, applied_at) VALUES (?1, ?2, ?3)",
                quote_ident(&self.table)
            ),
            params![id.ordinal, id.name, applied_at.to_rfc3339()],
        )
        .map_err(|e| Error::TrackerWrite {
            id: id.clone(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    pub fn unmark(&self, conn: &Connection, id: &MigrationId) -> Result<()> {
        let removed = conn
            .execute(
                &format!("DELETE FROM {} WHERE ordinal = ?1", quote_ident(&self.table)),
                params![id.ordinal],
            )
            .map_err(|e| Error::TrackerWrite {
                id: id.clone(),
                reason: e.to_string(),
            })?;
        if removed == 0 {
            return Err(Error::TrackerWrite {
                id: id.clone(),
                reason: "no applied record to remove".into(),
            });
        }
        Ok(())
    }

    /// Import records from the bot's older `schema_migrations(version,
    /// applied_at)` table. Only versions that name a catalog entry exactly
    /// (same ordinal and name) and are not recorded yet are imported.
    pub fn adopt_legacy(
        &self,
        conn: &Connection,
        legacy_table: &str,
        catalog: &Catalog,
    ) -> Result<Vec<MigrationId>> {
        if legacy_table == self.table {
            return Ok(Vec::new());
        }
        let introspector = SchemaIntrospector::new(conn);
        let Some(snapshot) = introspector.snapshot(legacy_table)? else {
            return Ok(Vec::new());
        };
        if !snapshot.has("version") {
            debug!("legacy table {legacy_table} has no version column, ignoring");
            return Ok(Vec::new());
        }
        let has_applied_at = snapshot.has("applied_at");

        let select = if has_applied_at {
            format!(
                "SELECT version, applied_at FROM {}",
                quote_ident(legacy_table)
            )
        } else {
            format!("SELECT version, NULL FROM {}", quote_ident(legacy_table))
        };
        let mut stmt = conn
            .prepare(&select)
            .map_err(|e| Error::Database(format!("failed to read {legacy_table}: {e}")))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
            })
            .map_err(|e| Error::Database(format!("failed to read {legacy_table}: {e}")))?;

        let mut legacy = Vec::new();
        for row in rows {
            legacy.push(
                row.map_err(|e| Error::Database(format!("failed to read legacy row: {e}")))?,
            );
        }

        let mut adopted = Vec::new();
        for (version, applied_at) in legacy {
            let Some(id) = MigrationId::parse(&version) else {
                debug!("legacy version {version} is not an ordinal migration, ignoring");
                continue;
            };
            match catalog.get(id.ordinal) {
                Some(def) if def.name() == id.name => {}
                _ => {
                    debug!("legacy version {version} has no catalog counterpart, ignoring");
                    continue;
                }
            }
            if self.is_applied(conn, &id)? {
                continue;
            }
            let applied_at = applied_at
                .as_deref()
                .map(parse_datetime)
                .unwrap_or_else(Utc::now);
            self.mark_applied(conn, &id, applied_at)?;
            info!("adopted legacy record for migration {id}");
            adopted.push(id);
        }
        Ok(adopted)
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            // SQLite datetime('now') gives "YYYY-MM-DD HH:MM:SS"; older
            // scripts wrote naive ISO timestamps with fractional seconds.
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
                .map(|naive| naive.and_utc())
                .unwrap_or_else(|_| Utc::now())
        })
}
