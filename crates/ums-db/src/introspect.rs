use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use ums_common::{Error, Result};

/// Runtime view of the current schema. Migrations use it to decide whether
/// their change is already present instead of relying on a fixed model of
/// the whole database.
pub struct SchemaIntrospector<'c> {
    conn: &'c Connection,
}

/// Column set of one table at one point in time. Never persisted.
///
/// Lookups ignore ASCII case, like SQLite identifiers do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSnapshot {
    pub table: String,
    pub columns: BTreeSet<String>,
    pub taken_at: DateTime<Utc>,
}

impl SchemaSnapshot {
    pub fn has(&self, column: &str) -> bool {
        self.columns
            .iter()
            .any(|existing| existing.eq_ignore_ascii_case(column))
    }

    /// The subset of `desired` not present yet, in the given order.
    pub fn missing<'a>(&self, desired: &[&'a str]) -> Vec<&'a str> {
        desired
            .iter()
            .copied()
            .filter(|column| !self.has(column))
            .collect()
    }
}

impl<'c> SchemaIntrospector<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
                params![table],
                |row| row.get(0),
            )
            .map_err(|e| schema_read(table, e))?;
        Ok(count > 0)
    }

    pub fn index_exists(&self, index: &str) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type = 'index' AND name = ?1 COLLATE NOCASE",
                params![index],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("failed to look up index {index}: {e}")))?;
        Ok(count > 0)
    }

    /// Names of all user tables, sorted.
    pub fn tables(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
            )
            .map_err(|e| Error::Database(format!("failed to prepare table listing: {e}")))?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| Error::Database(format!("failed to list tables: {e}")))?;

        let mut tables = Vec::new();
        for row in rows {
            tables.push(row.map_err(|e| Error::Database(format!("failed to read table row: {e}")))?);
        }
        Ok(tables)
    }

    /// Column names of `table`. A missing table is an error here; callers
    /// that create the table use [`SchemaIntrospector::snapshot`] instead.
    pub fn columns(&self, table: &str) -> Result<BTreeSet<String>> {
        if !self.table_exists(table)? {
            return Err(Error::SchemaRead {
                table: table.to_string(),
                reason: "table does not exist".into(),
            });
        }
        self.read_columns(table)
    }

    /// Snapshot of `table`, or `None` when the table is absent.
    pub fn snapshot(&self, table: &str) -> Result<Option<SchemaSnapshot>> {
        if !self.table_exists(table)? {
            return Ok(None);
        }
        Ok(Some(SchemaSnapshot {
            table: table.to_string(),
            columns: self.read_columns(table)?,
            taken_at: Utc::now(),
        }))
    }

    fn read_columns(&self, table: &str) -> Result<BTreeSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1)")
            .map_err(|e| schema_read(table, e))?;

        let rows = stmt
            .query_map(params![table], |row| row.get::<_, String>(0))
            .map_err(|e| schema_read(table, e))?;

        let mut columns = BTreeSet::new();
        for row in rows {
            columns.insert(row.map_err(|e| schema_read(table, e))?);
        }
        Ok(columns)
    }
}

fn schema_read(table: &str, e: rusqlite::Error) -> Error {
    Error::SchemaRead {
        table: table.to_string(),
        reason: e.to_string(),
    }
}
