//! Guarded DDL helpers for migration bodies.
//!
//! Each helper introspects first and only issues the statement when the
//! schema does not already match, so a body built from them can run against
//! a database that was partially patched by hand.

use rusqlite::Connection;
use tracing::{debug, info};
use ums_common::{Error, Result};

use crate::introspect::SchemaIntrospector;

/// Quote an SQLite identifier.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// `ALTER TABLE .. ADD COLUMN` unless `column` already exists. Returns
/// whether the column was added. The table itself must exist.
pub fn add_column_if_missing(
    conn: &Connection,
    table: &str,
    column: &str,
    definition: &str,
) -> Result<bool> {
    let columns = SchemaIntrospector::new(conn).columns(table)?;
    if let Some(existing) = columns.iter().find(|c| c.eq_ignore_ascii_case(column)) {
        debug!("column {table}.{column} already exists as {existing}, skipping");
        return Ok(false);
    }

    conn.execute_batch(&format!(
        "ALTER TABLE {} ADD COLUMN {} {definition}",
        quote_ident(table),
        quote_ident(column)
    ))
    .map_err(|e| Error::Database(format!("failed to add column {table}.{column}: {e}")))?;
    info!("added column {table}.{column}");
    Ok(true)
}

/// Add every `(column, definition)` pair that is missing. Returns the
/// number of columns added.
pub fn add_columns_if_missing(
    conn: &Connection,
    table: &str,
    columns: &[(&str, &str)],
) -> Result<usize> {
    let mut added = 0;
    for (column, definition) in columns {
        if add_column_if_missing(conn, table, column, definition)? {
            added += 1;
        }
    }
    Ok(added)
}

/// `ALTER TABLE .. DROP COLUMN` when the column is present. A missing table
/// counts as nothing to drop.
pub fn drop_column_if_present(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let Some(snapshot) = SchemaIntrospector::new(conn).snapshot(table)? else {
        debug!("table {table} is absent, nothing to drop");
        return Ok(false);
    };
    if !snapshot.has(column) {
        debug!("column {table}.{column} is absent, skipping drop");
        return Ok(false);
    }

    conn.execute_batch(&format!(
        "ALTER TABLE {} DROP COLUMN {}",
        quote_ident(table),
        quote_ident(column)
    ))
    .map_err(|e| Error::Database(format!("failed to drop column {table}.{column}: {e}")))?;
    info!("dropped column {table}.{column}");
    Ok(true)
}
