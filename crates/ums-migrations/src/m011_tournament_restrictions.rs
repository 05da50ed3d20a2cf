use rusqlite::Connection;
use ums_common::Result;
use ums_db::schema::{add_columns_if_missing, drop_column_if_present};
use ums_db::{Apply, MigrationDefinition, Rollback};

/// Comma-separated region and rank filters for registration.
const COLUMNS: &[(&str, &str)] = &[
    ("allowed_regions", "TEXT"),
    ("allowed_ranks", "TEXT"),
];

pub(crate) fn definition() -> MigrationDefinition {
    MigrationDefinition::new(
        11,
        "add_tournament_restrictions",
        Apply::run(apply),
        Rollback::run(rollback),
    )
}

fn apply(conn: &Connection) -> Result<()> {
    add_columns_if_missing(conn, "tournaments", COLUMNS)?;
    Ok(())
}

fn rollback(conn: &Connection) -> Result<()> {
    for (column, _) in COLUMNS {
        drop_column_if_present(conn, "tournaments", column)?;
    }
    Ok(())
}
