use rusqlite::Connection;
use ums_common::Result;
use ums_db::schema::{add_columns_if_missing, drop_column_if_present};
use ums_db::{Apply, MigrationDefinition, Rollback};

/// Where the live bracket dashboard message is posted.
const COLUMNS: &[(&str, &str)] = &[
    ("dashboard_channel_id", "INTEGER"),
    ("dashboard_message_id", "INTEGER"),
];

pub(crate) fn definition() -> MigrationDefinition {
    MigrationDefinition::new(
        13,
        "add_tournament_dashboard",
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
