use rusqlite::Connection;
use ums_common::Result;
use ums_db::schema::{add_columns_if_missing, drop_column_if_present};
use ums_db::{Apply, MigrationDefinition, Rollback};

const COLUMNS: &[(&str, &str)] = &[
    ("winner_player_id", "INTEGER"),
    ("runner_up_player_id", "INTEGER"),
    ("completed_at", "INTEGER"),
];

pub(crate) fn definition() -> MigrationDefinition {
    MigrationDefinition::new(
        12,
        "add_tournament_archive_fields",
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
