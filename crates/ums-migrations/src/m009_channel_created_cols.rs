use rusqlite::Connection;
use ums_common::Result;
use ums_db::schema::{add_columns_if_missing, drop_column_if_present};
use ums_db::{Apply, MigrationDefinition, Rollback};

/// Flags recording whether setup created each channel itself.
const COLUMNS: &[(&str, &str)] = &[
    ("onboarding_channel_created", "INTEGER DEFAULT 0"),
    ("admin_channel_created", "INTEGER DEFAULT 0"),
    ("announce_channel_created", "INTEGER DEFAULT 0"),
];

pub(crate) fn definition() -> MigrationDefinition {
    MigrationDefinition::new(
        9,
        "add_channel_created_cols",
        Apply::run(apply),
        Rollback::run(rollback),
    )
}

fn apply(conn: &Connection) -> Result<()> {
    add_columns_if_missing(conn, "guild_config", COLUMNS)?;
    Ok(())
}

fn rollback(conn: &Connection) -> Result<()> {
    for (column, _) in COLUMNS {
        drop_column_if_present(conn, "guild_config", column)?;
    }
    Ok(())
}
