use rusqlite::Connection;
use ums_common::Result;
use ums_db::schema::{add_columns_if_missing, drop_column_if_present};
use ums_db::{Apply, MigrationDefinition, Rollback};

/// A reported winner awaiting confirmation from the other side.
const COLUMNS: &[(&str, &str)] = &[
    ("pending_winner_entry_id", "INTEGER"),
    ("pending_reported_by", "INTEGER"),
];

pub(crate) fn definition() -> MigrationDefinition {
    MigrationDefinition::new(
        14,
        "add_match_pending_result",
        Apply::run(apply),
        Rollback::run(rollback),
    )
}

fn apply(conn: &Connection) -> Result<()> {
    add_columns_if_missing(conn, "matches", COLUMNS)?;
    Ok(())
}

fn rollback(conn: &Connection) -> Result<()> {
    for (column, _) in COLUMNS {
        drop_column_if_present(conn, "matches", column)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ums_common::Error;

    #[test]
    fn missing_matches_table_is_an_error() {
        let conn = Connection::open_in_memory().unwrap();
        let err = apply(&conn).unwrap_err();
        assert!(matches!(err, Error::SchemaRead { .. }));
        // rollback tolerates the absent table
        rollback(&conn).unwrap();
    }
}
