//! Replace a legacy `tournaments` table keyed by TEXT `key` with the core
//! shape keyed by INTEGER `id`, then make sure entries and matches exist.
//!
//! The legacy table is dropped, not copied: its rows have no core
//! equivalent.

use rusqlite::Connection;
use tracing::{info, warn};
use ums_common::Result;
use ums_db::{Apply, MigrationDefinition, Rollback, SchemaIntrospector};

use crate::exec;

const CREATE_TOURNAMENTS: &str = "
DROP TABLE IF EXISTS tournaments;
CREATE TABLE tournaments (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    guild_id        INTEGER NOT NULL,
    name            TEXT NOT NULL,
    format          TEXT NOT NULL DEFAULT '1v1',
    size            INTEGER NOT NULL DEFAULT 8,
    status          TEXT NOT NULL DEFAULT 'draft',
    reg_message_id  INTEGER,
    reg_channel_id  INTEGER,
    created_at      INTEGER DEFAULT (strftime('%s', 'now'))
);
";

const ENSURE_CHILDREN: &str = "
CREATE INDEX IF NOT EXISTS idx_tournaments_guild_status ON tournaments(guild_id, status);

CREATE TABLE IF NOT EXISTS tournament_entries (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    tournament_id   INTEGER NOT NULL,
    player1_id      INTEGER NOT NULL,
    player2_id      INTEGER,
    team_name       TEXT,
    seed            INTEGER,
    created_at      INTEGER DEFAULT (strftime('%s', 'now')),
    FOREIGN KEY (tournament_id) REFERENCES tournaments(id)
);
CREATE INDEX IF NOT EXISTS idx_entries_tournament ON tournament_entries(tournament_id);

CREATE TABLE IF NOT EXISTS matches (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    tournament_id   INTEGER NOT NULL,
    round           INTEGER NOT NULL,
    match_index     INTEGER NOT NULL,
    entry1_id       INTEGER,
    entry2_id       INTEGER,
    winner_entry_id INTEGER,
    score_text      TEXT,
    status          TEXT NOT NULL DEFAULT 'pending',
    FOREIGN KEY (tournament_id) REFERENCES tournaments(id)
);
CREATE INDEX IF NOT EXISTS idx_matches_tournament ON matches(tournament_id);
";

pub(crate) fn definition() -> MigrationDefinition {
    MigrationDefinition::new(
        10,
        "recreate_tournaments_table",
        Apply::run(apply),
        Rollback::unsupported("the legacy tournaments table is dropped"),
    )
}

fn needs_rebuild(conn: &Connection) -> Result<bool> {
    Ok(match SchemaIntrospector::new(conn).snapshot("tournaments")? {
        Some(snapshot) => !snapshot.has("id") || snapshot.has("key"),
        None => true,
    })
}

fn apply(conn: &Connection) -> Result<()> {
    if needs_rebuild(conn)? {
        warn!("rebuilding tournaments table in the core shape; legacy rows are discarded");
        exec(conn, CREATE_TOURNAMENTS, "failed to recreate tournaments")?;
        info!("tournaments table recreated");
    }
    exec(conn, ENSURE_CHILDREN, "failed to ensure tournament tables")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebuilds_keyed_table() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE tournaments (key TEXT PRIMARY KEY, name TEXT);
             INSERT INTO tournaments VALUES ('cup', 'Cup');",
        )
        .unwrap();

        apply(&conn).unwrap();

        let introspector = SchemaIntrospector::new(&conn);
        let columns = introspector.columns("tournaments").unwrap();
        assert!(columns.contains("id"));
        assert!(!columns.contains("key"));
        assert!(introspector.table_exists("tournament_entries").unwrap());
        assert!(introspector.index_exists("idx_matches_tournament").unwrap());
    }

    #[test]
    fn keeps_core_table_and_rows() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE tournaments (id INTEGER PRIMARY KEY, guild_id INTEGER, name TEXT, status TEXT);
             INSERT INTO tournaments (guild_id, name, status) VALUES (1, 'Cup', 'open');",
        )
        .unwrap();

        apply(&conn).unwrap();
        apply(&conn).unwrap();

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM tournaments", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }
}
