//! UMS Core schema migrations.
//!
//! Each migration lives in its own module and exposes a `definition()`.
//! [`core_catalog`] collects them into the ordered catalog the engine runs.
//! Ordinals 3 through 8 belonged to the full tournament bot and are kept
//! reserved as explicit no-ops.

use rusqlite::Connection;
use ums_common::{CatalogError, Error, Result};
use ums_db::{Catalog, MigrationDefinition};

mod m000_core_schema;
mod m001_consolidate_players;
mod m002_players_v3_columns;
mod m009_channel_created_cols;
mod m010_recreate_tournaments;
mod m011_tournament_restrictions;
mod m012_tournament_archive_fields;
mod m013_tournament_dashboard;
mod m014_match_pending_result;
mod m015_tournament_code;
mod retired;

pub use m000_core_schema::SCHEMA_VERSION;
pub use m015_tournament_code::{CODE_ALPHABET, CODE_LENGTH, generate_code};

/// Tables every UMS Core database is expected to have once migrated.
pub const CORE_TABLES: &[&str] = &[
    "meta",
    "players",
    "guild_config",
    "tournament_requests",
    "tournaments",
    "tournament_entries",
    "matches",
    "organizer_cooldowns",
    "organizer_bans",
];

/// All UMS Core definitions, in authoring order.
pub fn core_definitions() -> Vec<MigrationDefinition> {
    let mut definitions = vec![
        m000_core_schema::definition(),
        m001_consolidate_players::definition(),
        m002_players_v3_columns::definition(),
    ];
    definitions.extend(retired::definitions());
    definitions.extend([
        m009_channel_created_cols::definition(),
        m010_recreate_tournaments::definition(),
        m011_tournament_restrictions::definition(),
        m012_tournament_archive_fields::definition(),
        m013_tournament_dashboard::definition(),
        m014_match_pending_result::definition(),
        m015_tournament_code::definition(),
    ]);
    definitions
}

pub fn core_catalog() -> std::result::Result<Catalog, CatalogError> {
    Catalog::new(core_definitions())
}

pub(crate) fn exec(conn: &Connection, sql: &str, what: &str) -> Result<()> {
    conn.execute_batch(sql)
        .map_err(|e| Error::Database(format!("{what}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ums_db::{Migrator, SchemaIntrospector, StepEvent};

    fn migrate(conn: &mut Connection) -> ums_db::RunOutcome {
        let migrator = Migrator::new(core_catalog().unwrap());
        migrator.run(conn).unwrap()
    }

    #[test]
    fn catalog_is_contiguous_from_baseline() {
        let catalog = core_catalog().unwrap();
        let ordinals: Vec<u32> = catalog.ids().map(|id| id.ordinal).collect();
        assert_eq!(ordinals, (0..=15).collect::<Vec<u32>>());
        for ordinal in 3..=8 {
            assert!(catalog.get(ordinal).unwrap().is_noop());
        }
    }

    #[test]
    fn fresh_database_migrates_then_skips() {
        let mut conn = Connection::open_in_memory().unwrap();

        let first = migrate(&mut conn);
        assert!(first.is_success(), "{:?}", first.failure());
        assert_eq!(first.applied_count(), 16);
        let noops = first
            .events()
            .iter()
            .filter(|e| matches!(e, StepEvent::NoOp(_)))
            .count();
        assert_eq!(noops, 6);

        let introspector = SchemaIntrospector::new(&conn);
        for table in CORE_TABLES {
            assert!(introspector.table_exists(table).unwrap(), "missing {table}");
        }
        let before = introspector.tables().unwrap();

        let second = migrate(&mut conn);
        assert_eq!(second.applied_count(), 0);
        assert_eq!(second.skipped_count(), 16);
        assert_eq!(SchemaIntrospector::new(&conn).tables().unwrap(), before);
    }

    #[test]
    fn legacy_records_are_adopted_not_rerun() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE schema_migrations (version TEXT PRIMARY KEY, applied_at TEXT NOT NULL);
             INSERT INTO schema_migrations VALUES ('001_consolidate_players', '2024-03-01T12:00:00');
             INSERT INTO schema_migrations VALUES ('002_add_players_v3_columns', '2024-03-01 12:00:05');",
        )
        .unwrap();

        let migrator = Migrator::new(core_catalog().unwrap())
            .with_legacy_table(Some("schema_migrations".to_string()));
        let outcome = migrator.run(&mut conn).unwrap();

        assert!(outcome.is_success());
        let skipped: Vec<u32> = outcome.skipped().iter().map(|id| id.ordinal).collect();
        assert_eq!(skipped, vec![1, 2]);
        assert_eq!(outcome.applied_count(), 14);
    }

    #[test]
    fn legacy_database_is_brought_up_to_core() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE players (
                user_id INTEGER PRIMARY KEY,
                region TEXT,
                tournaments_played INTEGER DEFAULT 0,
                first_place INTEGER DEFAULT 0,
                second_place INTEGER DEFAULT 0,
                third_place INTEGER DEFAULT 0,
                tournament_matches_won INTEGER DEFAULT 0,
                tournament_matches_lost INTEGER DEFAULT 0,
                casual_matches_won INTEGER DEFAULT 0,
                casual_matches_lost INTEGER DEFAULT 0
            );
            CREATE TABLE player_ranks (
                user_id INTEGER PRIMARY KEY,
                rank TEXT,
                region TEXT,
                elo_1v1 INTEGER,
                elo_2v2 INTEGER,
                elo_3v3 INTEGER
            );
            INSERT INTO players (user_id, region, tournaments_played) VALUES (10, 'EU', 3);
            INSERT INTO players (user_id, region) VALUES (11, 'NA');
            INSERT INTO player_ranks (user_id, rank, region, elo_1v1) VALUES (10, 'Diamond', NULL, 1400);
            INSERT INTO player_ranks (user_id, rank, region) VALUES (12, 'Gold', 'OCE');
            CREATE TABLE tournaments (key TEXT PRIMARY KEY, name TEXT);
            INSERT INTO tournaments VALUES ('spring-cup', 'Spring Cup');
            CREATE TABLE guild_config (guild_id INTEGER PRIMARY KEY, admin_channel INTEGER);",
        )
        .unwrap();

        let outcome = migrate(&mut conn);
        assert!(outcome.is_success(), "{:?}", outcome.failure());

        let introspector = SchemaIntrospector::new(&conn);
        assert!(introspector.table_exists("players_backup").unwrap());
        assert!(introspector.table_exists("player_ranks_backup").unwrap());

        let merged: i64 = conn
            .query_row("SELECT COUNT(*) FROM players", [], |row| row.get(0))
            .unwrap();
        assert_eq!(merged, 3);
        let elo: i64 = conn
            .query_row(
                "SELECT elo_1v1 FROM players WHERE discord_id = 10",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(elo, 1400);

        let tournaments = introspector.columns("tournaments").unwrap();
        assert!(tournaments.contains("id"));
        assert!(!tournaments.contains("key"));
        assert!(tournaments.contains("tournament_code"));

        let guild = introspector.columns("guild_config").unwrap();
        assert!(guild.contains("announce_channel_created"));

        let players = introspector.columns("players").unwrap();
        assert!(players.contains("rank_label"));
        assert!(players.contains("smurf_flagged_at"));
    }
}
