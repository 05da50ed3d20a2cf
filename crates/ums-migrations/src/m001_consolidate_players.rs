//! Merge the legacy `players` + `player_ranks` pair into one `players` table.
//!
//! The old tables are kept as `players_backup` and `player_ranks_backup`.
//! Databases that never had the legacy pair are left untouched.

use rusqlite::Connection;
use tracing::{debug, info};
use ums_common::{Error, Result};
use ums_db::schema::add_columns_if_missing;
use ums_db::{Apply, MigrationDefinition, Rollback, SchemaIntrospector};

use crate::exec;

const LEGACY_RANK_COLUMNS: &[&str] = &["user_id", "rank", "region", "elo_1v1", "elo_2v2", "elo_3v3"];

// Columns the merge reads that older player_ranks tables may lack.
const RANK_EXTRAS: &[(&str, &str)] = &[
    ("has_onboarded", "INTEGER DEFAULT 0"),
    ("provisional_games_1v1", "INTEGER DEFAULT 0"),
    ("provisional_games_2v2", "INTEGER DEFAULT 0"),
    ("provisional_games_3v3", "INTEGER DEFAULT 0"),
    ("total_wins", "INTEGER DEFAULT 0"),
    ("total_losses", "INTEGER DEFAULT 0"),
    ("current_win_streak", "INTEGER DEFAULT 0"),
    ("best_win_streak", "INTEGER DEFAULT 0"),
    ("tournaments_won", "INTEGER DEFAULT 0"),
    ("last_tournament_at", "INTEGER DEFAULT 0"),
    ("smurf_flagged", "INTEGER DEFAULT 0"),
    ("smurf_flagged_at", "INTEGER DEFAULT 0"),
    ("queue_leaves", "INTEGER DEFAULT 0"),
    ("queue_banned_until", "INTEGER"),
    ("rank_locked", "INTEGER DEFAULT 0"),
];

const PLAYER_EXTRAS: &[(&str, &str)] = &[
    ("region", "TEXT"),
    ("tournaments_played", "INTEGER DEFAULT 0"),
    ("first_place", "INTEGER DEFAULT 0"),
    ("second_place", "INTEGER DEFAULT 0"),
    ("third_place", "INTEGER DEFAULT 0"),
    ("tournament_matches_won", "INTEGER DEFAULT 0"),
    ("tournament_matches_lost", "INTEGER DEFAULT 0"),
    ("casual_matches_won", "INTEGER DEFAULT 0"),
    ("casual_matches_lost", "INTEGER DEFAULT 0"),
];

const CREATE_STAGING: &str = "
DROP TABLE IF EXISTS players_new;
CREATE TABLE players_new (
    id                      INTEGER PRIMARY KEY AUTOINCREMENT,
    discord_id              INTEGER NOT NULL UNIQUE,
    claimed_rank            TEXT,
    mode_main               TEXT,
    region                  TEXT,
    has_onboarded           INTEGER DEFAULT 0,
    elo_1v1                 INTEGER,
    elo_2v2                 INTEGER,
    elo_3v3                 INTEGER,
    provisional_games_1v1   INTEGER DEFAULT 0,
    provisional_games_2v2   INTEGER DEFAULT 0,
    provisional_games_3v3   INTEGER DEFAULT 0,
    tournaments_played      INTEGER DEFAULT 0,
    first_place             INTEGER DEFAULT 0,
    second_place            INTEGER DEFAULT 0,
    third_place             INTEGER DEFAULT 0,
    tournament_matches_won  INTEGER DEFAULT 0,
    tournament_matches_lost INTEGER DEFAULT 0,
    casual_matches_won      INTEGER DEFAULT 0,
    casual_matches_lost     INTEGER DEFAULT 0,
    total_wins              INTEGER DEFAULT 0,
    total_losses            INTEGER DEFAULT 0,
    current_win_streak      INTEGER DEFAULT 0,
    best_win_streak         INTEGER DEFAULT 0,
    tournaments_won         INTEGER DEFAULT 0,
    last_tournament_at      INTEGER DEFAULT 0,
    smurf_flagged           INTEGER DEFAULT 0,
    smurf_flagged_at        INTEGER DEFAULT 0,
    queue_leaves            INTEGER DEFAULT 0,
    queue_banned_until      INTEGER,
    rank_locked             INTEGER DEFAULT 0,
    created_at              TEXT NOT NULL,
    last_seen_at            TEXT NOT NULL
);
";

const MERGE: &str = "
INSERT INTO players_new (
    discord_id, claimed_rank, mode_main, region, has_onboarded,
    elo_1v1, elo_2v2, elo_3v3,
    provisional_games_1v1, provisional_games_2v2, provisional_games_3v3,
    tournaments_played, first_place, second_place, third_place,
    tournament_matches_won, tournament_matches_lost,
    casual_matches_won, casual_matches_lost,
    total_wins, total_losses, current_win_streak, best_win_streak,
    tournaments_won, last_tournament_at,
    smurf_flagged, smurf_flagged_at, queue_leaves, queue_banned_until,
    rank_locked, created_at, last_seen_at
)
SELECT
    COALESCE(p.user_id, pr.user_id),
    pr.rank,
    NULL,
    COALESCE(pr.region, p.region),
    COALESCE(pr.has_onboarded, 0),
    COALESCE(pr.elo_1v1, 1000),
    COALESCE(pr.elo_2v2, 1000),
    COALESCE(pr.elo_3v3, 1000),
    COALESCE(pr.provisional_games_1v1, 0),
    COALESCE(pr.provisional_games_2v2, 0),
    COALESCE(pr.provisional_games_3v3, 0),
    COALESCE(p.tournaments_played, 0),
    COALESCE(p.first_place, 0),
    COALESCE(p.second_place, 0),
    COALESCE(p.third_place, 0),
    COALESCE(p.tournament_matches_won, 0),
    COALESCE(p.tournament_matches_lost, 0),
    COALESCE(p.casual_matches_won, 0),
    COALESCE(p.casual_matches_lost, 0),
    COALESCE(pr.total_wins, 0),
    COALESCE(pr.total_losses, 0),
    COALESCE(pr.current_win_streak, 0),
    COALESCE(pr.best_win_streak, 0),
    COALESCE(pr.tournaments_won, 0),
    COALESCE(pr.last_tournament_at, 0),
    COALESCE(pr.smurf_flagged, 0),
    COALESCE(pr.smurf_flagged_at, 0),
    COALESCE(pr.queue_leaves, 0),
    pr.queue_banned_until,
    COALESCE(pr.rank_locked, 0),
    datetime('now'),
    datetime('now')
FROM player_ranks pr
LEFT JOIN players p ON p.user_id = pr.user_id
UNION
SELECT
    p.user_id, NULL, NULL, p.region, 0,
    1000, 1000, 1000,
    0, 0, 0,
    p.tournaments_played, p.first_place, p.second_place, p.third_place,
    p.tournament_matches_won, p.tournament_matches_lost,
    p.casual_matches_won, p.casual_matches_lost,
    0, 0, 0, 0,
    0, 0,
    0, 0, 0, NULL,
    0, datetime('now'), datetime('now')
FROM players p
WHERE NOT EXISTS (SELECT 1 FROM player_ranks pr WHERE pr.user_id = p.user_id);
";

const SWAP: &str = "
ALTER TABLE players RENAME TO players_backup;
ALTER TABLE player_ranks RENAME TO player_ranks_backup;
ALTER TABLE players_new RENAME TO players;
CREATE INDEX IF NOT EXISTS idx_players_discord_id ON players(discord_id);
";

const RESTORE: &str = "
DROP INDEX IF EXISTS idx_players_discord_id;
DROP TABLE players;
ALTER TABLE players_backup RENAME TO players;
ALTER TABLE player_ranks_backup RENAME TO player_ranks;
";

pub(crate) fn definition() -> MigrationDefinition {
    MigrationDefinition::new(
        1,
        "consolidate_players",
        Apply::run(apply),
        Rollback::run(rollback),
    )
}

fn has_legacy_pair(conn: &Connection) -> Result<bool> {
    let introspector = SchemaIntrospector::new(conn);
    if !introspector.table_exists("players")? {
        return Ok(false);
    }
    let Some(ranks) = introspector.snapshot("player_ranks")? else {
        debug!("player_ranks absent, nothing to consolidate");
        return Ok(false);
    };
    let missing = ranks.missing(LEGACY_RANK_COLUMNS);
    if !missing.is_empty() {
        debug!(
            "player_ranks lacks legacy columns ({}), skipping consolidation",
            missing.join(", ")
        );
        return Ok(false);
    }
    Ok(true)
}

fn apply(conn: &Connection) -> Result<()> {
    if !has_legacy_pair(conn)? {
        return Ok(());
    }

    let introspector = SchemaIntrospector::new(conn);
    for backup in ["players_backup", "player_ranks_backup"] {
        if introspector.table_exists(backup)? {
            return Err(Error::Other(format!(
                "{backup} already exists; move it aside before consolidating players"
            )));
        }
    }

    add_columns_if_missing(conn, "player_ranks", RANK_EXTRAS)?;
    add_columns_if_missing(conn, "players", PLAYER_EXTRAS)?;

    exec(conn, CREATE_STAGING, "failed to create players_new")?;
    let merged = conn
        .execute(MERGE, [])
        .map_err(|e| Error::Database(format!("failed to merge player records: {e}")))?;
    exec(conn, SWAP, "failed to swap player tables")?;

    info!("consolidated {merged} player records; legacy tables kept as *_backup");
    Ok(())
}

fn rollback(conn: &Connection) -> Result<()> {
    let introspector = SchemaIntrospector::new(conn);
    let players = introspector.table_exists("players_backup")?;
    let ranks = introspector.table_exists("player_ranks_backup")?;

    match (players, ranks) {
        (false, false) => {
            debug!("no player backups present, consolidation never ran");
            Ok(())
        }
        (true, true) => {
            exec(conn, RESTORE, "failed to restore legacy player tables")?;
            info!("restored players and player_ranks from backups");
            Ok(())
        }
        _ => Err(Error::Other(
            "only one of players_backup and player_ranks_backup exists".into(),
        )),
    }
}
