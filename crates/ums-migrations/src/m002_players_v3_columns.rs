use rusqlite::Connection;
use tracing::info;
use ums_common::Result;
use ums_db::schema::add_columns_if_missing;
use ums_db::{Apply, MigrationDefinition, Rollback};

const COLUMNS: &[(&str, &str)] = &[
    ("elo_1v1", "INTEGER DEFAULT 1000"),
    ("elo_2v2", "INTEGER DEFAULT 1000"),
    ("elo_3v3", "INTEGER DEFAULT 1000"),
    ("provisional_games_1v1", "INTEGER DEFAULT 0"),
    ("provisional_games_2v2", "INTEGER DEFAULT 0"),
    ("provisional_games_3v3", "INTEGER DEFAULT 0"),
    ("rank_locked", "INTEGER DEFAULT 0"),
    ("rank_label", "TEXT"),
    ("rank", "TEXT"),
    ("verified", "INTEGER DEFAULT 0"),
    ("total_wins", "INTEGER DEFAULT 0"),
    ("total_losses", "INTEGER DEFAULT 0"),
    ("current_win_streak", "INTEGER DEFAULT 0"),
    ("best_win_streak", "INTEGER DEFAULT 0"),
    ("tournaments_won", "INTEGER DEFAULT 0"),
    ("last_tournament_at", "INTEGER DEFAULT 0"),
    ("queue_leaves", "INTEGER DEFAULT 0"),
    ("queue_banned_until", "INTEGER"),
    ("smurf_flagged", "INTEGER DEFAULT 0"),
    ("smurf_flagged_at", "INTEGER DEFAULT 0"),
];

pub(crate) fn definition() -> MigrationDefinition {
    MigrationDefinition::new(
        2,
        "add_players_v3_columns",
        Apply::run(apply),
        Rollback::unsupported("player ratings and stats would be lost"),
    )
}

fn apply(conn: &Connection) -> Result<()> {
    let added = add_columns_if_missing(conn, "players", COLUMNS)?;
    info!("players v3 columns ensured ({added} added)");
    Ok(())
}
