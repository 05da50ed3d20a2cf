use rusqlite::{Connection, params};
use tracing::info;
use ums_common::{Error, Result};
use ums_db::{Apply, MigrationDefinition, Rollback};

use crate::exec;

/// Value written to `meta.schema_version` by the baseline.
pub const SCHEMA_VERSION: u32 = 4;

// Indexes over tournaments, entries and matches are created by ordinal 10,
// after a legacy tournaments table has been rebuilt into the core shape.
const BASELINE: &str = "
CREATE TABLE IF NOT EXISTS meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS players (
    user_id         INTEGER PRIMARY KEY,
    discord_id      INTEGER UNIQUE,
    display_name    TEXT,
    region          TEXT,
    primary_mode    TEXT,
    claimed_rank    TEXT,
    has_onboarded   INTEGER DEFAULT 0,
    created_at      INTEGER DEFAULT (strftime('%s', 'now')),
    updated_at      INTEGER DEFAULT (strftime('%s', 'now'))
);

CREATE TABLE IF NOT EXISTS guild_config (
    guild_id                    INTEGER PRIMARY KEY,
    admin_channel               INTEGER,
    announce_channel            INTEGER,
    request_channel             INTEGER,
    onboarding_channel          INTEGER,
    ums_admin_role              INTEGER,
    setup_completed             INTEGER DEFAULT 0,
    onboarding_channel_created  INTEGER DEFAULT 0,
    admin_channel_created       INTEGER DEFAULT 0,
    announce_channel_created    INTEGER DEFAULT 0,
    created_at                  INTEGER DEFAULT (strftime('%s', 'now')),
    updated_at                  INTEGER DEFAULT (strftime('%s', 'now'))
);

CREATE TABLE IF NOT EXISTS tournament_requests (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    guild_id            INTEGER NOT NULL,
    requester_id        INTEGER NOT NULL,
    name                TEXT NOT NULL,
    region              TEXT,
    format              TEXT,
    size                TEXT,
    match_length        TEXT,
    start_time          TEXT,
    scheduled_start     INTEGER,
    rank_restriction    TEXT,
    region_restriction  TEXT,
    status              TEXT DEFAULT 'pending',
    admin_message_id    INTEGER,
    resolved_by         INTEGER,
    resolved_at         INTEGER,
    decline_reason      TEXT,
    tournament_key      TEXT,
    created_at          INTEGER DEFAULT (strftime('%s', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_requests_guild_status ON tournament_requests(guild_id, status);
CREATE INDEX IF NOT EXISTS idx_requests_requester ON tournament_requests(requester_id);

CREATE TABLE IF NOT EXISTS tournaments (
    id                      INTEGER PRIMARY KEY AUTOINCREMENT,
    guild_id                INTEGER NOT NULL,
    name                    TEXT NOT NULL,
    tournament_code         TEXT UNIQUE,
    format                  TEXT NOT NULL,
    size                    INTEGER NOT NULL,
    status                  TEXT NOT NULL DEFAULT 'draft',
    reg_message_id          INTEGER,
    reg_channel_id          INTEGER,
    allowed_regions         TEXT,
    allowed_ranks           TEXT,
    winner_player_id        INTEGER,
    runner_up_player_id     INTEGER,
    completed_at            INTEGER,
    dashboard_channel_id    INTEGER,
    dashboard_message_id    INTEGER,
    created_at              INTEGER DEFAULT (strftime('%s', 'now'))
);

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

CREATE TABLE IF NOT EXISTS matches (
    id                      INTEGER PRIMARY KEY AUTOINCREMENT,
    tournament_id           INTEGER NOT NULL,
    round                   INTEGER NOT NULL,
    match_index             INTEGER NOT NULL,
    entry1_id               INTEGER,
    entry2_id               INTEGER,
    winner_entry_id         INTEGER,
    score_text              TEXT,
    status                  TEXT NOT NULL DEFAULT 'pending',
    pending_winner_entry_id INTEGER,
    pending_reported_by     INTEGER,
    FOREIGN KEY (tournament_id) REFERENCES tournaments(id)
);

CREATE TABLE IF NOT EXISTS server_configs (
    guild_id                    INTEGER PRIMARY KEY,
    tournament_requests_channel INTEGER,
    admin_review_channel        INTEGER,
    registration_channel        INTEGER,
    results_channel             INTEGER,
    casual_match_channel        INTEGER,
    rank_channel                INTEGER,
    clan_channel                INTEGER,
    audit_channel               INTEGER,
    admin_role                  INTEGER,
    organizer_role              INTEGER,
    enabled                     INTEGER DEFAULT 1,
    setup_completed             INTEGER DEFAULT 0,
    setup_date                  INTEGER,
    enable_leaderboard          INTEGER DEFAULT 1,
    enable_player_profiles      INTEGER DEFAULT 1,
    enable_casual_matches       INTEGER DEFAULT 1,
    created_at                  INTEGER,
    updated_at                  INTEGER
);

CREATE TABLE IF NOT EXISTS organizer_cooldowns (
    user_id         INTEGER PRIMARY KEY,
    cooldown_until  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS organizer_bans (
    user_id     INTEGER PRIMARY KEY,
    reason      TEXT,
    banned_at   INTEGER,
    banned_by   TEXT
);
";

pub(crate) fn definition() -> MigrationDefinition {
    MigrationDefinition::new(
        0,
        "core_schema",
        Apply::run(apply),
        Rollback::unsupported("baseline tables hold all bot data"),
    )
}

fn apply(conn: &Connection) -> Result<()> {
    exec(conn, BASELINE, "failed to create core tables")?;
    conn.execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', ?1)",
        params![SCHEMA_VERSION.to_string()],
    )
    .map_err(|e| Error::Database(format!("failed to record schema version: {e}")))?;
    info!("core schema ensured (v{SCHEMA_VERSION})");
    Ok(())
}
