//! Short human-typeable tournament codes.
//!
//! Adds `tournaments.tournament_code` with a unique index and gives every
//! existing tournament a code. Codes avoid look-alike characters (`I`,
//! `O`, `0`, `1`).

use std::collections::HashSet;

use rand::Rng;
use rusqlite::{Connection, params};
use tracing::info;
use ums_common::{Error, Result};
use ums_db::schema::add_column_if_missing;
use ums_db::{Apply, MigrationDefinition, Rollback};

use crate::exec;

pub const CODE_ALPHABET: &str = "ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LENGTH: usize = 8;

pub(crate) fn definition() -> MigrationDefinition {
    MigrationDefinition::new(
        15,
        "add_tournament_code",
        Apply::run(apply),
        Rollback::unsupported("tournament codes are shared with players and cannot be reissued"),
    )
}

/// Random code of [`CODE_LENGTH`] characters from [`CODE_ALPHABET`].
pub fn generate_code<R: Rng>(rng: &mut R) -> String {
    let alphabet = CODE_ALPHABET.as_bytes();
    (0..CODE_LENGTH)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())] as char)
        .collect()
}

fn apply(conn: &Connection) -> Result<()> {
    add_column_if_missing(conn, "tournaments", "tournament_code", "TEXT")?;
    exec(
        conn,
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_tournaments_tournament_code \
         ON tournaments(tournament_code)",
        "failed to index tournament codes",
    )?;
    backfill(conn)
}

fn backfill(conn: &Connection) -> Result<()> {
    let db_err =
        |e: rusqlite::Error| Error::Database(format!("failed to backfill tournament codes: {e}"));

    let mut taken: HashSet<String> = {
        let mut stmt = conn
            .prepare("SELECT tournament_code FROM tournaments WHERE tournament_code IS NOT NULL")
            .map_err(db_err)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(db_err)?;
        rows.collect::<std::result::Result<_, _>>().map_err(db_err)?
    };

    let missing: Vec<i64> = {
        let mut stmt = conn
            .prepare("SELECT id FROM tournaments WHERE tournament_code IS NULL ORDER BY id")
            .map_err(db_err)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(db_err)?;
        rows.collect::<std::result::Result<_, _>>().map_err(db_err)?
    };
    if missing.is_empty() {
        return Ok(());
    }

    let mut rng = rand::rng();
    for id in &missing {
        let code = loop {
            let candidate = generate_code(&mut rng);
            if taken.insert(candidate.clone()) {
                break candidate;
            }
        };
        conn.execute(
            "UPDATE tournaments SET tournament_code = ?1 WHERE id = ?2",
            params![code, id],
        )
        .map_err(db_err)?;
    }
    info!("backfilled {} tournament codes", missing.len());
    Ok(())
}
