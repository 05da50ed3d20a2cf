//! Ordinals 3 through 8 change tables that only the full tournament bot
//! owns. They stay in the catalog so the numbering lines up with databases
//! shared with that bot.

use ums_db::MigrationDefinition;

const REASON: &str = "full tournament bot only";

pub(crate) fn definitions() -> Vec<MigrationDefinition> {
    [
        (3, "create_matches_unified"),
        (4, "create_match_participants"),
        (5, "add_match_status"),
        (6, "add_ums_match_id_to_solo_matches"),
        (7, "add_team_tag_column"),
        (8, "add_standings_message_id"),
    ]
    .into_iter()
    .map(|(ordinal, name)| MigrationDefinition::noop(ordinal, name, REASON))
    .collect()
}
