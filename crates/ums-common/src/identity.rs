use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a migration: its position in the apply sequence plus a
/// human-readable name.
///
/// Ordinals are the identity key. Two definitions may never share one, but
/// gaps are fine (retired migrations keep their ordinal reserved).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MigrationId {
    pub ordinal: u32,
    pub name: String,
}

impl MigrationId {
    pub fn new(ordinal: u32, name: impl Into<String>) -> Self {
        Self {
            ordinal,
            name: name.into(),
        }
    }

    /// Parse the `NNN_name` form produced by `Display`, e.g.
    /// `001_consolidate_players`.
    pub fn parse(s: &str) -> Option<Self> {
        let (ordinal, name) = s.split_once('_')?;
        if ordinal.is_empty() || !ordinal.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let ordinal = ordinal.parse().ok()?;
        if !is_valid_name(name) {
            return None;
        }
        Some(Self::new(ordinal, name))
    }

    pub fn has_valid_name(&self) -> bool {
        is_valid_name(&self.name)
    }
}

/// Names are lowercase ASCII letters, digits and underscores.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}_{}", self.ordinal, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_pads_ordinal() {
        let id = MigrationId::new(1, "consolidate_players");
        assert_eq!(id.to_string(), "001_consolidate_players");

        let id = MigrationId::new(1234, "late");
        assert_eq!(id.to_string(), "1234_late");
    }

    #[test]
    fn parse_accepts_display_form() {
        let id = MigrationId::parse("002_add_players_v3_columns").unwrap();
        assert_eq!(id.ordinal, 2);
        assert_eq!(id.name, "add_players_v3_columns");
    }

    #[test]
    fn parse_rejects_malformed_versions() {
        assert!(MigrationId::parse("consolidate_players").is_none());
        assert!(MigrationId::parse("_missing_ordinal").is_none());
        assert!(MigrationId::parse("007_").is_none());
        assert!(MigrationId::parse("x07_name").is_none());
        assert!(MigrationId::parse("007_Bad-Name").is_none());
    }

    #[test]
    fn ordering_follows_ordinal_first() {
        let mut ids = vec![
            MigrationId::new(10, "a"),
            MigrationId::new(2, "z"),
            MigrationId::new(0, "m"),
        ];
        ids.sort();
        let ordinals: Vec<u32> = ids.iter().map(|id| id.ordinal).collect();
        assert_eq!(ordinals, vec![0, 2, 10]);
    }
}
