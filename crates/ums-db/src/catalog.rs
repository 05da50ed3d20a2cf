use ums_common::{CatalogError, MigrationId};

use crate::migration::MigrationDefinition;

/// Ordered, duplicate-free collection of migration definitions.
///
/// Built once at startup from the definitions the application supplies.
/// Construction is pure; nothing here touches the database.
#[derive(Debug)]
pub struct Catalog {
    migrations: Vec<MigrationDefinition>,
}

impl Catalog {
    pub fn new(mut migrations: Vec<MigrationDefinition>) -> Result<Self, CatalogError> {
        for def in &migrations {
            if !def.id().has_valid_name() {
                return Err(CatalogError::MalformedName {
                    ordinal: def.ordinal(),
                    name: def.name().to_string(),
                });
            }
        }

        // Stable sort keeps the authored order of duplicates for the error.
        migrations.sort_by_key(|def| def.ordinal());
        for pair in migrations.windows(2) {
            if pair[0].ordinal() == pair[1].ordinal() {
                return Err(CatalogError::DuplicateIdentity {
                    ordinal: pair[0].ordinal(),
                    first: pair[0].name().to_string(),
                    second: pair[1].name().to_string(),
                });
            }
        }

        Ok(Self { migrations })
    }

    /// Definitions in ascending ordinal order.
    pub fn list(&self) -> &[MigrationDefinition] {
        &self.migrations
    }

    pub fn get(&self, ordinal: u32) -> Option<&MigrationDefinition> {
        self.migrations
            .binary_search_by_key(&ordinal, |def| def.ordinal())
            .ok()
            .map(|idx| &self.migrations[idx])
    }

    pub fn latest(&self) -> Option<&MigrationDefinition> {
        self.migrations.last()
    }

    pub fn ids(&self) -> impl Iterator<Item = &MigrationId> {
        self.migrations.iter().map(|def| def.id())
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::{Apply, Rollback};

    fn def(ordinal: u32, name: &str) -> MigrationDefinition {
        MigrationDefinition::new(ordinal, name, Apply::run(|_| Ok(())), Rollback::NoOp)
    }

    #[test]
    fn sorts_by_ordinal() {
        let catalog = Catalog::new(vec![def(11, "c"), def(2, "a"), def(9, "b")]).unwrap();
        let ordinals: Vec<u32> = catalog.list().iter().map(|d| d.ordinal()).collect();
        assert_eq!(ordinals, vec![2, 9, 11]);
        assert_eq!(catalog.latest().unwrap().name(), "c");
        assert_eq!(catalog.get(9).unwrap().name(), "b");
        assert!(catalog.get(3).is_none());
    }

    #[test]
    fn rejects_duplicate_ordinal() {
        let err = Catalog::new(vec![def(1, "first"), def(2, "other"), def(1, "second")])
            .unwrap_err();
        assert_eq!(
            err,
            CatalogError::DuplicateIdentity {
                ordinal: 1,
                first: "first".into(),
                second: "second".into(),
            }
        );
    }

    #[test]
    fn rejects_malformed_name() {
        let err = Catalog::new(vec![def(1, "Add Column")]).unwrap_err();
        assert!(matches!(err, CatalogError::MalformedName { ordinal: 1, .. }));

        let err = Catalog::new(vec![def(3, "")]).unwrap_err();
        assert!(matches!(err, CatalogError::MalformedName { ordinal: 3, .. }));
    }

    #[test]
    fn empty_catalog_is_valid() {
        let catalog = Catalog::new(Vec::new()).unwrap();
        assert!(catalog.is_empty());
        assert!(catalog.latest().is_none());
    }
}
