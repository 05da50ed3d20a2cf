use thiserror::Error;

use crate::identity::MigrationId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("failed to read schema of table `{table}`: {reason}")]
    SchemaRead { table: String, reason: String },

    #[error("migration {id} failed: {source}")]
    MigrationApply {
        id: MigrationId,
        #[source]
        source: Box<Error>,
    },

    #[error("failed to record migration {id}: {reason}")]
    TrackerWrite { id: MigrationId, reason: String },

    #[error("migration {id} does not support rollback: {reason}")]
    RollbackUnsupported { id: MigrationId, reason: String },

    #[error("rollback of migration {id} failed: {reason}")]
    Rollback { id: MigrationId, reason: String },

    #[error("migration {0} is not applied")]
    NotApplied(MigrationId),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

/// Problems with the shape of a migration catalog. Raised while the catalog
/// is built, before any database is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("duplicate migration ordinal {ordinal}: `{first}` and `{second}`")]
    DuplicateIdentity {
        ordinal: u32,
        first: String,
        second: String,
    },

    #[error("migration {ordinal} has malformed name `{name}`")]
    MalformedName { ordinal: u32, name: String },
}

impl Error {
    /// The migration this error is attributed to, if any.
    pub fn migration(&self) -> Option<&MigrationId> {
        match self {
            Error::MigrationApply { id, .. }
            | Error::TrackerWrite { id, .. }
            | Error::RollbackUnsupported { id, .. }
            | Error::Rollback { id, .. }
            | Error::NotApplied(id) => Some(id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CatalogError, Error};
    use crate::identity::MigrationId;

    #[test]
    fn error_display_includes_context() {
        let e = Error::Config("bad yaml".into());
        assert_eq!(e.to_string(), "configuration error: bad yaml");

        let e = Error::SchemaRead {
            table: "players".into(),
            reason: "no such table".into(),
        };
        assert_eq!(
            e.to_string(),
            "failed to read schema of table `players`: no such table"
        );

        let e = Error::Other("misc".into());
        assert_eq!(e.to_string(), "misc");
    }

    #[test]
    fn apply_error_wraps_underlying_cause() {
        let id = MigrationId::new(9, "add_channel_created_cols");
        let e = Error::MigrationApply {
            id: id.clone(),
            source: Box::new(Error::Database("disk I/O error".into())),
        };
        assert_eq!(
            e.to_string(),
            "migration 009_add_channel_created_cols failed: database error: disk I/O error"
        );
        assert_eq!(e.migration(), Some(&id));
        assert!(std::error::Error::source(&e).is_some());
    }

    #[test]
    fn catalog_error_converts() {
        let e: Error = CatalogError::DuplicateIdentity {
            ordinal: 4,
            first: "a".into(),
            second: "b".into(),
        }
        .into();
        assert_eq!(
            e.to_string(),
            "catalog error: duplicate migration ordinal 4: `a` and `b`"
        );
        assert!(e.migration().is_none());
    }
}
