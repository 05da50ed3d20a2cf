use std::fmt;

use rusqlite::Connection;
use ums_common::{MigrationId, Result};

/// A migration body. It receives the connection of the transaction the
/// runner opened for it and must not commit or roll back on its own.
pub type Step = Box<dyn Fn(&Connection) -> Result<()> + Send + Sync>;

/// What applying a migration does.
pub enum Apply {
    Run(Step),
    /// Intentionally empty. The ordinal stays reserved and is still
    /// recorded as applied.
    NoOp { reason: &'static str },
}

impl Apply {
    pub fn run<F>(step: F) -> Self
    where
        F: Fn(&Connection) -> Result<()> + Send + Sync + 'static,
    {
        Apply::Run(Box::new(step))
    }

    pub fn noop(reason: &'static str) -> Self {
        Apply::NoOp { reason }
    }
}

/// How a migration is reversed. Every definition has to pick one; a
/// migration that cannot be reversed says so instead of silently doing
/// nothing.
pub enum Rollback {
    Run(Step),
    /// Reversal has nothing to undo; only the applied record is removed.
    NoOp,
    Unsupported { reason: &'static str },
}

impl Rollback {
    pub fn run<F>(step: F) -> Self
    where
        F: Fn(&Connection) -> Result<()> + Send + Sync + 'static,
    {
        Rollback::Run(Box::new(step))
    }

    pub fn unsupported(reason: &'static str) -> Self {
        Rollback::Unsupported { reason }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Rollback::Unsupported { .. })
    }
}

/// An immutable migration record: identity, apply operation and rollback
/// declaration.
pub struct MigrationDefinition {
    id: MigrationId,
    apply: Apply,
    rollback: Rollback,
}

impl MigrationDefinition {
    pub fn new(ordinal: u32, name: impl Into<String>, apply: Apply, rollback: Rollback) -> Self {
        Self {
            id: MigrationId::new(ordinal, name),
            apply,
            rollback,
        }
    }

    /// A retired or intentionally empty migration.
    pub fn noop(ordinal: u32, name: impl Into<String>, reason: &'static str) -> Self {
        Self::new(ordinal, name, Apply::noop(reason), Rollback::NoOp)
    }

    pub fn id(&self) -> &MigrationId {
        &self.id
    }

    pub fn ordinal(&self) -> u32 {
        self.id.ordinal
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn apply_op(&self) -> &Apply {
        &self.apply
    }

    pub fn rollback_op(&self) -> &Rollback {
        &self.rollback
    }

    pub fn is_noop(&self) -> bool {
        matches!(self.apply, Apply::NoOp { .. })
    }
}

impl fmt::Debug for MigrationDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let apply = match &self.apply {
            Apply::Run(_) => "run".to_string(),
            Apply::NoOp { reason } => format!("noop ({reason})"),
        };
        let rollback = match &self.rollback {
            Rollback::Run(_) => "run".to_string(),
            Rollback::NoOp => "noop".to_string(),
            Rollback::Unsupported { reason } => format!("unsupported ({reason})"),
        };
        f.debug_struct("MigrationDefinition")
            .field("id", &self.id)
            .field("apply", &apply)
            .field("rollback", &rollback)
            .finish()
    }
}
