use chrono::{DateTime, Utc};
use serde::Serialize;
use ums_common::{Error, MigrationId};

/// What happened to one catalog entry during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "migration", rename_all = "snake_case")]
pub enum StepEvent {
    Skipped(MigrationId),
    Applied(MigrationId),
    /// A declared no-op was recorded as applied.
    NoOp(MigrationId),
    Failed(MigrationId),
}

impl StepEvent {
    pub fn id(&self) -> &MigrationId {
        match self {
            StepEvent::Skipped(id)
            | StepEvent::Applied(id)
            | StepEvent::NoOp(id)
            | StepEvent::Failed(id) => id,
        }
    }

    fn counts_as_applied(&self) -> bool {
        matches!(self, StepEvent::Applied(_) | StepEvent::NoOp(_))
    }
}

/// Terminal result of a run.
#[derive(Debug)]
pub enum RunOutcome {
    Done {
        events: Vec<StepEvent>,
    },
    /// The run halted at `failed`; nothing after it was attempted.
    Failed {
        failed: MigrationId,
        cause: Error,
        events: Vec<StepEvent>,
    },
}

impl RunOutcome {
    pub fn events(&self) -> &[StepEvent] {
        match self {
            RunOutcome::Done { events } | RunOutcome::Failed { events, .. } => events,
        }
    }

    /// Identities applied during this run (no-ops included), in order.
    pub fn applied(&self) -> Vec<&MigrationId> {
        self.events()
            .iter()
            .filter(|event| event.counts_as_applied())
            .map(StepEvent::id)
            .collect()
    }

    pub fn skipped(&self) -> Vec<&MigrationId> {
        self.events()
            .iter()
            .filter(|event| matches!(event, StepEvent::Skipped(_)))
            .map(StepEvent::id)
            .collect()
    }

    pub fn applied_count(&self) -> usize {
        self.events().iter().filter(|e| e.counts_as_applied()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, StepEvent::Skipped(_)))
            .count()
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Done { .. })
    }

    pub fn failure(&self) -> Option<(&MigrationId, &Error)> {
        match self {
            RunOutcome::Failed { failed, cause, .. } => Some((failed, cause)),
            RunOutcome::Done { .. } => None,
        }
    }

    /// Process exit code: 0 when everything applied or nothing was due.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }
}

/// Result of an administrative rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolledBack {
    pub id: MigrationId,
    /// False when the rollback was a declared no-op and only the record was
    /// removed.
    pub schema_changed: bool,
}

/// Per-entry view used by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MigrationStatus {
    Pending {
        id: MigrationId,
    },
    Applied {
        id: MigrationId,
        applied_at: DateTime<Utc>,
        /// Name stored in the tracker when it differs from the catalog.
        recorded_name: Option<String>,
    },
    /// Recorded as applied but absent from the catalog.
    Unknown {
        id: MigrationId,
        applied_at: DateTime<Utc>,
    },
}

impl MigrationStatus {
    pub fn id(&self) -> &MigrationId {
        match self {
            MigrationStatus::Pending { id }
            | MigrationStatus::Applied { id, .. }
            | MigrationStatus::Unknown { id, .. } => id,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, MigrationStatus::Pending { .. })
    }
}
