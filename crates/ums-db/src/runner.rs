use std::collections::BTreeMap;

use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, error, info, warn};
use ums_common::{Error, MigrationId, Result};

use crate::catalog::Catalog;
use crate::migration::{Apply, MigrationDefinition, Rollback};
use crate::outcome::{MigrationStatus, RolledBack, RunOutcome, StepEvent};
use crate::tracker::{AppliedRecord, Tracker};

/// Applies a catalog against one connection.
///
/// Migrations run strictly in ascending ordinal order, each inside its own
/// IMMEDIATE transaction together with its applied record. The first
/// failure halts the run; later migrations may depend on the failed one and
/// are never attempted.
///
/// The runner keeps no state between runs. Everything it knows about the
/// database comes from the tracker table, so re-running with nothing new to
/// apply yields a run of skips.
pub struct Migrator {
    catalog: Catalog,
    tracker: Tracker,
    legacy_table: Option<String>,
}

impl Migrator {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            tracker: Tracker::default(),
            legacy_table: None,
        }
    }

    pub fn with_tracker(mut self, tracker: Tracker) -> Self {
        self.tracker = tracker;
        self
    }

    /// Adopt records from an older `schema_migrations(version, applied_at)`
    /// table during bootstrap.
    pub fn with_legacy_table(mut self, legacy_table: Option<String>) -> Self {
        self.legacy_table = legacy_table;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Apply every outstanding migration.
    pub fn run(&self, conn: &mut Connection) -> Result<RunOutcome> {
        self.run_to(conn, None)
    }

    /// Apply outstanding migrations up to and including `target`. Entries
    /// past the target are not evaluated at all.
    ///
    /// `Err` is reserved for problems before the first migration is
    /// evaluated (bootstrapping the tracker, reading the applied set). A
    /// failing migration is reported through [`RunOutcome::Failed`].
    pub fn run_to(&self, conn: &mut Connection, target: Option<u32>) -> Result<RunOutcome> {
        self.bootstrap(conn)?;

        let applied: BTreeMap<u32, AppliedRecord> = self
            .tracker
            .applied(conn)?
            .into_iter()
            .map(|record| (record.ordinal, record))
            .collect();
        debug!(
            "loaded {} catalog entries, {} already applied",
            self.catalog.len(),
            applied.len()
        );

        let mut events = Vec::with_capacity(self.catalog.len());
        for def in self.catalog.list() {
            if target.is_some_and(|target| def.ordinal() > target) {
                break;
            }

            let id = def.id();
            if let Some(record) = applied.get(&id.ordinal) {
                if record.name != id.name {
                    warn!(
                        "migration {id} is recorded under name `{}`, treating as applied",
                        record.name
                    );
                }
                debug!("migration {id} already applied, skipping");
                events.push(StepEvent::Skipped(id.clone()));
                continue;
            }

            match self.apply_one(conn, def) {
                Ok(event) => events.push(event),
                Err(cause) => {
                    error!("migration {id} failed, halting run: {cause}");
                    events.push(StepEvent::Failed(id.clone()));
                    return Ok(RunOutcome::Failed {
                        failed: id.clone(),
                        cause,
                        events,
                    });
                }
            }
        }

        let outcome = RunOutcome::Done { events };
        info!(
            "migrations complete: {} applied, {} skipped",
            outcome.applied_count(),
            outcome.skipped_count()
        );
        Ok(outcome)
    }

    /// Create the tracker table and adopt legacy records in one transaction.
    /// Runs at the start of every run; calling it earlier lets
    /// [`Migrator::pending`] see adopted records.
    pub fn bootstrap(&self, conn: &mut Connection) -> Result<()> {
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| Error::Database(format!("failed to begin bootstrap transaction: {e}")))?;

        self.tracker.bootstrap(&tx)?;
        if let Some(legacy_table) = &self.legacy_table {
            let adopted = self.tracker.adopt_legacy(&tx, legacy_table, &self.catalog)?;
            if !adopted.is_empty() {
                info!(
                    "adopted {} applied migration(s) from {legacy_table}",
                    adopted.len()
                );
            }
        }

        tx.commit()
            .map_err(|e| Error::Database(format!("failed to commit bootstrap: {e}")))?;
        Ok(())
    }

    /// Apply one definition and record it, atomically.
    fn apply_one(&self, conn: &mut Connection, def: &MigrationDefinition) -> Result<StepEvent> {
        let id = def.id();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| Error::Database(format!("failed to begin transaction for {id}: {e}")))?;

        let event = match def.apply_op() {
            Apply::Run(step) => {
                info!("applying migration {id}");
                let handle: &Connection = &tx;
                step(handle).map_err(|e| Error::MigrationApply {
                    id: id.clone(),
                    source: Box::new(e),
                })?;
                StepEvent::Applied(id.clone())
            }
            Apply::NoOp { reason } => {
                info!("recording no-op migration {id} ({reason})");
                StepEvent::NoOp(id.clone())
            }
        };

        self.tracker.mark_applied(&tx, id, Utc::now())?;
        tx.commit()
            .map_err(|e| Error::Database(format!("failed to commit migration {id}: {e}")))?;
        Ok(event)
    }

    /// Catalog entries not recorded as applied, ascending.
    pub fn pending(&self, conn: &Connection) -> Result<Vec<MigrationId>> {
        let applied: Vec<u32> = self
            .tracker
            .applied(conn)?
            .iter()
            .map(|record| record.ordinal)
            .collect();
        Ok(self
            .catalog
            .ids()
            .filter(|id| applied.binary_search(&id.ordinal).is_err())
            .cloned()
            .collect())
    }

    /// Per-entry state, including applied records the catalog no longer
    /// knows about. Read-only: the tracker table is not created.
    pub fn status(&self, conn: &Connection) -> Result<Vec<MigrationStatus>> {
        let mut records: BTreeMap<u32, AppliedRecord> = self
            .tracker
            .applied(conn)?
            .into_iter()
            .map(|record| (record.ordinal, record))
            .collect();

        let mut statuses = Vec::with_capacity(self.catalog.len() + records.len());
        for id in self.catalog.ids() {
            match records.remove(&id.ordinal) {
                Some(record) => {
                    let recorded_name = (record.name != id.name).then_some(record.name);
                    statuses.push(MigrationStatus::Applied {
                        id: id.clone(),
                        applied_at: record.applied_at,
                        recorded_name,
                    });
                }
                None => statuses.push(MigrationStatus::Pending { id: id.clone() }),
            }
        }
        for record in records.into_values() {
            statuses.push(MigrationStatus::Unknown {
                id: record.id(),
                applied_at: record.applied_at,
            });
        }
        statuses.sort_by_key(|status| status.id().ordinal);
        Ok(statuses)
    }

    /// Reverse one applied migration.
    ///
    /// The rollback step and the removal of the applied record share one
    /// transaction. On any failure the record stays in place.
    pub fn rollback(&self, conn: &mut Connection, ordinal: u32) -> Result<RolledBack> {
        let def = self
            .catalog
            .get(ordinal)
            .ok_or_else(|| Error::NotFound(format!("migration {ordinal} is not in the catalog")))?;
        let id = def.id();

        let applied = self.tracker.applied(conn)?;
        if !applied.iter().any(|record| record.ordinal == ordinal) {
            return Err(Error::NotApplied(id.clone()));
        }
        // `None` means the migration recorded no schema change.
        let step = match def.rollback_op() {
            Rollback::Run(step) => Some(step),
            Rollback::NoOp => None,
            Rollback::Unsupported { reason } => {
                warn!("refusing to roll back {id}: {reason}");
                return Err(Error::RollbackUnsupported {
                    id: id.clone(),
                    reason: reason.to_string(),
                });
            }
        };

        let later: Vec<String> = applied
            .iter()
            .filter(|record| record.ordinal > ordinal)
            .map(|record| record.id().to_string())
            .collect();
        if !later.is_empty() {
            warn!(
                "rolling back {id} while later migrations remain applied: {}",
                later.join(", ")
            );
        }

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| Error::Database(format!("failed to begin rollback of {id}: {e}")))?;

        let schema_changed = match step {
            Some(step) => {
                info!("rolling back migration {id}");
                let handle: &Connection = &tx;
                step(handle).map_err(|e| Error::Rollback {
                    id: id.clone(),
                    reason: e.to_string(),
                })?;
                true
            }
            None => {
                info!("removing record of no-op migration {id}");
                false
            }
        };

        self.tracker.unmark(&tx, id)?;
        tx.commit()
            .map_err(|e| Error::Rollback {
                id: id.clone(),
                reason: format!("commit failed: {e}"),
            })?;
        Ok(RolledBack {
            id: id.clone(),
            schema_changed,
        })
    }

    /// Reverse the applied migration with the highest ordinal, if any.
    pub fn rollback_latest(&self, conn: &mut Connection) -> Result<Option<RolledBack>> {
        let Some(latest) = self.tracker.applied(conn)?.pop() else {
            info!("no applied migrations to roll back");
            return Ok(None);
        };
        self.rollback(conn, latest.ordinal).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::SchemaIntrospector;
    use crate::schema::add_column_if_missing;
    use std::sync::{Arc, Mutex};

    fn recording(ordinal: u32, name: &str, log: &Arc<Mutex<Vec<u32>>>) -> MigrationDefinition {
        let log = Arc::clone(log);
        MigrationDefinition::new(
            ordinal,
            name,
            Apply::run(move |_| {
                log.lock().unwrap().push(ordinal);
                Ok(())
            }),
            Rollback::NoOp,
        )
    }

    fn failing(ordinal: u32, name: &str) -> MigrationDefinition {
        MigrationDefinition::new(
            ordinal,
            name,
            Apply::run(|conn| {
                conn.execute_batch("CREATE TABLE half_done (id INTEGER);")
                    .map_err(|e| Error::Database(e.to_string()))?;
                Err(Error::Other("injected failure".into()))
            }),
            Rollback::unsupported("test"),
        )
    }

    #[test]
    fn applies_in_ascending_order_then_skips() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let catalog = Catalog::new(vec![
            recording(12, "c", &log),
            recording(1, "a", &log),
            recording(5, "b", &log),
        ])
        .unwrap();
        let migrator = Migrator::new(catalog);
        let mut conn = Connection::open_in_memory().unwrap();

        let first = migrator.run(&mut conn).unwrap();
        assert!(first.is_success());
        assert_eq!(first.applied_count(), 3);
        assert_eq!(*log.lock().unwrap(), vec![1, 5, 12]);

        let second = migrator.run(&mut conn).unwrap();
        assert_eq!(second.applied_count(), 0);
        assert_eq!(second.skipped_count(), 3);
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[test]
    fn halts_on_first_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let catalog = Catalog::new(vec![
            recording(1, "a", &log),
            failing(2, "b"),
            recording(3, "c", &log),
        ])
        .unwrap();
        let migrator = Migrator::new(catalog);
        let mut conn = Connection::open_in_memory().unwrap();

        let outcome = migrator.run(&mut conn).unwrap();
        let (failed, cause) = outcome.failure().unwrap();
        assert_eq!(failed.ordinal, 2);
        assert!(matches!(cause, Error::MigrationApply { .. }));
        assert_eq!(*log.lock().unwrap(), vec![1]);
        assert_eq!(outcome.exit_code(), 1);

        let pending = migrator.pending(&conn).unwrap();
        let ordinals: Vec<u32> = pending.iter().map(|id| id.ordinal).collect();
        assert_eq!(ordinals, vec![2, 3]);
        assert!(!SchemaIntrospector::new(&conn).table_exists("half_done").unwrap());
    }

    #[test]
    fn noop_is_recorded_without_running() {
        let catalog = Catalog::new(vec![MigrationDefinition::noop(
            6,
            "add_ums_match_id_to_solo_matches",
            "retired",
        )])
        .unwrap();
        let migrator = Migrator::new(catalog);
        let mut conn = Connection::open_in_memory().unwrap();

        let outcome = migrator.run(&mut conn).unwrap();
        assert!(matches!(outcome.events()[0], StepEvent::NoOp(_)));
        assert!(migrator.pending(&conn).unwrap().is_empty());

        let rolled = migrator.rollback(&mut conn, 6).unwrap();
        assert!(!rolled.schema_changed);
        assert_eq!(migrator.pending(&conn).unwrap().len(), 1);
    }

    #[test]
    fn run_to_stops_at_target() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let catalog = Catalog::new(vec![
            recording(1, "a", &log),
            recording(2, "b", &log),
            recording(3, "c", &log),
        ])
        .unwrap();
        let migrator = Migrator::new(catalog);
        let mut conn = Connection::open_in_memory().unwrap();

        let outcome = migrator.run_to(&mut conn, Some(2)).unwrap();
        assert_eq!(outcome.events().len(), 2);
        assert_eq!(*log.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn status_reports_drift_and_unknown_records() {
        let catalog = Catalog::new(vec![
            MigrationDefinition::noop(1, "a", "test"),
            MigrationDefinition::noop(2, "b", "test"),
        ])
        .unwrap();
        let migrator = Migrator::new(catalog);
        let conn = Connection::open_in_memory().unwrap();

        // Read-only status on a fresh database does not bootstrap.
        let statuses = migrator.status(&conn).unwrap();
        assert!(statuses.iter().all(MigrationStatus::is_pending));

        let tracker = Tracker::default();
        tracker.bootstrap(&conn).unwrap();
        tracker
            .mark_applied(&conn, &MigrationId::new(1, "a_old"), Utc::now())
            .unwrap();
        tracker
            .mark_applied(&conn, &MigrationId::new(7, "gone"), Utc::now())
            .unwrap();

        let statuses = migrator.status(&conn).unwrap();
        assert_eq!(statuses.len(), 3);
        match &statuses[0] {
            MigrationStatus::Applied { recorded_name, .. } => {
                assert_eq!(recorded_name.as_deref(), Some("a_old"))
            }
            other => panic!("expected applied, got {other:?}"),
        }
        assert!(statuses[1].is_pending());
        assert!(matches!(statuses[2], MigrationStatus::Unknown { .. }));
    }

    #[test]
    fn rollback_requires_applied_and_known_migration() {
        let catalog = Catalog::new(vec![MigrationDefinition::new(
            1,
            "add_region",
            Apply::run(|conn| {
                conn.execute_batch("CREATE TABLE IF NOT EXISTS players (user_id INTEGER);")
                    .map_err(|e| Error::Database(e.to_string()))?;
                add_column_if_missing(conn, "players", "region", "TEXT").map(|_| ())
            }),
            Rollback::run(|conn| {
                crate::schema::drop_column_if_present(conn, "players", "region").map(|_| ())
            }),
        )])
        .unwrap();
        let migrator = Migrator::new(catalog);
        let mut conn = Connection::open_in_memory().unwrap();

        assert!(matches!(
            migrator.rollback(&mut conn, 1).unwrap_err(),
            Error::NotApplied(_)
        ));
        assert!(matches!(
            migrator.rollback(&mut conn, 99).unwrap_err(),
            Error::NotFound(_)
        ));

        migrator.run(&mut conn).unwrap();
        let rolled = migrator.rollback_latest(&mut conn).unwrap().unwrap();
        assert!(rolled.schema_changed);
        let columns = SchemaIntrospector::new(&conn).columns("players").unwrap();
        assert!(!columns.contains("region"));
        assert!(migrator.rollback_latest(&mut conn).unwrap().is_none());
    }
}
