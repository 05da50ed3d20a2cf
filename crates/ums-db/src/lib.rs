//! SQLite migration engine.
//!
//! An application hands the engine a [`Catalog`] of [`MigrationDefinition`]s
//! and a connection. The [`Migrator`] applies outstanding definitions in
//! ordinal order, one transaction per migration, records each success in
//! the [`Tracker`] table inside that same transaction, and stops at the
//! first failure.

pub mod catalog;
pub mod database;
pub mod introspect;
pub mod migration;
pub mod outcome;
pub mod runner;
pub mod schema;
pub mod tracker;

pub use catalog::Catalog;
pub use database::Database;
pub use introspect::{SchemaIntrospector, SchemaSnapshot};
pub use migration::{Apply, MigrationDefinition, Rollback, Step};
pub use outcome::{MigrationStatus, RolledBack, RunOutcome, StepEvent};
pub use runner::Migrator;
pub use tracker::{AppliedRecord, DEFAULT_TRACKER_TABLE, Tracker};
