pub mod error;
pub mod identity;

pub use error::{CatalogError, Error, Result};
pub use identity::MigrationId;
