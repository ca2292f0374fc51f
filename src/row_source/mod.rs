//! Row sources turn a backend's catalog into [`MetadataRow`]s.
//!
//! Two shapes exist. The joined shape ([`postgres`]) resolves key
//! information in a single catalog query. The staged shape ([`staged`])
//! materializes primary and imported keys per table and joins them against
//! the column list; [`snowflake`] and [`sqlite`] provide catalogs for it.

use futures::stream::BoxStream;
use std::collections::BTreeSet;

use crate::error::BackendError;
use crate::types::MetadataRow;

pub mod postgres;
pub mod snowflake;
pub mod sqlite;
pub mod staged;

pub use postgres::PostgresRowSource;
pub use snowflake::{SnowflakeCatalog, SnowflakeSession};
pub use sqlite::SqliteCatalog;
pub use staged::{ImportedKey, StagedCatalog, StagedRowSource, StagedTable};

/// Schema names an export is scoped to.
pub type SchemaSet = BTreeSet<String>;

/// Rows ordered by schema, table and column position, produced lazily.
pub type RowStream<'a> = BoxStream<'a, Result<MetadataRow, BackendError>>;

pub trait RowSource: Send + Sync {
    fn fetch_metadata<'a>(&'a self, schemas: &'a SchemaSet) -> RowStream<'a>;
}
