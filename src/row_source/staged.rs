//! Staged-shape row source: keys are fetched per table first and joined
//! against the column list afterwards.

use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};
use std::collections::HashSet;
use tracing::debug;

use super::{RowSource, RowStream, SchemaSet};
use crate::error::BackendError;
use crate::types::{MetadataRow, TableRef};

/// A foreign key column of a table and the table it references.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportedKey {
    pub column: String,
    pub referenced: TableRef,
}

/// Everything needed to produce the rows of one table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StagedTable {
    /// Columns in ordinal order.
    pub columns: Vec<String>,
    pub primary_keys: HashSet<String>,
    pub imported_keys: Vec<ImportedKey>,
}

/// Catalog access for backends that expose keys through separate
/// introspection calls.
#[async_trait]
pub trait StagedCatalog: Send + Sync {
    /// Base tables of the given schemas, ordered by schema then table.
    async fn list_tables(&self, schemas: &SchemaSet) -> Result<Vec<TableRef>, BackendError>;

    async fn primary_keys(&self, table: &TableRef) -> Result<HashSet<String>, BackendError>;

    async fn imported_keys(&self, table: &TableRef) -> Result<Vec<ImportedKey>, BackendError>;

    /// Column names in ordinal order.
    async fn columns(&self, table: &TableRef) -> Result<Vec<String>, BackendError>;

    /// Materialize keys before reading columns.
    async fn describe_table(&self, table: &TableRef) -> Result<StagedTable, BackendError> {
        let imported_keys = self.imported_keys(table).await?;
        let primary_keys = self.primary_keys(table).await?;
        let columns = self.columns(table).await?;

        Ok(StagedTable {
            columns,
            primary_keys,
            imported_keys,
        })
    }
}

pub struct StagedRowSource<C> {
    catalog: C,
}

impl<C: StagedCatalog> StagedRowSource<C> {
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    async fn table_rows(&self, table: TableRef) -> Result<Vec<MetadataRow>, BackendError> {
        debug!(%table, "describing table");
        let described = self.catalog.describe_table(&table).await?;
        Ok(join_table(&table, &described))
    }
}

impl<C: StagedCatalog> RowSource for StagedRowSource<C> {
    fn fetch_metadata<'a>(&'a self, schemas: &'a SchemaSet) -> RowStream<'a> {
        stream::once(self.catalog.list_tables(schemas))
            .map_ok(move |tables| {
                stream::iter(tables)
                    .then(move |table| self.table_rows(table))
                    .map_ok(|rows| stream::iter(rows.into_iter().map(Ok::<_, BackendError>)))
                    .try_flatten()
            })
            .try_flatten()
            .boxed()
    }
}

/// Left-join the materialized keys onto the columns. A column matched by
/// several imported keys produces one row per key. Any matching imported key
/// flags the column, self-references included.
pub fn join_table(table: &TableRef, described: &StagedTable) -> Vec<MetadataRow> {
    let mut rows = Vec::with_capacity(described.columns.len());

    for column in &described.columns {
        let base = MetadataRow::column(table.schema.clone(), table.table.clone(), column.clone())
            .primary_key(described.primary_keys.contains(column));

        let mut matched = false;
        for key in described.imported_keys.iter().filter(|key| &key.column == column) {
            matched = true;
            rows.push(base.clone().foreign_key(true).references(key.referenced.clone()));
        }

        if !matched {
            rows.push(base);
        }
    }

    rows
}
