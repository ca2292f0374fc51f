//! Staged catalog over SQLite, read through `sea-schema` discovery.

use async_trait::async_trait;
use sea_schema::sea_query::{
    ForeignKeyCreateStatement, Iden, TableForeignKey, TableRef as SeaTableRef,
};
use sea_schema::sqlite::def::{Schema, TableDef};
use sea_schema::sqlite::discovery::SchemaDiscovery;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use super::staged::{ImportedKey, StagedCatalog};
use super::SchemaSet;
use crate::error::BackendError;
use crate::types::TableRef;

/// SQLite has a single user schema per database file.
pub const SQLITE_SCHEMA: &str = "main";

/// A discovered snapshot of one SQLite database.
pub struct SqliteCatalog {
    tables: Vec<TableDef>,
}

impl SqliteCatalog {
    pub async fn discover(connection: SqlitePool) -> Result<Self, BackendError> {
        let schema_discovery = SchemaDiscovery::new(connection);

        let schema: Schema = schema_discovery
            .discover()
            .await
            .map_err(|err| BackendError::Discovery(format!("{err:?}")))?;

        let mut tables: Vec<TableDef> = schema
            .tables
            .into_iter()
            .filter(|table: &TableDef| !table.name.starts_with("sqlite_"))
            .collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));

        debug!(tables = tables.len(), "discovered sqlite schema");
        Ok(Self { tables })
    }

    pub async fn open(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .read_only(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Self::discover(pool).await
    }

    fn table(&self, table: &TableRef) -> Result<&TableDef, BackendError> {
        self.tables
            .iter()
            .find(|candidate| table.schema == SQLITE_SCHEMA && candidate.name == table.table)
            .ok_or_else(|| BackendError::Discovery(format!("table {table} not found")))
    }
}

/// Foreign keys as the table's `CREATE TABLE` statement declares them, one
/// entry per referencing column.
fn imported_keys_of(table: &TableDef) -> Vec<ImportedKey> {
    let table_create_stmt = table.write();

    table_create_stmt
        .get_foreign_key_create_stmts()
        .iter()
        .map(|fk: &ForeignKeyCreateStatement| fk.get_foreign_key())
        .filter_map(|fk: &TableForeignKey| {
            let referenced = match fk.get_ref_table()? {
                SeaTableRef::Table(iden) => Iden::to_string(&**iden),
                _ => return None,
            };

            Some(fk.get_columns().into_iter().map(move |column| ImportedKey {
                column,
                referenced: TableRef::new(SQLITE_SCHEMA, referenced.clone()),
            }))
        })
        .flatten()
        .collect()
}

#[async_trait]
impl StagedCatalog for SqliteCatalog {
    async fn list_tables(&self, schemas: &SchemaSet) -> Result<Vec<TableRef>, BackendError> {
        if !schemas.contains(SQLITE_SCHEMA) {
            return Ok(Vec::new());
        }

        Ok(self
            .tables
            .iter()
            .map(|table| TableRef::new(SQLITE_SCHEMA, table.name.clone()))
            .collect())
    }

    async fn primary_keys(&self, table: &TableRef) -> Result<HashSet<String>, BackendError> {
        Ok(self
            .table(table)?
            .columns
            .iter()
            .filter(|column| column.primary_key)
            .map(|column| column.name.clone())
            .collect())
    }

    async fn imported_keys(&self, table: &TableRef) -> Result<Vec<ImportedKey>, BackendError> {
        Ok(imported_keys_of(self.table(table)?))
    }

    async fn columns(&self, table: &TableRef) -> Result<Vec<String>, BackendError> {
        Ok(self
            .table(table)?
            .columns
            .iter()
            .map(|column| column.name.clone())
            .collect())
    }
}
