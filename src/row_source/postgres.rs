use futures::StreamExt;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::debug;

use super::{RowSource, RowStream, SchemaSet};
use crate::error::BackendError;
use crate::types::{MetadataRow, TableRef};

/// One row per column with key usage joined in. Every key constraint the
/// column takes part in yields its own row, so a column that is both primary
/// and foreign key appears twice.
const JOINED_METADATA_QUERY: &str = r#"
SELECT DISTINCT t.table_schema::text AS table_schema,
    t.table_name::text AS table_name,
    c.column_name::text AS column_name,
    c.ordinal_position::int4 AS ordinal_position,
    CASE
        WHEN tc.constraint_type = 'PRIMARY KEY'
        AND kcu.column_name = c.column_name THEN true
        ELSE false
    END AS is_primary_key,
    kcu.constraint_name::text AS constraint_name,
    ccu.table_schema::text AS referenced_schema,
    ccu.table_name::text AS referenced_table
FROM information_schema.tables t
    LEFT JOIN information_schema.columns c ON c.table_schema = t.table_schema
    AND c.table_name = t.table_name
    LEFT JOIN information_schema.key_column_usage kcu ON kcu.table_schema = t.table_schema
    AND kcu.table_name = t.table_name
    AND kcu.column_name = c.column_name
    LEFT JOIN information_schema.table_constraints tc ON tc.table_schema = kcu.table_schema
    AND tc.table_name = kcu.table_name
    AND tc.constraint_name = kcu.constraint_name
    LEFT JOIN information_schema.constraint_column_usage ccu ON ccu.constraint_schema = kcu.constraint_schema
    AND ccu.constraint_name = kcu.constraint_name
WHERE t.table_schema::text = ANY($1)
    AND t.table_type = 'BASE TABLE'
ORDER BY table_schema,
    table_name,
    ordinal_position,
    column_name
"#;

/// Joined-shape row source over PostgreSQL's `information_schema`.
pub struct PostgresRowSource {
    pool: PgPool,
}

impl PostgresRowSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(options: PgConnectOptions) -> Result<Self, BackendError> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Ok(Self::new(pool))
    }
}

impl RowSource for PostgresRowSource {
    fn fetch_metadata<'a>(&'a self, schemas: &'a SchemaSet) -> RowStream<'a> {
        debug!(?schemas, "querying information_schema");

        let schemas: Vec<String> = schemas.iter().cloned().collect();

        sqlx::query(JOINED_METADATA_QUERY)
            .bind(schemas)
            .fetch(&self.pool)
            .map(|row| {
                let row = row?;
                joined_row(&row)
            })
            .boxed()
    }
}

fn joined_row(row: &PgRow) -> Result<MetadataRow, BackendError> {
    let schema: String = row.try_get("table_schema")?;
    let table: String = row.try_get("table_name")?;
    // NULL for a table without columns; the aggregator rejects it.
    let column: Option<String> = row.try_get("column_name")?;
    let is_primary_key: bool = row.try_get("is_primary_key")?;
    let constraint_name: Option<String> = row.try_get("constraint_name")?;
    let referenced_schema: Option<String> = row.try_get("referenced_schema")?;
    let referenced_table: Option<String> = row.try_get("referenced_table")?;

    let references = match (constraint_name, referenced_schema, referenced_table) {
        (Some(_), Some(schema), Some(table)) => Some(TableRef::new(schema, table)),
        (Some(constraint), _, _) => {
            debug!(%constraint, "key constraint without a visible referenced table");
            None
        }
        _ => None,
    };

    Ok(joined_metadata_row(
        schema,
        table,
        column.unwrap_or_default(),
        is_primary_key,
        references,
    ))
}

/// The joined shape only flags a foreign key when the constraint points at a
/// table with a different name. Primary and unique constraints reference their
/// own table. The schema is not compared, so `a.users -> b.users` is not
/// flagged even though the row keeps its reference.
fn joined_metadata_row(
    schema: String,
    table: String,
    column: String,
    is_primary_key: bool,
    references: Option<TableRef>,
) -> MetadataRow {
    let mut row = MetadataRow::column(schema, table, column).primary_key(is_primary_key);

    if let Some(target) = references {
        let is_foreign_key = target.table != row.table;
        row = row.foreign_key(is_foreign_key).references(target);
    }

    row
}
