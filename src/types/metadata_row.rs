use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// A table addressed by schema and name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// `<schema>.<table>`, the identifier of an entity in the model document.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// One (table, column) introspection result, already normalized by a row
/// source adapter.
///
/// `is_foreign_key` is the attribute-level flag and is decided by the adapter,
/// since backends disagree on whether self-references count. `references` is
/// the table named by the key constraint on this row, if any; the aggregator
/// turns it into a relationship when it points at a different table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataRow {
    pub schema: String,
    pub table: String,
    pub column: String,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
    pub references: Option<TableRef>,
}

impl MetadataRow {
    /// A plain column with no key information.
    pub fn column(
        schema: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            column: column.into(),
            is_primary_key: false,
            is_foreign_key: false,
            references: None,
        }
    }

    pub fn primary_key(mut self, is_primary_key: bool) -> Self {
        self.is_primary_key = is_primary_key;
        self
    }

    pub fn foreign_key(mut self, is_foreign_key: bool) -> Self {
        self.is_foreign_key = is_foreign_key;
        self
    }

    pub fn references(mut self, target: TableRef) -> Self {
        self.references = Some(target);
        self
    }

    pub fn table_ref(&self) -> TableRef {
        TableRef::new(self.schema.clone(), self.table.clone())
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_names_join_schema_and_table() {
        let row = MetadataRow::column("public", "orders", "id");
        assert_eq!(row.qualified_name(), "public.orders");
        assert_eq!(row.table_ref().to_string(), "public.orders");
    }

    #[test]
    fn builder_sets_key_fields() {
        let row = MetadataRow::column("s", "t", "c")
            .primary_key(true)
            .foreign_key(true)
            .references(TableRef::new("s", "u"));

        assert!(row.is_primary_key);
        assert!(row.is_foreign_key);
        assert_eq!(row.references, Some(TableRef::new("s", "u")));
    }
}
