use async_trait::async_trait;
use ellie_schema_export::row_source::{ImportedKey, StagedCatalog, StagedRowSource};
use ellie_schema_export::types::Cardinality;
use ellie_schema_export::{
    export_model, BackendError, CardinalityConvention, Error, RowSource, SchemaSet, TableRef,
};
use futures::TryStreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// In-memory catalog that records which tables were described.
#[derive(Default)]
struct FakeCatalog {
    tables: Vec<TableRef>,
    columns: HashMap<String, Vec<String>>,
    primary_keys: HashMap<String, HashSet<String>>,
    imported_keys: HashMap<String, Vec<ImportedKey>>,
    failing_table: Option<String>,
    described: Mutex<Vec<String>>,
}

impl FakeCatalog {
    fn warehouse() -> Self {
        let mut catalog = FakeCatalog::default();

        catalog.add_table("PUBLIC", "AIRPORTS", &["CODE", "NAME"], &["CODE"], &[]);
        catalog.add_table(
            "PUBLIC",
            "FLIGHTS",
            &["ID", "ORIGIN", "DESTINATION", "PREVIOUS_ID"],
            &["ID"],
            &[
                ("ORIGIN", "PUBLIC", "AIRPORTS"),
                ("DESTINATION", "PUBLIC", "AIRPORTS"),
                ("PREVIOUS_ID", "PUBLIC", "FLIGHTS"),
            ],
        );
        catalog.add_table("STAGING", "RAW", &["PAYLOAD"], &[], &[]);

        catalog
    }

    fn add_table(
        &mut self,
        schema: &str,
        table: &str,
        columns: &[&str],
        primary_keys: &[&str],
        imported_keys: &[(&str, &str, &str)],
    ) {
        let table_ref = TableRef::new(schema, table);
        let name = table_ref.qualified_name();

        self.tables.push(table_ref);
        self.columns
            .insert(name.clone(), columns.iter().map(|c| c.to_string()).collect());
        self.primary_keys
            .insert(name.clone(), primary_keys.iter().map(|c| c.to_string()).collect());
        self.imported_keys.insert(
            name,
            imported_keys
                .iter()
                .map(|(column, schema, table)| ImportedKey {
                    column: column.to_string(),
                    referenced: TableRef::new(*schema, *table),
                })
                .collect(),
        );
    }
}

#[async_trait]
impl StagedCatalog for FakeCatalog {
    async fn list_tables(&self, schemas: &SchemaSet) -> Result<Vec<TableRef>, BackendError> {
        Ok(self
            .tables
            .iter()
            .filter(|table| schemas.contains(&table.schema))
            .cloned()
            .collect())
    }

    async fn primary_keys(&self, table: &TableRef) -> Result<HashSet<String>, BackendError> {
        Ok(self.primary_keys[&table.qualified_name()].clone())
    }

    async fn imported_keys(&self, table: &TableRef) -> Result<Vec<ImportedKey>, BackendError> {
        Ok(self.imported_keys[&table.qualified_name()].clone())
    }

    async fn columns(&self, table: &TableRef) -> Result<Vec<String>, BackendError> {
        let name = table.qualified_name();
        self.described.lock().unwrap().push(name.clone());

        if self.failing_table.as_deref() == Some(name.as_str()) {
            return Err(BackendError::Statement {
                code: "002003".into(),
                message: format!("object {name} does not exist"),
            });
        }
        Ok(self.columns[&name].clone())
    }
}

fn public() -> SchemaSet {
    SchemaSet::from(["PUBLIC".to_owned()])
}

#[tokio::test]
async fn staged_export_uses_canonical_direction() {
    let source = StagedRowSource::new(FakeCatalog::warehouse());

    let document = export_model(&source, &public(), CardinalityConvention::default())
        .await
        .unwrap();
    let model = document.model;

    let names: Vec<_> = model.entities.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["PUBLIC.AIRPORTS", "PUBLIC.FLIGHTS"]);

    // Two columns reference AIRPORTS; both edges are kept. The self-reference is not.
    assert_eq!(model.relationships.len(), 2);
    for relationship in &model.relationships {
        assert_eq!(relationship.source_entity.name, "PUBLIC.FLIGHTS");
        assert_eq!(relationship.source_entity.start_type, Cardinality::Many);
        assert_eq!(relationship.target_entity.name, "PUBLIC.AIRPORTS");
        assert_eq!(relationship.target_entity.end_type, Cardinality::One);
    }

    let previous = model.entities[1]
        .attributes
        .iter()
        .find(|attribute| attribute.name == "PREVIOUS_ID")
        .unwrap();
    assert!(previous.metadata.is_foreign_key);
}

#[tokio::test]
async fn legacy_convention_reverses_tags() {
    let source = StagedRowSource::new(FakeCatalog::warehouse());

    let document = export_model(&source, &public(), CardinalityConvention::ReferencingOne)
        .await
        .unwrap();

    let relationship = &document.model.relationships[0];
    assert_eq!(relationship.source_entity.start_type, Cardinality::One);
    assert_eq!(relationship.target_entity.end_type, Cardinality::Many);
}

#[tokio::test]
async fn rows_stream_table_by_table() {
    let source = StagedRowSource::new(FakeCatalog::warehouse());
    let schemas = public();
    let mut rows = source.fetch_metadata(&schemas);

    let first = rows.try_next().await.unwrap().unwrap();
    assert_eq!(first.qualified_name(), "PUBLIC.AIRPORTS");
    assert_eq!(*source.catalog().described.lock().unwrap(), ["PUBLIC.AIRPORTS"]);

    let rest: Vec<_> = rows.try_collect().await.unwrap();
    assert_eq!(rest.len(), 5);
}

#[tokio::test]
async fn failing_table_aborts_export() {
    let catalog = FakeCatalog {
        failing_table: Some("PUBLIC.FLIGHTS".into()),
        ..FakeCatalog::warehouse()
    };
    let source = StagedRowSource::new(catalog);

    let result = export_model(&source, &public(), CardinalityConvention::default()).await;

    assert!(matches!(
        result,
        Err(Error::Backend(BackendError::Statement { .. }))
    ));
}
