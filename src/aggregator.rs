//! Groups metadata rows into entities and foreign-key relationships.

use indexmap::map::Entry;
use indexmap::IndexMap;
use tracing::info;

use crate::error::DataShapeError;
use crate::types::{AttributeMetadata, CardinalityConvention, Entity, MetadataRow, Relationship};

/// Receives a notification the first time each entity is seen.
pub trait ExportObserver {
    fn entity_discovered(&mut self, name: &str);
}

impl<F: FnMut(&str)> ExportObserver for F {
    fn entity_discovered(&mut self, name: &str) {
        self(name)
    }
}

/// Logs each discovered entity at info level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl ExportObserver for TracingObserver {
    fn entity_discovered(&mut self, name: &str) {
        info!(entity = name, "Fetching");
    }
}

/// Output of one aggregation: entities keyed by qualified name in first-seen
/// order, and every qualifying foreign-key edge.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Aggregate {
    pub entities: IndexMap<String, Entity>,
    pub relationships: Vec<Relationship>,
}

/// Folds metadata rows into entities and relationships, one row at a time.
pub struct SchemaAggregator<O = TracingObserver> {
    aggregate: Aggregate,
    convention: CardinalityConvention,
    observer: O,
}

impl SchemaAggregator<TracingObserver> {
    pub fn new(convention: CardinalityConvention) -> Self {
        Self::with_observer(convention, TracingObserver)
    }
}

impl<O: ExportObserver> SchemaAggregator<O> {
    pub fn with_observer(convention: CardinalityConvention, observer: O) -> Self {
        Self {
            aggregate: Aggregate::default(),
            convention,
            observer,
        }
    }

    /// Fold one row into the aggregate. A malformed row poisons the whole run;
    /// callers must drop the aggregator on error.
    pub fn push(&mut self, row: MetadataRow) -> Result<(), DataShapeError> {
        check_shape(&row)?;

        let schema_table_name = row.qualified_name();

        let entity = match self.aggregate.entities.entry(schema_table_name.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                self.observer.entity_discovered(&schema_table_name);
                entry.insert(Entity::new(schema_table_name.clone()))
            }
        };
        entity.upsert_attribute(
            &row.column,
            AttributeMetadata::new(row.is_primary_key, row.is_foreign_key),
        );

        if let Some(target) = row.references {
            let target_name = target.qualified_name();
            if target_name != schema_table_name {
                self.aggregate.relationships.push(Relationship::new(
                    schema_table_name,
                    target_name,
                    self.convention,
                ));
            }
        }

        Ok(())
    }

    pub fn finish(self) -> Aggregate {
        self.aggregate
    }
}

fn check_shape(row: &MetadataRow) -> Result<(), DataShapeError> {
    if row.schema.is_empty() {
        return Err(DataShapeError::EmptySchema {
            table: row.table.clone(),
        });
    }
    if row.table.is_empty() {
        return Err(DataShapeError::EmptyTable {
            schema: row.schema.clone(),
        });
    }
    if row.column.is_empty() {
        return Err(DataShapeError::EmptyColumn {
            table: row.qualified_name(),
        });
    }
    if let Some(target) = &row.references {
        if target.schema.is_empty() || target.table.is_empty() {
            return Err(DataShapeError::EmptyReference {
                table: row.qualified_name(),
                column: row.column.clone(),
            });
        }
    }
    Ok(())
}

/// Aggregate a complete row sequence with the default observer.
pub fn aggregate<I>(rows: I, convention: CardinalityConvention) -> Result<Aggregate, DataShapeError>
where
    I: IntoIterator<Item = MetadataRow>,
{
    let mut aggregator = SchemaAggregator::new(convention);
    for row in rows {
        aggregator.push(row)?;
    }
    Ok(aggregator.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TableRef;

    fn run(rows: Vec<MetadataRow>) -> Aggregate {
        aggregate(rows, CardinalityConvention::default()).unwrap()
    }

    fn flags(aggregate: &Aggregate, entity: &str, column: &str) -> AttributeMetadata {
        aggregate.entities[entity].attributes[column]
    }

    #[test]
    fn orders_referencing_customers() {
        let result = run(vec![
            MetadataRow::column("public", "orders", "id").primary_key(true),
            MetadataRow::column("public", "orders", "customer_id")
                .foreign_key(true)
                .references(TableRef::new("public", "customers")),
        ]);

        assert_eq!(result.entities.len(), 1);
        let columns: Vec<_> = result.entities["public.orders"].attributes.keys().collect();
        assert_eq!(columns, ["id", "customer_id"]);
        assert_eq!(flags(&result, "public.orders", "id"), AttributeMetadata::new(true, false));
        assert_eq!(
            flags(&result, "public.orders", "customer_id"),
            AttributeMetadata::new(false, true)
        );

        assert_eq!(result.relationships.len(), 1);
        assert_eq!(result.relationships[0].source_entity.name, "public.orders");
        assert_eq!(result.relationships[0].target_entity.name, "public.customers");
    }

    #[test]
    fn duplicate_rows_merge_flags_in_either_order() {
        let pk = MetadataRow::column("s", "t", "col").primary_key(true);
        let fk = MetadataRow::column("s", "t", "col")
            .foreign_key(true)
            .references(TableRef::new("s", "u"));

        for rows in [vec![pk.clone(), fk.clone()], vec![fk, pk]] {
            let result = run(rows);
            assert_eq!(result.entities["s.t"].attributes.len(), 1);
            assert_eq!(flags(&result, "s.t", "col"), AttributeMetadata::new(true, true));
        }
    }

    #[test]
    fn first_seen_column_order_is_kept() {
        let result = run(vec![
            MetadataRow::column("s", "t", "a"),
            MetadataRow::column("s", "t", "b"),
            MetadataRow::column("s", "t", "a").primary_key(true),
            MetadataRow::column("s", "t", "c"),
            MetadataRow::column("s", "t", "b"),
        ]);

        let columns: Vec<_> = result.entities["s.t"].attributes.keys().collect();
        assert_eq!(columns, ["a", "b", "c"]);
    }

    #[test]
    fn entities_are_unique_and_in_first_seen_order() {
        let result = run(vec![
            MetadataRow::column("s", "b", "x"),
            MetadataRow::column("s", "a", "x"),
            MetadataRow::column("s", "b", "y"),
            MetadataRow::column("t", "b", "x"),
        ]);

        let names: Vec<_> = result.entities.keys().collect();
        assert_eq!(names, ["s.b", "s.a", "t.b"]);
    }

    #[test]
    fn self_reference_sets_flag_but_emits_no_relationship() {
        let result = run(vec![MetadataRow::column("s", "employees", "manager_id")
            .foreign_key(true)
            .references(TableRef::new("s", "employees"))]);

        assert!(result.relationships.is_empty());
        assert!(flags(&result, "s.employees", "manager_id").is_foreign_key);
    }

    #[test]
    fn same_table_name_in_other_schema_is_not_a_self_reference() {
        let result = run(vec![MetadataRow::column("a", "users", "id")
            .foreign_key(true)
            .references(TableRef::new("b", "users"))]);

        assert_eq!(result.relationships.len(), 1);
    }

    #[test]
    fn relationships_are_not_deduplicated() {
        let result = run(vec![
            MetadataRow::column("s", "flights", "origin")
                .foreign_key(true)
                .references(TableRef::new("s", "airports")),
            MetadataRow::column("s", "flights", "destination")
                .foreign_key(true)
                .references(TableRef::new("s", "airports")),
            MetadataRow::column("s", "flights", "id")
                .primary_key(true)
                .references(TableRef::new("s", "flights")),
        ]);

        assert_eq!(result.relationships.len(), 2);
    }

    #[test]
    fn observer_sees_each_entity_once() {
        let mut seen = Vec::new();
        let mut aggregator = SchemaAggregator::with_observer(
            CardinalityConvention::default(),
            |name: &str| seen.push(name.to_owned()),
        );

        for row in [
            MetadataRow::column("s", "t", "a"),
            MetadataRow::column("s", "t", "b"),
            MetadataRow::column("s", "u", "a"),
        ] {
            aggregator.push(row).unwrap();
        }
        let result = aggregator.finish();

        assert_eq!(seen, ["s.t", "s.u"]);
        assert_eq!(result.entities.len(), 2);
    }

    #[test]
    fn empty_names_are_rejected() {
        let convention = CardinalityConvention::default();

        assert_eq!(
            aggregate(vec![MetadataRow::column("s", "t", "")], convention),
            Err(DataShapeError::EmptyColumn { table: "s.t".into() })
        );
        assert!(matches!(
            aggregate(vec![MetadataRow::column("", "t", "c")], convention),
            Err(DataShapeError::EmptySchema { .. })
        ));
        assert!(matches!(
            aggregate(vec![MetadataRow::column("s", "", "c")], convention),
            Err(DataShapeError::EmptyTable { .. })
        ));
        assert!(matches!(
            aggregate(
                vec![MetadataRow::column("s", "t", "c").references(TableRef::new("s", ""))],
                convention
            ),
            Err(DataShapeError::EmptyReference { .. })
        ));
    }

    #[test]
    fn malformed_row_after_good_rows_fails_the_run() {
        let result = aggregate(
            vec![
                MetadataRow::column("s", "t", "a"),
                MetadataRow::column("s", "t", ""),
                MetadataRow::column("s", "t", "b"),
            ],
            CardinalityConvention::default(),
        );

        assert!(result.is_err());
    }
}
