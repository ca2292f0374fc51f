//! One export run: row source, aggregator, serializer.

use futures::TryStreamExt;
use tracing::info;

use crate::aggregator::{ExportObserver, SchemaAggregator, TracingObserver};
use crate::error::Result;
use crate::row_source::{RowSource, SchemaSet};
use crate::serializer::serialize;
use crate::types::{CardinalityConvention, ModelDocument};

/// Export the given schemas with the default logging observer.
pub async fn export_model<S>(
    source: &S,
    schemas: &SchemaSet,
    convention: CardinalityConvention,
) -> Result<ModelDocument>
where
    S: RowSource + ?Sized,
{
    export_model_with_observer(source, schemas, convention, TracingObserver).await
}

/// Rows are folded in as they arrive. Any backend or shape error aborts the
/// run and nothing partial is returned.
pub async fn export_model_with_observer<S, O>(
    source: &S,
    schemas: &SchemaSet,
    convention: CardinalityConvention,
    observer: O,
) -> Result<ModelDocument>
where
    S: RowSource + ?Sized,
    O: ExportObserver,
{
    let mut aggregator = SchemaAggregator::with_observer(convention, observer);
    let mut rows = source.fetch_metadata(schemas);

    while let Some(row) = rows.try_next().await? {
        aggregator.push(row)?;
    }

    let document = serialize(aggregator.finish());
    info!(
        entities = document.model.entities.len(),
        relationships = document.model.relationships.len(),
        "export finished"
    );

    Ok(document)
}
