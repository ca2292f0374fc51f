//! Flattens an aggregate into the model document handed to the transport.

use crate::aggregator::Aggregate;
use crate::types::ModelDocument;

pub fn serialize(aggregate: Aggregate) -> ModelDocument {
    let Aggregate {
        entities,
        relationships,
    } = aggregate;

    let entities = entities
        .into_values()
        .map(|entity| entity.into_record())
        .collect();

    ModelDocument::new(entities, relationships)
}
