use indexmap::IndexMap;
use serde_derive::{Deserialize, Serialize};

use super::attribute::{Attribute, AttributeMetadata};

/// A table being assembled by the aggregator. Columns keep the position of
/// their first appearance; later rows for the same column merge in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Entity {
    pub name: String, // <schema>.<table>
    pub attributes: IndexMap<String, AttributeMetadata>,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: IndexMap::new(),
        }
    }

    pub fn upsert_attribute(&mut self, column: &str, metadata: AttributeMetadata) {
        match self.attributes.get_mut(column) {
            Some(existing) => existing.merge(metadata),
            None => {
                self.attributes.insert(column.to_owned(), metadata);
            }
        }
    }

    pub fn into_record(self) -> EntityRecord {
        EntityRecord {
            name: self.name,
            attributes: self
                .attributes
                .into_iter()
                .map(|(name, metadata)| Attribute { name, metadata })
                .collect(),
        }
    }
}

/// Wire form of an entity: name plus flattened attribute list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub name: String,
    pub attributes: Vec<Attribute>,
}
