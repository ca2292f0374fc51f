use serde_derive::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    One,
    Many,
}

/// Which end of a foreign key carries "many".
///
/// `ReferencingMany` puts "many" on the child (referencing) table and is used
/// for every backend. `ReferencingOne` is the reversed orientation older
/// Snowflake exports used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardinalityConvention {
    #[default]
    ReferencingMany,
    ReferencingOne,
}

impl CardinalityConvention {
    /// (start, end) tags for an edge from referencing to referenced table.
    pub fn tags(self) -> (Cardinality, Cardinality) {
        match self {
            Self::ReferencingMany => (Cardinality::Many, Cardinality::One),
            Self::ReferencingOne => (Cardinality::One, Cardinality::Many),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceEntity {
    pub name: String,
    pub start_type: Cardinality,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetEntity {
    pub name: String,
    pub end_type: Cardinality,
}

/// A foreign-key edge from the referencing table to the referenced table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub source_entity: SourceEntity,
    pub target_entity: TargetEntity,
}

impl Relationship {
    pub fn new(source: String, target: String, convention: CardinalityConvention) -> Self {
        let (start_type, end_type) = convention.tags();

        Self {
            source_entity: SourceEntity {
                name: source,
                start_type,
            },
            target_entity: TargetEntity {
                name: target,
                end_type,
            },
        }
    }
}
