use serde_derive::{Deserialize, Serialize};

use super::entity::EntityRecord;
use super::relationship::Relationship;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelLevel {
    #[default]
    Logical,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    /// Set by the transport right before import.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub level: ModelLevel,
    pub entities: Vec<EntityRecord>,
    pub relationships: Vec<Relationship>,
}

/// Root of the document accepted by the modeling service's import API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDocument {
    pub model: Model,
}

impl ModelDocument {
    pub fn new(entities: Vec<EntityRecord>, relationships: Vec<Relationship>) -> Self {
        Self {
            model: Model {
                name: None,
                level: ModelLevel::Logical,
                entities,
                relationships,
            },
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.model.name = Some(name.into());
        self
    }
}
