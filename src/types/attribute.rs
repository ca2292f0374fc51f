use serde_derive::{Deserialize, Serialize};

/// Key flags of a column. Both flags only ever go from `false` to `true`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMetadata {
    #[serde(rename = "PK")]
    pub is_primary_key: bool,
    #[serde(rename = "FK")]
    pub is_foreign_key: bool,
}

impl AttributeMetadata {
    pub fn new(is_primary_key: bool, is_foreign_key: bool) -> Self {
        Self {
            is_primary_key,
            is_foreign_key,
        }
    }

    /// Fold another observation of the same column into this one.
    pub fn merge(&mut self, other: AttributeMetadata) {
        self.is_primary_key |= other.is_primary_key;
        self.is_foreign_key |= other.is_foreign_key;
    }
}

/// A column as it appears in the model document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub metadata: AttributeMetadata,
}
