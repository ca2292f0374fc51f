pub mod attribute;
pub mod entity;
pub mod metadata_row;
pub mod model_document;
pub mod relationship;

pub use attribute::{Attribute, AttributeMetadata};
pub use entity::{Entity, EntityRecord};
pub use metadata_row::{MetadataRow, TableRef};
pub use model_document::{Model, ModelDocument, ModelLevel};
pub use relationship::{Cardinality, CardinalityConvention, Relationship, SourceEntity, TargetEntity};
