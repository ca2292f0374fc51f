//! Exports relational schema metadata (tables, columns, primary and foreign
//! keys) from PostgreSQL, Snowflake or SQLite as an Ellie logical model
//! document, and hands it to the Ellie model API.
//!
//! ```text
//! RowSource ──rows──▶ SchemaAggregator ──aggregate──▶ serialize ──▶ ModelDocument ──▶ EllieClient
//! ```

pub mod aggregator;
pub mod config;
pub mod ellie;
pub mod error;
pub mod export;
pub mod row_source;
pub mod serializer;
pub mod types;

pub use aggregator::{aggregate, Aggregate, ExportObserver, SchemaAggregator, TracingObserver};
pub use ellie::{EllieClient, EllieSettings};
pub use error::{BackendError, ConfigError, DataShapeError, Error, Result, TransportError};
pub use export::{export_model, export_model_with_observer};
pub use row_source::{RowSource, RowStream, SchemaSet};
pub use serializer::serialize;
pub use types::{CardinalityConvention, MetadataRow, ModelDocument, TableRef};
