//! Tabular input, column schema and the train/test bundle.

mod bundle;
mod schema;
mod table;

pub use bundle::DataBundle;
pub(crate) use bundle::{ensure_parent, read_json, write_json};
pub use schema::FeatureSchema;
pub use table::Table;
