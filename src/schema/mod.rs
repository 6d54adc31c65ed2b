pub mod catalog;
pub mod fetch;
pub mod packing;
pub mod types;

pub use catalog::{decode_catalog, resolve_concept, Catalog};
pub use fetch::fetch_catalog;
pub use packing::{stream_table_specs, PackingListParser};
pub use types::{ApiConcept, ApiVariable, CensusTableSpec, IDENTITY_COLUMNS, IDENTITY_COUNT};
