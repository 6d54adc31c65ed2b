// src/geo/mod.rs

pub mod fields;
pub mod parse;

pub use fields::{geo_schema, validate_layout, FieldDescriptor, GEO_FIELDS, GEO_TABLE};
pub use parse::{parse_geo_line, stream_geo_locations, GeoField, GeoLocationRecord};
