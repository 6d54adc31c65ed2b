pub mod cli;
pub mod config;
pub mod error;
pub mod files;
pub mod geo;
pub mod load;
pub mod schema;
pub mod store;

pub use error::{LoadError, Result};
