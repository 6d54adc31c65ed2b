// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Every failure the loader can hit. All of them abort the run; the variants
/// only differ in what they tell the operator.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("census data at {folder} is incomplete, missing file {file}")]
    MissingFile {
        folder: PathBuf,
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {message}")]
    Config { message: String },

    /// The catalog or packing list no longer matches what the parser expects.
    #[error("schema drift at `{identifier}`: {message}")]
    SchemaDrift { identifier: String, message: String },

    #[error("bad data in {file} at line {line_number}: {message}\nline: {line}")]
    Data {
        file: String,
        line_number: usize,
        line: String,
        message: String,
    },

    #[error("query failed: {source}\nquery: {statement}")]
    Store {
        statement: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("table `{table}` rejected row: {message}")]
    Rejected { table: String, message: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("GET {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("malformed catalog XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("load cancelled after an error elsewhere")]
    Cancelled,

    #[error("loader task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl LoadError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn drift(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaDrift {
            identifier: identifier.into(),
            message: message.into(),
        }
    }

    pub fn store(statement: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Store {
            statement: statement.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;
