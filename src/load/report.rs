// src/load/report.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::error::{LoadError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReport {
    pub name: String,
    pub description: String,
    pub data_file: String,
    pub rows: u64,
}

/// What one run loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// `None` when the geographic pipeline was skipped.
    pub geo_rows: Option<u64>,
    pub tables: Vec<TableReport>,
}

impl LoadSummary {
    pub fn total_rows(&self) -> u64 {
        self.geo_rows.unwrap_or(0) + self.tables.iter().map(|t| t.rows).sum::<u64>()
    }
}

/// Write `summary` as pretty JSON to `path`: into a hidden temp file
/// alongside it first, then rename over the target.
pub fn write_report<P: AsRef<Path>>(summary: &LoadSummary, path: P) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| LoadError::Config {
            message: format!("report path {} has no file name", path.display()),
        })?;

    let tmp_path = dir.join(format!(".{}.tmp", file_name));
    let mut tmp = fs::File::create(&tmp_path)
        .map_err(|e| LoadError::io(format!("creating {}", tmp_path.display()), e))?;
    serde_json::to_writer_pretty(&mut tmp, summary).map_err(|e| {
        LoadError::io(
            format!("serializing report {}", file_name),
            std::io::Error::from(e),
        )
    })?;
    tmp.write_all(b"\n")
        .map_err(|e| LoadError::io(format!("writing {}", tmp_path.display()), e))?;

    fs::rename(&tmp_path, path).map_err(|e| {
        LoadError::io(
            format!("renaming {} to {}", tmp_path.display(), path.display()),
            e,
        )
    })
}
