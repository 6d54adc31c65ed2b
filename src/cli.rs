// src/cli.rs

use clap::Parser;
use std::path::PathBuf;

use crate::config::{
    CatalogSource, DatasetLayout, LoaderConfig, DEFAULT_CATALOG_URL, DEFAULT_DATABASE_URL,
    DEFAULT_MAX_CONNECTIONS,
};

/// Load one state's 2010 Census Summary File 1 into Postgres.
///
/// Every statistical table listed in the packing list is dropped, recreated
/// and filled from its data file, alongside the `geo_locations` table built
/// from the geographic header file.
#[derive(Debug, Clone, Parser)]
#[command(name = "sf1loader", version)]
pub struct Args {
    /// Folder holding the SF1 data files, packing list and geographic file
    #[arg(value_name = "CENSUS_DATA_FOLDER", default_value = ".", value_parser = parse_data_folder)]
    pub data_folder: PathBuf,

    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL, hide_env_values = true)]
    pub database_url: String,

    /// Size of the database connection pool
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,

    /// Tables loading at once; 0 starts every table as soon as it is listed
    #[arg(long, default_value_t = 0)]
    pub max_concurrent_tables: usize,

    /// URL or local path of the census API variable catalog
    #[arg(long, value_name = "URL|PATH", default_value = DEFAULT_CATALOG_URL)]
    pub catalog: String,

    /// Two-letter state prefix of the release's file names
    #[arg(long, default_value = "in", value_parser = parse_state)]
    pub state: String,

    /// Load only these tables (comma separated, e.g. p11,p16)
    #[arg(long, value_delimiter = ',', value_name = "TABLE")]
    pub tables: Vec<String>,

    /// Do not load geo_locations
    #[arg(long)]
    pub skip_geo: bool,

    /// Parse and validate everything without connecting to a database
    #[arg(long)]
    pub dry_run: bool,

    /// Write a JSON summary of the run here
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Log every SQL statement at debug level
    #[arg(long)]
    pub log_sql: bool,
}

impl Args {
    pub fn loader_config(&self) -> LoaderConfig {
        let only_tables = if self.tables.is_empty() {
            None
        } else {
            Some(
                self.tables
                    .iter()
                    .map(|t| t.trim().to_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect(),
            )
        };
        LoaderConfig {
            data_folder: self.data_folder.clone(),
            layout: DatasetLayout::new(&self.state),
            catalog: CatalogSource::parse(&self.catalog),
            max_concurrent_tables: self.max_concurrent_tables,
            only_tables,
            load_geo: !self.skip_geo,
            log_sql: self.log_sql,
        }
    }
}

fn parse_data_folder(raw: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(raw);
    match std::fs::metadata(&path) {
        Ok(m) if m.is_dir() => Ok(path),
        Ok(_) => Err(format!("{} is not a directory", path.display())),
        Err(e) => Err(format!("cannot read {}: {}", path.display(), e)),
    }
}

fn parse_state(raw: &str) -> Result<String, String> {
    if raw.len() == 2 && raw.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(raw.to_lowercase())
    } else {
        Err(format!("'{}' is not a two-letter state abbreviation", raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let dir = TempDir::new().unwrap();
        let args = Args::try_parse_from(["sf1loader", dir.path().to_str().unwrap()]).unwrap();
        assert_eq!(args.max_connections, 95);
        assert_eq!(args.max_concurrent_tables, 0);
        assert!(!args.dry_run);

        let cfg = args.loader_config();
        assert_eq!(cfg.layout.state, "in");
        assert!(cfg.load_geo);
        assert!(cfg.only_tables.is_none());
        assert!(matches!(cfg.catalog, CatalogSource::Url(_)));
    }

    #[test]
    fn test_table_list_and_flags() {
        let dir = TempDir::new().unwrap();
        let args = Args::try_parse_from([
            "sf1loader",
            dir.path().to_str().unwrap(),
            "--tables",
            "P11,p16",
            "--state",
            "PR",
            "--skip-geo",
            "--catalog",
            "/tmp/sf1.xml",
        ])
        .unwrap();
        let cfg = args.loader_config();
        let only = cfg.only_tables.clone().unwrap();
        assert!(only.contains("p11") && only.contains("p16"));
        assert_eq!(cfg.layout.geo_file_name(), "prgeo2010.sf1");
        assert!(!cfg.load_geo);
        assert_eq!(cfg.catalog, CatalogSource::File("/tmp/sf1.xml".into()));
    }

    #[test]
    fn test_bad_folder_and_state_are_usage_errors() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, "").unwrap();

        let err = Args::try_parse_from(["sf1loader", file.to_str().unwrap()]).unwrap_err();
        assert_eq!(err.exit_code(), 2);

        let err = Args::try_parse_from(["sf1loader", "--state", "indiana"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
