// src/config.rs

use std::{collections::HashSet, path::PathBuf};

/// Number of numbered data files in one state's SF1 release.
pub const DATA_FILE_COUNT: u32 = 47;

/// Capacity of the parser → inserter hand-off queues.
pub const QUEUE_DEPTH: usize = 10;

pub const DEFAULT_CATALOG_URL: &str = "http://www.census.gov/developers/data/sf1.xml";
pub const DEFAULT_DATABASE_URL: &str =
    "postgres:///census?host=/var/run/postgresql&user=census&sslmode=disable";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 95;

/// File names of one state's Summary File 1 release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    /// Two-letter lower-case state prefix every file name starts with.
    pub state: String,
    pub data_file_count: u32,
}

impl DatasetLayout {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into().to_lowercase(),
            data_file_count: DATA_FILE_COUNT,
        }
    }

    /// `in000072010.sf1` for state `in`, file number 7.
    pub fn data_file_name(&self, number: u32) -> String {
        format!("{}000{:02}2010.sf1", self.state, number)
    }

    pub fn geo_file_name(&self) -> String {
        format!("{}geo2010.sf1", self.state)
    }

    pub fn packing_list_file_name(&self) -> String {
        format!("{}2010.sf1.prd.packinglist.txt", self.state)
    }

    /// Every file that must be present before loading starts.
    pub fn required_files(&self) -> Vec<String> {
        let mut names: Vec<String> = (1..=self.data_file_count)
            .map(|n| self.data_file_name(n))
            .collect();
        names.push(self.packing_list_file_name());
        names.push(self.geo_file_name());
        names
    }
}

impl Default for DatasetLayout {
    fn default() -> Self {
        Self::new("in")
    }
}

/// Where the variable catalog comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    Url(url::Url),
    File(PathBuf),
}

impl CatalogSource {
    /// Anything that parses as an http(s) URL is fetched, the rest is read from disk.
    pub fn parse(raw: &str) -> Self {
        match url::Url::parse(raw) {
            Ok(u) if u.scheme() == "http" || u.scheme() == "https" => Self::Url(u),
            _ => Self::File(PathBuf::from(raw)),
        }
    }
}

impl std::fmt::Display for CatalogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url(u) => write!(f, "{}", u),
            Self::File(p) => write!(f, "{}", p.display()),
        }
    }
}

/// Resolved settings for one load run.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub data_folder: PathBuf,
    pub layout: DatasetLayout,
    pub catalog: CatalogSource,
    /// 0 means one task per table with no cap.
    pub max_concurrent_tables: usize,
    /// Restrict loading to these tables; `None` loads everything.
    pub only_tables: Option<HashSet<String>>,
    pub load_geo: bool,
    pub log_sql: bool,
}

impl LoaderConfig {
    pub fn new(data_folder: impl Into<PathBuf>) -> Self {
        Self {
            data_folder: data_folder.into(),
            layout: DatasetLayout::default(),
            catalog: CatalogSource::parse(DEFAULT_CATALOG_URL),
            max_concurrent_tables: 0,
            only_tables: None,
            load_geo: true,
            log_sql: false,
        }
    }

    pub fn wants_table(&self, name: &str) -> bool {
        self.only_tables
            .as_ref()
            .map_or(true, |only| only.contains(name))
    }
}
