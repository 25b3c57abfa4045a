//! Configuration type definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Which extractor feeds the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Api,
    File,
    Db,
}

impl FromStr for Source {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "api" => Ok(Source::Api),
            "file" => Ok(Source::File),
            "db" => Ok(Source::Db),
            other => Err(PipelineError::UnsupportedSource(other.to_string())),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Api => write!(f, "api"),
            Source::File => write!(f, "file"),
            Source::Db => write!(f, "db"),
        }
    }
}

/// Which loader consumes the normalized batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    /// Bulk COPY through a staging table, skipping rows whose key exists.
    Copy,
    /// Batched INSERT .. ON CONFLICT DO UPDATE on the configured key columns.
    Upsert,
}

impl FromStr for LoadMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "copy" => Ok(LoadMode::Copy),
            "upsert" => Ok(LoadMode::Upsert),
            other => Err(PipelineError::UnsupportedMode(other.to_string())),
        }
    }
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadMode::Copy => write!(f, "copy"),
            LoadMode::Upsert => write!(f, "upsert"),
        }
    }
}

/// Root configuration structure, loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Per-source extraction parameters.
    pub sources: SourcesConfig,

    /// Run-level load parameters.
    pub run: RunConfig,

    /// Directory relative file paths resolve against. Set to the config
    /// file's own directory by `Settings::load`, so runs behave the same
    /// from any working directory.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Extraction parameters, one optional section per source.
///
/// Only the section for the selected `--source` is required at run time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiSourceConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileSourceConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<DbSourceConfig>,
}

/// Paginated HTTP API source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSourceConfig {
    /// Resource path appended to `API_BASE_URL` (e.g. "/api/users").
    pub path: String,

    /// Rows requested per page (default: 100).
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// First page number (default: 1).
    #[serde(default = "default_start_page")]
    pub start_page: u32,

    /// Extra query-string filter parameters sent with every page request.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// Flat-file source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSourceConfig {
    /// Path resolved relative to the config file's directory.
    pub path: String,

    /// Format tag: csv, json, xlsx or parquet (default: csv).
    #[serde(default = "default_format")]
    pub format: String,
}

/// Relational database source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbSourceConfig {
    /// Query template with `$1` (limit) and `$2` (offset) placeholders.
    /// Must carry a stable ORDER BY for consistent chunk boundaries.
    pub query: String,

    /// Rows fetched per chunk (default: 1000).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

/// Run-level target parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Target table name.
    pub target_table: String,

    /// Conflict key columns for upsert mode.
    #[serde(default)]
    pub key_columns: Vec<String>,

    /// Rows per upsert sub-batch (default: 1000).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_page_size() -> usize {
    100
}

fn default_start_page() -> u32 {
    1
}

fn default_format() -> String {
    "csv".to_string()
}

fn default_chunk_size() -> usize {
    crate::extract::DEFAULT_CHUNK_SIZE
}

fn default_batch_size() -> usize {
    crate::load::DEFAULT_BATCH_SIZE
}
