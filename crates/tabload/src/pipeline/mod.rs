//! Pipeline orchestrator: wires one extractor and one loader together.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::config::{Credentials, LoadMode, Settings, Source};
use crate::error::{PipelineError, Result};
use crate::extract::{read_file, ApiClient, DbReader};
use crate::load::{CopyLoader, UpsertLoader};
use crate::model::{CanonicalUser, RawRecord};
use crate::transform::normalize_users;

/// Single-run pipeline: extract, normalize, load, in one logical pass.
///
/// Extraction fully materializes before normalization, and the whole
/// normalized batch is handed to the loader at once. Credentials are injected
/// at construction rather than read ambiently.
pub struct Pipeline {
    settings: Settings,
    credentials: Credentials,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Selected source.
    pub source: Source,

    /// Selected load mode.
    pub load_mode: LoadMode,

    /// Target table name.
    pub target_table: String,

    /// Rows produced by the extractor.
    pub rows_extracted: usize,

    /// Rows written by the loader (copy mode skips existing keys).
    pub rows_loaded: u64,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,
}

impl RunResult {
    /// Serialize the result as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Pipeline {
    /// Create a new pipeline.
    pub fn new(settings: Settings, credentials: Credentials) -> Self {
        Self {
            settings,
            credentials,
        }
    }

    /// Run the pipeline: extract from `source`, normalize, load with `mode`.
    pub async fn run(&self, source: Source, mode: LoadMode) -> Result<RunResult> {
        let started_at = Utc::now();

        let raw = self.extract(source).await?;
        let rows_extracted = raw.len();
        info!("Extracted {} rows from {}", rows_extracted, source);

        let users: Vec<CanonicalUser> = normalize_users(raw).collect::<Result<Vec<_>>>()?;
        info!("Normalized {} records", users.len());

        let table = self.settings.run.target_table.clone();
        let dsn = &self.credentials.postgres_dsn;

        let rows_loaded = match mode {
            LoadMode::Copy => {
                let loader = CopyLoader::connect(dsn).await?;
                loader.load(&table, &users).await?
            }
            LoadMode::Upsert => {
                let rows: Vec<RawRecord> = users.iter().map(CanonicalUser::to_record).collect();
                let loader = UpsertLoader::connect(dsn).await?;
                loader
                    .load(
                        &table,
                        &rows,
                        &self.settings.run.key_columns,
                        self.settings.run.batch_size,
                    )
                    .await?
            }
        };

        let completed_at = Utc::now();
        info!(
            "Pipeline completed: loaded {} rows into {} using {}",
            rows_loaded, table, mode
        );

        Ok(RunResult {
            run_id: Uuid::new_v4().to_string(),
            source,
            load_mode: mode,
            target_table: table,
            rows_extracted,
            rows_loaded,
            started_at,
            completed_at,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
        })
    }

    /// Drain the selected extractor into a record list.
    async fn extract(&self, source: Source) -> Result<Vec<RawRecord>> {
        match source {
            Source::Api => {
                let config = self.settings.sources.api.as_ref().ok_or_else(|| {
                    PipelineError::Config("sources.api section is required for --source api".into())
                })?;
                let base_url = self
                    .credentials
                    .api_base_url
                    .as_deref()
                    .ok_or_else(|| PipelineError::Env("API_BASE_URL".into()))?;
                let api_key = self
                    .credentials
                    .api_key
                    .as_deref()
                    .ok_or_else(|| PipelineError::Env("API_KEY".into()))?;

                let client = ApiClient::new(base_url, api_key)?;
                client.fetch_all(config).await
            }
            Source::File => {
                let config = self.settings.sources.file.as_ref().ok_or_else(|| {
                    PipelineError::Config(
                        "sources.file section is required for --source file".into(),
                    )
                })?;
                let format = config.format.parse()?;
                read_file(&self.settings.base_dir, &config.path, format)
            }
            Source::Db => {
                let config = self.settings.sources.db.as_ref().ok_or_else(|| {
                    PipelineError::Config("sources.db section is required for --source db".into())
                })?;

                let reader = DbReader::connect(&self.credentials.postgres_dsn).await?;
                let mut chunks = reader.read_chunks(config.query.clone(), config.chunk_size);

                let mut rows = Vec::new();
                while let Some(chunk) = chunks.recv().await {
                    rows.extend(chunk?);
                }
                Ok(rows)
            }
        }
    }
}
