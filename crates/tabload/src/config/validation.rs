//! Configuration validation.

use std::str::FromStr;

use super::Settings;
use crate::error::{PipelineError, Result};
use crate::extract::FileFormat;

/// Validate the configuration.
pub fn validate(settings: &Settings) -> Result<()> {
    if settings.run.target_table.trim().is_empty() {
        return Err(PipelineError::Config("run.target_table is required".into()));
    }
    if settings.run.batch_size == 0 {
        return Err(PipelineError::Config(
            "run.batch_size must be at least 1".into(),
        ));
    }

    if let Some(api) = &settings.sources.api {
        if api.path.trim().is_empty() {
            return Err(PipelineError::Config("sources.api.path is required".into()));
        }
        if api.page_size == 0 {
            return Err(PipelineError::Config(
                "sources.api.page_size must be at least 1".into(),
            ));
        }
        if api.start_page == 0 {
            return Err(PipelineError::Config(
                "sources.api.start_page must be at least 1".into(),
            ));
        }
    }

    if let Some(file) = &settings.sources.file {
        if file.path.trim().is_empty() {
            return Err(PipelineError::Config("sources.file.path is required".into()));
        }
        // Reject unknown format tags at load time rather than mid-run.
        FileFormat::from_str(&file.format)?;
    }

    if let Some(db) = &settings.sources.db {
        if db.query.trim().is_empty() {
            return Err(PipelineError::Config("sources.db.query is required".into()));
        }
        if !db.query.contains("$1") || !db.query.contains("$2") {
            return Err(PipelineError::Config(
                "sources.db.query must contain $1 (limit) and $2 (offset) placeholders".into(),
            ));
        }
        if db.chunk_size == 0 {
            return Err(PipelineError::Config(
                "sources.db.chunk_size must be at least 1".into(),
            ));
        }
    }

    Ok(())
}
