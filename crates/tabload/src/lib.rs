//! # tabload
//!
//! Chunked extraction / normalization / batched-load pipeline for tabular
//! user records, targeting PostgreSQL:
//!
//! - **Extractors** for a paginated HTTP API, flat files (csv, json, xlsx,
//!   parquet) and chunked database queries
//! - **Normalization** of raw records into a canonical user shape
//! - **Bulk load** via binary COPY through a staging table (insert-if-absent)
//! - **Upsert load** via batched `INSERT .. ON CONFLICT DO UPDATE`
//!
//! ## Example
//!
//! ```rust,no_run
//! use tabload::{Credentials, LoadMode, Pipeline, Settings, Source};
//!
//! #[tokio::main]
//! async fn main() -> tabload::Result<()> {
//!     let settings = Settings::load("config/settings.yaml")?;
//!     let credentials = Credentials::from_env(Source::File)?;
//!     let result = Pipeline::new(settings, credentials)
//!         .run(Source::File, LoadMode::Copy)
//!         .await?;
//!     println!("Loaded {} rows", result.rows_loaded);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod load;
pub mod model;
pub mod pg;
pub mod pipeline;
pub mod transform;

// Re-exports for convenient access
pub use config::{Credentials, LoadMode, Settings, Source};
pub use error::{PipelineError, Result};
pub use extract::{ApiClient, DbReader, FileFormat};
pub use load::{CopyLoader, UpsertLoader};
pub use model::{CanonicalUser, RawRecord};
pub use pipeline::{Pipeline, RunResult};
