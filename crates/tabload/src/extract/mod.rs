//! Record extractors.
//!
//! Three independent producers of raw record sequences: a paginated HTTP API
//! client, a flat-file reader, and a chunked database reader. Each yields
//! [`crate::model::RawRecord`]s and fails fast on transport or format errors.

mod api;
mod db;
mod file;

pub use api::ApiClient;
pub use db::{DbReader, DEFAULT_CHUNK_SIZE};
pub use file::{read_file, FileFormat};
