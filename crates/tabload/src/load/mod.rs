//! Batch loaders.
//!
//! Two independent consumers of normalized batches: the bulk loader (COPY
//! into a staging table, insert-if-absent merge) and the upsert loader
//! (batched INSERT .. ON CONFLICT DO UPDATE). Each call runs in a single
//! transaction.

mod copy;
mod upsert;

pub use copy::CopyLoader;
pub use upsert::{UpsertLoader, DEFAULT_BATCH_SIZE};
