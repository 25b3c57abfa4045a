//! Chunked database extractor.

use std::future::Future;

use deadpool_postgres::Pool;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_postgres::types::Type;
use tokio_postgres::Row;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::model::RawRecord;
use crate::pg::connect_pool;

/// Default rows per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Streaming chunked reader over a parameterized query template.
///
/// The template must contain `$1` (limit) and `$2` (offset) placeholders.
/// Chunk boundaries are purely offset-based: without a stable ORDER BY in the
/// query, results are not guaranteed consistent if the underlying table
/// mutates between chunk fetches. Each chunk runs as an independent
/// statement; there is no cross-chunk atomicity.
pub struct DbReader {
    pool: Pool,
}

impl DbReader {
    /// Connect to the source database.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = connect_pool(dsn, 2).await?;
        Ok(Self { pool })
    }

    /// Start streaming chunks for `query`.
    ///
    /// Returns a channel receiver fed by a background task; each item is one
    /// non-empty chunk of records. The task stops on the first empty chunk,
    /// or after sending the first error.
    pub fn read_chunks(&self, query: String, chunk_size: usize) -> mpsc::Receiver<Result<Vec<RawRecord>>> {
        let (tx, rx) = mpsc::channel(4);
        let pool = self.pool.clone();

        tokio::spawn(async move {
            drain_chunks(
                |limit, offset| fetch_chunk(&pool, &query, limit, offset),
                chunk_size,
                tx,
            )
            .await;
        });

        rx
    }
}

/// Pagination loop: fetch `(limit, offset)` chunks with `offset` advancing by
/// `chunk_size` until the first empty chunk, forwarding each non-empty chunk
/// down the channel. A short chunk does not terminate the loop; only an empty
/// one does. The first error is forwarded and ends the stream.
async fn drain_chunks<F, Fut>(fetch: F, chunk_size: usize, tx: mpsc::Sender<Result<Vec<RawRecord>>>)
where
    F: Fn(i64, i64) -> Fut,
    Fut: Future<Output = Result<Vec<RawRecord>>>,
{
    let limit = chunk_size as i64;
    let mut offset: i64 = 0;
    loop {
        match fetch(limit, offset).await {
            Ok(rows) if rows.is_empty() => break,
            Ok(rows) => {
                debug!("Fetched chunk of {} rows at offset {}", rows.len(), offset);
                if tx.send(Ok(rows)).await.is_err() {
                    break;
                }
                offset += limit;
            }
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                break;
            }
        }
    }
}

/// Fetch one chunk on a connection checked out for just this statement, so
/// the connection returns to the pool before the next chunk starts.
async fn fetch_chunk(pool: &Pool, query: &str, limit: i64, offset: i64) -> Result<Vec<RawRecord>> {
    let client = pool
        .get()
        .await
        .map_err(|e| PipelineError::pool(e, "getting connection for chunk fetch"))?;

    let rows = client
        .query(query, &[&limit, &offset])
        .await
        .map_err(|e| PipelineError::extraction("db", format!("offset {}", offset), e))?;

    rows.iter().map(row_to_record).collect()
}

fn row_to_record(row: &Row) -> Result<RawRecord> {
    let mut record = RawRecord::new();
    for (idx, column) in row.columns().iter().enumerate() {
        record.insert(column.name().to_string(), decode_value(row, idx)?);
    }
    Ok(record)
}

fn decode_value(row: &Row, idx: usize) -> Result<Value> {
    let column = &row.columns()[idx];
    let ty = column.type_();

    let value = if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)?.map(Value::from)
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?.map(Value::from)
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?.map(Value::from)
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?.map(Value::from)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)?.map(|f| Value::from(f as f64))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)?.map(Value::from)
    } else if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME {
        row.try_get::<_, Option<String>>(idx)?.map(Value::from)
    } else {
        return Err(PipelineError::extraction(
            "db",
            format!("column '{}'", column.name()),
            format!("unsupported column type {}", ty),
        ));
    };

    Ok(value.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_rows(start: i64, count: i64) -> Vec<RawRecord> {
        (start..start + count)
            .map(|i| {
                let mut record = RawRecord::new();
                record.insert("id".to_string(), Value::from(i));
                record
            })
            .collect()
    }

    /// Drive the pagination loop against a stubbed table of `total` rows
    /// honoring the limit/offset contract, collecting every chunk.
    async fn drain_stub_table(total: i64, chunk_size: usize) -> Vec<Vec<RawRecord>> {
        let (tx, mut rx) = mpsc::channel(4);
        tokio::spawn(drain_chunks(
            move |limit, offset| async move {
                let remaining = (total - offset).max(0);
                Ok(make_rows(offset, remaining.min(limit)))
            },
            chunk_size,
            tx,
        ));

        let mut chunks = Vec::new();
        while let Some(chunk) = rx.recv().await {
            chunks.push(chunk.unwrap());
        }
        chunks
    }

    fn ids(chunks: &[Vec<RawRecord>]) -> Vec<i64> {
        chunks
            .iter()
            .flatten()
            .map(|r| r.get("id").unwrap().as_i64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_empty_source_yields_no_chunks() {
        let chunks = drain_stub_table(0, 2).await;
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_source_smaller_than_one_chunk() {
        let chunks = drain_stub_table(3, 10).await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(ids(&chunks), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_exact_multiple_yields_full_chunks_only() {
        // 6 rows at chunk size 2: exactly 3 non-empty chunks, then the empty
        // fetch at offset 6 terminates the loop.
        let chunks = drain_stub_table(6, 2).await;
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() == 2));
        assert_eq!(ids(&chunks), vec![0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_short_final_chunk_does_not_terminate_early() {
        // 5 rows at chunk size 2: chunks of 2, 2, 1 — the short chunk still
        // advances the offset by the full chunk size, and only the empty
        // fetch after it stops the stream.
        let chunks = drain_stub_table(5, 2).await;
        assert_eq!(
            chunks.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![2, 2, 1]
        );
        assert_eq!(ids(&chunks), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_error_ends_the_stream() {
        let (tx, mut rx) = mpsc::channel(4);
        tokio::spawn(drain_chunks(
            |limit, offset| async move {
                if offset >= 2 {
                    Err(PipelineError::extraction(
                        "db",
                        format!("offset {}", offset),
                        "connection reset",
                    ))
                } else {
                    Ok(make_rows(offset, limit))
                }
            },
            2,
            tx,
        ));

        let first = rx.recv().await.unwrap().unwrap();
        assert_eq!(first.len(), 2);
        let second = rx.recv().await.unwrap();
        assert!(matches!(second, Err(PipelineError::Extraction { .. })));
        // the stream closes after the first error
        assert!(rx.recv().await.is_none());
    }
}
