//! Bulk loader: COPY into a temp staging table, then insert-if-absent merge.

use bytes::{BufMut, BytesMut};
use deadpool_postgres::Pool;
use futures::SinkExt;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::model::CanonicalUser;
use crate::pg::{connect_pool, quote_ident};

/// Fast-path loader for first-load / append-only scenarios.
///
/// Rows whose key already exists in the target are skipped, never
/// overwritten. The staging table, the COPY, and the merge all run inside one
/// transaction; any failure rolls back the entire batch.
///
/// The binary COPY encoding is type-exact: the target `id` column must be
/// BIGINT and the remaining columns text.
pub struct CopyLoader {
    pool: Pool,
}

impl CopyLoader {
    /// Connect to the target database.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = connect_pool(dsn, 2).await?;
        Ok(Self { pool })
    }

    /// Load a batch into `table`. Returns the number of rows actually
    /// inserted (existing keys are skipped). An empty batch is a no-op.
    pub async fn load(&self, table: &str, users: &[CanonicalUser]) -> Result<u64> {
        if users.is_empty() {
            info!("Empty batch, nothing to copy into {}", table);
            return Ok(0);
        }

        let mut client = self
            .pool
            .get()
            .await
            .map_err(|e| PipelineError::pool(e, "getting connection for bulk load"))?;
        let tx = client.transaction().await?;

        let target = quote_ident(table);
        let staging = quote_ident(&format!("_stg_{}", table));
        let col_list: Vec<String> = CanonicalUser::COLUMNS.iter().map(|c| quote_ident(c)).collect();
        let col_list = col_list.join(", ");

        // Staging table lives only for this transaction
        let create_staging = format!(
            "CREATE TEMP TABLE {} (LIKE {} INCLUDING DEFAULTS) ON COMMIT DROP",
            staging, target
        );
        tx.execute(&create_staging, &[])
            .await
            .map_err(|e| PipelineError::load(table, format!("creating staging table: {}", e)))?;

        let copy_sql = format!(
            "COPY {} ({}) FROM STDIN WITH (FORMAT BINARY)",
            staging, col_list
        );
        let sink = tx
            .copy_in(&copy_sql)
            .await
            .map_err(|e| PipelineError::load(table, format!("initiating COPY: {}", e)))?;

        let buf = encode_copy_batch(users);
        tokio::pin!(sink);
        sink.send(buf.freeze())
            .await
            .map_err(|e| PipelineError::load(table, format!("sending COPY data: {}", e)))?;
        sink.finish()
            .await
            .map_err(|e| PipelineError::load(table, format!("finishing COPY: {}", e)))?;

        let merge_sql = format!(
            "INSERT INTO {} ({}) SELECT {} FROM {} ON CONFLICT DO NOTHING",
            target, col_list, col_list, staging
        );
        let inserted = tx
            .execute(&merge_sql, &[])
            .await
            .map_err(|e| PipelineError::load(table, format!("merging staging rows: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| PipelineError::load(table, format!("committing bulk load: {}", e)))?;

        info!(
            "Copied {} rows into {} ({} skipped as existing)",
            inserted,
            table,
            users.len() as u64 - inserted
        );
        Ok(inserted)
    }
}

/// Encode a batch in the PostgreSQL binary COPY format: signature header,
/// per-row field count, length-prefixed field values (-1 for NULL), and the
/// end-of-data trailer.
fn encode_copy_batch(users: &[CanonicalUser]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(users.len() * 128 + 32);

    buf.put_slice(b"PGCOPY\n\xff\r\n\0");
    buf.put_i32(0); // flags
    buf.put_i32(0); // extension area length

    for user in users {
        buf.put_i16(CanonicalUser::COLUMNS.len() as i16);
        buf.put_i32(8);
        buf.put_i64(user.id);
        put_text_opt(&mut buf, user.email.as_deref());
        put_text(&mut buf, &user.first_name);
        put_text(&mut buf, &user.last_name);
        put_text_opt(&mut buf, user.avatar.as_deref());
    }

    buf.put_i16(-1);
    buf
}

fn put_text(buf: &mut BytesMut, s: &str) {
    let bytes = s.as_bytes();
    buf.put_i32(bytes.len() as i32);
    buf.put_slice(bytes);
}

fn put_text_opt(buf: &mut BytesMut, s: Option<&str>) {
    match s {
        Some(s) => put_text(buf, s),
        None => buf.put_i32(-1),
    }
}
