//! [`LoadTarget`] backed by a PostgreSQL pool.

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_postgres::{PgPool, PgPoolCopyExt, Postgres};
use tracing::{debug, instrument};

use crate::error::{LoaderError, Result};
use crate::target::{CopySource, LOAD_STATUS, LOAD_TXID, LoadBatch, LoadRow, LoadTarget};

/// Bytes buffered before a chunk is sent to COPY.
const COPY_CHUNK_SIZE: usize = 1024 * 1024;

pub struct PgTarget {
    pool: PgPool,
}

impl PgTarget {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// SQL for one insert; rows without an id get one from the database.
pub fn insert_sql(table: &str, has_id: bool) -> String {
    if has_id {
        format!(
            r#"INSERT INTO "{table}" (id, txid, status, resource) VALUES ($1, {LOAD_TXID}, '{LOAD_STATUS}', $2::jsonb) ON CONFLICT (id) DO NOTHING"#
        )
    } else {
        format!(
            r#"INSERT INTO "{table}" (id, txid, status, resource) VALUES (gen_random_uuid()::text, {LOAD_TXID}, '{LOAD_STATUS}', $1::jsonb) ON CONFLICT (id) DO NOTHING"#
        )
    }
}

pub fn copy_sql(table: &str) -> String {
    format!(r#"COPY "{table}" (id, txid, status, resource) FROM STDIN"#)
}

/// Appends one row in COPY text format.
pub fn encode_copy_row(buf: &mut Vec<u8>, id: &str, resource: &str) {
    escape_copy_text(buf, id);
    buf.push(b'\t');
    buf.extend_from_slice(LOAD_TXID.to_string().as_bytes());
    buf.push(b'\t');
    buf.extend_from_slice(LOAD_STATUS.as_bytes());
    buf.push(b'\t');
    escape_copy_text(buf, resource);
    buf.push(b'\n');
}

fn escape_copy_text(buf: &mut Vec<u8>, value: &str) {
    for &b in value.as_bytes() {
        match b {
            b'\\' => buf.extend_from_slice(b"\\\\"),
            b'\t' => buf.extend_from_slice(b"\\t"),
            b'\n' => buf.extend_from_slice(b"\\n"),
            b'\r' => buf.extend_from_slice(b"\\r"),
            _ => buf.push(b),
        }
    }
}

#[async_trait]
impl LoadTarget for PgTarget {
    #[instrument(skip(self, rows))]
    async fn copy_rows(&mut self, table: &str, rows: &mut dyn CopySource) -> Result<u64> {
        let copy_err = |source| LoaderError::Copy {
            table: table.to_string(),
            source,
        };

        let mut copy = self
            .pool
            .copy_in_raw(&copy_sql(table))
            .await
            .map_err(copy_err)?;

        let mut buf = Vec::with_capacity(COPY_CHUNK_SIZE);
        let mut count = 0u64;

        loop {
            match rows.advance() {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    let _ = copy.abort(e.to_string()).await;
                    return Err(e);
                }
            }

            let Some(LoadRow { id, resource }) = rows.current_row_values() else {
                continue;
            };
            let id = id.unwrap_or_else(fhirbase_core::generate_id);
            encode_copy_row(&mut buf, &id, &resource);
            count += 1;

            if buf.len() >= COPY_CHUNK_SIZE {
                copy.send(buf.as_slice()).await.map_err(copy_err)?;
                buf.clear();
            }
        }

        if !buf.is_empty() {
            copy.send(buf.as_slice()).await.map_err(copy_err)?;
        }
        copy.finish().await.map_err(copy_err)?;

        debug!(rows = count, "COPY finished");
        Ok(count)
    }

    async fn send_batch(&mut self, batch: &LoadBatch) -> Result<()> {
        let batch_err = |source| LoaderError::Batch {
            statements: batch.len(),
            source,
        };

        let mut tx = self.pool.begin().await.map_err(batch_err)?;

        for statement in batch.statements() {
            let row = &statement.row;
            let sql = insert_sql(&statement.table, row.id.is_some());
            let q = match &row.id {
                Some(id) => query::<Postgres>(&sql).bind(id).bind(&row.resource),
                None => query::<Postgres>(&sql).bind(&row.resource),
            };
            q.execute(&mut *tx).await.map_err(batch_err)?;
        }

        tx.commit().await.map_err(batch_err)?;
        Ok(())
    }
}
