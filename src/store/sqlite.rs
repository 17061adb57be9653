//! SQLite-backed [`VectorStore`] implementation.
//!
//! Each index owns one database file containing a single `chunks` table.
//! Vectors are stored as little-endian f32 BLOBs (see
//! [`vec_to_blob`](crate::embedding::vec_to_blob)) and scored in Rust at
//! query time.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use super::{check_dimensions, rank, VectorStore};
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::{RagError, RagResult};
use crate::models::{EmbeddingRecord, ScoredChunk, TextChunk};

/// SQLite implementation of the [`VectorStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path` and ensure the schema.
    pub async fn open(path: &Path) -> RagResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RagError::Storage(e.to_string()))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                chunk_index INTEGER PRIMARY KEY,
                document_id TEXT NOT NULL,
                start_char INTEGER NOT NULL,
                text TEXT NOT NULL,
                hash TEXT NOT NULL,
                dims INTEGER NOT NULL,
                embedding BLOB NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    async fn stored_dims(&self) -> Result<Option<usize>, sqlx::Error> {
        let dims: Option<i64> = sqlx::query_scalar("SELECT dims FROM chunks LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(dims.map(|d| d as usize))
    }
}

fn search_error(e: sqlx::Error) -> RagError {
    RagError::Search(e.to_string())
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn insert_all(&self, records: &[EmbeddingRecord]) -> RagResult<()> {
        let dims = check_dimensions(records)?;
        if let Some(existing) = self.stored_dims().await? {
            if existing != dims {
                return Err(RagError::EmbeddingService(format!(
                    "index holds {}-dimensional vectors, got {}",
                    existing, dims
                )));
            }
        }

        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                "INSERT INTO chunks (chunk_index, document_id, start_char, text, hash, dims, embedding) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(record.chunk.index as i64)
            .bind(&record.chunk.document_id)
            .bind(record.chunk.start as i64)
            .bind(&record.chunk.text)
            .bind(&record.chunk.hash)
            .bind(dims as i64)
            .bind(vec_to_blob(&record.vector))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn nearest(
        &self,
        query_vec: &[f32],
        k: usize,
        floor: Option<f32>,
    ) -> RagResult<Vec<ScoredChunk>> {
        let rows = sqlx::query(
            "SELECT chunk_index, document_id, start_char, text, hash, embedding FROM chunks",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(search_error)?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.try_get("embedding").map_err(search_error)?;
            let vector = blob_to_vec(&blob);
            if vector.len() != query_vec.len() {
                return Err(RagError::Search(format!(
                    "query has {} dimensions, index has {}",
                    query_vec.len(),
                    vector.len()
                )));
            }
            let index: i64 = row.try_get("chunk_index").map_err(search_error)?;
            let start: i64 = row.try_get("start_char").map_err(search_error)?;
            candidates.push(ScoredChunk {
                chunk: TextChunk {
                    document_id: row.try_get("document_id").map_err(search_error)?,
                    index: index as usize,
                    start: start as usize,
                    text: row.try_get("text").map_err(search_error)?,
                    hash: row.try_get("hash").map_err(search_error)?,
                },
                score: cosine_similarity(query_vec, &vector),
            });
        }

        Ok(rank(candidates, k, floor))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(index: usize, text: &str, vector: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord {
            chunk: TextChunk {
                document_id: "doc".to_string(),
                index,
                start: index * 100,
                text: text.to_string(),
                hash: format!("h{}", index),
            },
            vector,
        }
    }

    #[tokio::test]
    async fn insert_and_query_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&tmp.path().join("index.sqlite"))
            .await
            .unwrap();
        store
            .insert_all(&[
                record(0, "rivers", vec![1.0, 0.0, 0.0]),
                record(1, "mountains", vec![0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();
        assert_eq!(store.nearest(&[1.0, 0.0, 0.0], 10, None).await.unwrap().len(), 2);

        let hits = store.nearest(&[0.1, 0.9, 0.0], 1, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.text, "mountains");
        assert_eq!(hits[0].chunk.start, 100);
        assert_eq!(hits[0].chunk.hash, "h1");
    }

    #[tokio::test]
    async fn duplicate_index_rolls_back_whole_batch() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&tmp.path().join("index.sqlite"))
            .await
            .unwrap();
        let err = store
            .insert_all(&[record(0, "a", vec![1.0]), record(0, "b", vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Storage(_)));
        assert!(store.nearest(&[1.0], 10, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn closed_pool_is_a_search_error() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&tmp.path().join("index.sqlite"))
            .await
            .unwrap();
        store.insert_all(&[record(0, "a", vec![1.0])]).await.unwrap();
        store.close().await;
        assert!(matches!(
            store.nearest(&[1.0], 1, None).await,
            Err(RagError::Search(_))
        ));
    }
}
