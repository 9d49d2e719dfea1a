//! Resume vector index.
//!
//! Indexing pipeline:
//!
//! ```text
//! Upload ─▶ extract ─▶ guard ─▶ chunk_text ─▶ embed (batches) ─▶ replace in SQLite
//! ```
//!
//! Only one resume is indexed at a time. Uploading a new one replaces the
//! stored resume, its chunks and their vectors in a single transaction, so
//! readers see either the old index or the new one.
//!
//! Retrieval is brute-force cosine similarity over every stored vector.

use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use crate::analyze::is_meaningful;
use crate::chunk::chunk_text;
use crate::config::Config;
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::extract::{self, ExtractError};
use crate::models::{Chunk, IndexSummary, RetrievedChunk, Upload};
use crate::progress::{IndexProgressEvent, IndexProgressReporter, ProgressMode};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("the resume contains too little readable text")]
    ExtractionEmpty,
    #[error(transparent)]
    Extraction(#[from] ExtractError),
    #[error("embedding failed: {0:#}")]
    Embedding(anyhow::Error),
    #[error("index storage failed: {0:#}")]
    Storage(anyhow::Error),
}

/// Metadata for the currently indexed resume.
#[derive(Debug, Clone)]
pub struct StoredResume {
    pub id: String,
    pub file_name: String,
    pub indexed_at: i64,
}

/// Handle to the chunk and vector tables.
#[derive(Clone)]
pub struct VectorIndex {
    pool: SqlitePool,
}

impl VectorIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Swap the stored index for `chunks` and their `vectors`.
    pub async fn replace(
        &self,
        resume: &StoredResume,
        content_type: &str,
        text: &str,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
        model: &str,
    ) -> Result<()> {
        anyhow::ensure!(
            chunks.len() == vectors.len(),
            "got {} vectors for {} chunks",
            vectors.len(),
            chunks.len()
        );

        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let text_hash = format!("{:x}", hasher.finalize());

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM embeddings").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM resumes").execute(&mut *tx).await?;

        sqlx::query(
            "INSERT INTO resumes (id, file_name, content_type, text_hash, char_count, indexed_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&resume.id)
        .bind(&resume.file_name)
        .bind(content_type)
        .bind(&text_hash)
        .bind(text.chars().count() as i64)
        .bind(resume.indexed_at)
        .execute(&mut *tx)
        .await?;

        for (chunk, vector) in chunks.iter().zip(vectors) {
            sqlx::query(
                "INSERT INTO chunks (id, resume_id, chunk_index, text, hash) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&resume.id)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .execute(&mut *tx)
            .await?;

            sqlx::query("INSERT INTO embeddings (chunk_id, model, dims, vector) VALUES (?, ?, ?, ?)")
                .bind(&chunk.id)
                .bind(model)
                .bind(vector.len() as i64)
                .bind(embedding::vec_to_blob(vector))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// The indexed resume, if any.
    pub async fn current(&self) -> Result<Option<StoredResume>> {
        let row = sqlx::query("SELECT id, file_name, indexed_at FROM resumes LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| StoredResume {
            id: r.get("id"),
            file_name: r.get("file_name"),
            indexed_at: r.get("indexed_at"),
        }))
    }

    /// Model name and vector width the stored index was built with.
    pub async fn embedding_model(&self) -> Result<Option<(String, usize)>> {
        let row = sqlx::query("SELECT model, dims FROM embeddings LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| {
            let dims: i64 = r.get("dims");
            (r.get("model"), dims as usize)
        }))
    }

    /// Top `k` chunks by cosine similarity to `query`, best first.
    /// Equal scores are ordered by chunk index.
    pub async fn similarity_search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT c.chunk_index, c.text, e.vector
            FROM embeddings e
            JOIN chunks c ON c.id = e.chunk_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<RetrievedChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("vector");
                let vec = embedding::blob_to_vec(&blob);
                RetrievedChunk {
                    chunk_index: row.get("chunk_index"),
                    text: row.get("text"),
                    score: embedding::cosine_similarity(query, &vec),
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk_index.cmp(&b.chunk_index))
        });
        scored.truncate(k);

        Ok(scored)
    }
}

/// Extract, chunk, embed and store one resume, replacing any previous index.
pub async fn index_resume(
    index: &VectorIndex,
    config: &Config,
    embedder: &dyn EmbeddingProvider,
    upload: &Upload,
    progress: &dyn IndexProgressReporter,
) -> Result<IndexSummary, IndexError> {
    let text = extract::extract_text(&upload.bytes, &upload.content_type)?;
    if !is_meaningful(&text, config.analysis.min_text_chars) {
        return Err(IndexError::ExtractionEmpty);
    }
    progress.report(IndexProgressEvent::Extracted {
        file_name: upload.file_name.clone(),
        chars: text.chars().count() as u64,
    });

    let chunks = chunk_text(
        &text,
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
    );
    let total = chunks.len() as u64;
    progress.report(IndexProgressEvent::Chunked { chunks: total });

    let batch_size = config.embedding.batch_size.max(1);
    let mut vectors = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let batch_vectors = embedder.embed(&texts).await.map_err(IndexError::Embedding)?;
        if batch_vectors.len() != batch.len() {
            return Err(IndexError::Embedding(anyhow::anyhow!(
                "provider returned {} vectors for {} texts",
                batch_vectors.len(),
                batch.len()
            )));
        }
        vectors.extend(batch_vectors);
        progress.report(IndexProgressEvent::Embedding {
            n: vectors.len() as u64,
            total,
        });
    }

    let resume = StoredResume {
        id: Uuid::new_v4().to_string(),
        file_name: upload.file_name.clone(),
        indexed_at: Utc::now().timestamp(),
    };
    index
        .replace(
            &resume,
            &upload.content_type,
            &text,
            &chunks,
            &vectors,
            embedder.model_name(),
        )
        .await
        .map_err(IndexError::Storage)?;
    progress.report(IndexProgressEvent::Stored { chunks: total });

    tracing::info!(
        resume_id = %resume.id,
        file = %resume.file_name,
        chunks = chunks.len(),
        model = embedder.model_name(),
        "resume indexed"
    );

    Ok(IndexSummary {
        resume_id: resume.id,
        file_name: resume.file_name,
        chunks: chunks.len(),
        embedded: vectors.len(),
        model: embedder.model_name().to_string(),
    })
}

/// `resumectl index`: index one resume file and print a summary.
pub async fn run_index(config: &Config, path: &Path, mode: ProgressMode, json: bool) -> Result<()> {
    let upload = Upload::from_path(path)?;
    let embedder = embedding::create_provider(&config.embedding)?;
    let pool = db::open(&config.db).await?;
    let index = VectorIndex::new(pool.clone());

    let reporter = mode.reporter();
    let summary = index_resume(&index, config, embedder.as_ref(), &upload, reporter.as_ref()).await;
    pool.close().await;
    let summary = summary?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Indexed {} ({} chunks, model {})",
            summary.file_name, summary.chunks, summary.model
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::MIME_TEXT;
    use crate::progress::NoProgress;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Two-dimensional vectors: mentions of "rust" vs. "python".
    struct KeywordEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        fn model_name(&self) -> &str {
            "keyword"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![
                        t.matches("rust").count() as f32,
                        t.matches("python").count() as f32,
                    ]
                })
                .collect())
        }
    }

    async fn setup() -> (tempfile::TempDir, VectorIndex, Config) {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::minimal();
        config.db.path = tmp.path().join("index.sqlite");
        config.chunking.chunk_size = 80;
        config.chunking.chunk_overlap = 10;
        config.embedding.batch_size = 2;
        let pool = db::open(&config.db).await.unwrap();
        (tmp, VectorIndex::new(pool), config)
    }

    fn upload(name: &str, text: &str) -> Upload {
        Upload {
            file_name: name.to_string(),
            content_type: MIME_TEXT.to_string(),
            bytes: text.as_bytes().to_vec(),
        }
    }

    const RESUME: &str = "Built Rust services for payments at Acme.\n\n\
                          Maintained Python data pipelines for reporting.\n\n\
                          Mentored engineers on Rust ownership and Rust async.";

    #[tokio::test]
    async fn index_then_search_ranks_by_similarity() {
        let (_tmp, index, config) = setup().await;
        let embedder = KeywordEmbedder {
            calls: AtomicUsize::new(0),
        };

        let summary = index_resume(&index, &config, &embedder, &upload("cv.txt", RESUME), &NoProgress)
            .await
            .unwrap();
        assert_eq!(summary.chunks, 3);
        assert_eq!(summary.embedded, 3);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);

        let hits = index.similarity_search(&[0.0, 1.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].text.contains("Python"));
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn ties_are_ordered_by_chunk_index() {
        let (_tmp, index, config) = setup().await;
        let embedder = KeywordEmbedder {
            calls: AtomicUsize::new(0),
        };
        index_resume(&index, &config, &embedder, &upload("cv.txt", RESUME), &NoProgress)
            .await
            .unwrap();

        // Chunks 0 and 2 both point purely along the "rust" axis.
        let hits = index.similarity_search(&[1.0, 0.0], 3).await.unwrap();
        assert_eq!(hits[0].chunk_index, 0);
        assert_eq!(hits[1].chunk_index, 2);
        assert_eq!(hits[2].chunk_index, 1);
    }

    #[tokio::test]
    async fn new_upload_replaces_previous_index() {
        let (_tmp, index, config) = setup().await;
        let embedder = KeywordEmbedder {
            calls: AtomicUsize::new(0),
        };
        index_resume(&index, &config, &embedder, &upload("old.txt", RESUME), &NoProgress)
            .await
            .unwrap();
        let second = "Python developer focused on data engineering and analytics tooling.";
        let summary = index_resume(&index, &config, &embedder, &upload("new.txt", second), &NoProgress)
            .await
            .unwrap();

        let current = index.current().await.unwrap().unwrap();
        assert_eq!(current.file_name, "new.txt");
        assert_eq!(current.id, summary.resume_id);

        let hits = index.similarity_search(&[1.0, 1.0], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].text.starts_with("Python developer"));
    }

    #[tokio::test]
    async fn short_text_is_rejected_before_embedding() {
        let (_tmp, index, config) = setup().await;
        let embedder = KeywordEmbedder {
            calls: AtomicUsize::new(0),
        };

        let err = index_resume(&index, &config, &embedder, &upload("cv.txt", "Rust"), &NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::ExtractionEmpty));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert!(index.current().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stored_model_is_recorded() {
        let (_tmp, index, config) = setup().await;
        assert!(index.embedding_model().await.unwrap().is_none());

        let embedder = KeywordEmbedder {
            calls: AtomicUsize::new(0),
        };
        index_resume(&index, &config, &embedder, &upload("cv.txt", RESUME), &NoProgress)
            .await
            .unwrap();
        assert_eq!(
            index.embedding_model().await.unwrap(),
            Some((embedder.model_name().to_string(), 2))
        );
    }

    #[tokio::test]
    async fn empty_index_searches_to_nothing() {
        let (_tmp, index, _config) = setup().await;
        assert!(index.similarity_search(&[1.0, 0.0], 4).await.unwrap().is_empty());
    }
}
