//! Question answering over the indexed resume.
//!
//! ```text
//! question ─▶ embed ─▶ top-k chunks ─▶ qa_prompt ─▶ Generator ─▶ QaAnswer
//! ```

use anyhow::Result;
use thiserror::Error;

use crate::config::Config;
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::generation::{self, Generator};
use crate::index::VectorIndex;
use crate::models::QaAnswer;
use crate::prompt;
use crate::render;

#[derive(Debug, Error)]
pub enum AskError {
    #[error("question must not be empty")]
    EmptyQuestion,
    #[error("no resume has been indexed yet")]
    NoIndex,
    #[error("embedding failed: {0:#}")]
    Embedding(anyhow::Error),
    #[error("generation failed: {0:#}")]
    Generation(anyhow::Error),
    #[error(
        "the index was built with embedding model '{indexed}' ({indexed_dims} dims) but \
         '{current}' ({current_dims} dims) is configured; re-index the resume"
    )]
    ModelMismatch {
        indexed: String,
        indexed_dims: usize,
        current: String,
        current_dims: usize,
    },
    #[error("index lookup failed: {0:#}")]
    Storage(anyhow::Error),
}

/// Answer `question` from the `top_k` most similar resume chunks.
pub async fn answer_question(
    index: &VectorIndex,
    embedder: &dyn EmbeddingProvider,
    generator: &dyn Generator,
    question: &str,
    top_k: usize,
) -> Result<QaAnswer, AskError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(AskError::EmptyQuestion);
    }
    if index.current().await.map_err(AskError::Storage)?.is_none() {
        return Err(AskError::NoIndex);
    }
    if let Some((model, dims)) = index.embedding_model().await.map_err(AskError::Storage)? {
        if model != embedder.model_name() || dims != embedder.dims() {
            return Err(AskError::ModelMismatch {
                indexed: model,
                indexed_dims: dims,
                current: embedder.model_name().to_string(),
                current_dims: embedder.dims(),
            });
        }
    }

    let query_vec = embedding::embed_query(embedder, question)
        .await
        .map_err(AskError::Embedding)?;
    let sources = index
        .similarity_search(&query_vec, top_k)
        .await
        .map_err(AskError::Storage)?;

    let context = sources
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let prompt = prompt::qa_prompt(&context, question);

    tracing::debug!(sources = sources.len(), "answering question");
    let answer = generator
        .generate(&prompt)
        .await
        .map_err(AskError::Generation)?;

    Ok(QaAnswer {
        question: question.to_string(),
        answer: answer.trim().to_string(),
        sources,
    })
}

/// `resumectl ask`: answer a question about the indexed resume.
pub async fn run_ask(config: &Config, question: &str, json: bool) -> Result<()> {
    let embedder = embedding::create_provider(&config.embedding)?;
    let generator = generation::create_generator(&config.generation)?;
    let pool = db::open(&config.db).await?;
    let index = VectorIndex::new(pool.clone());

    let answer = answer_question(
        &index,
        embedder.as_ref(),
        generator.as_ref(),
        question,
        config.retrieval.top_k,
    )
    .await;
    pool.close().await;
    let answer = answer?;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print!("{}", render::render_answer(&answer));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::MIME_TEXT;
    use crate::index::index_resume;
    use crate::models::Upload;
    use crate::progress::NoProgress;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct LengthEmbedder;

    #[async_trait]
    impl EmbeddingProvider for LengthEmbedder {
        fn model_name(&self) -> &str {
            "length"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![1.0, t.len() as f32]).collect())
        }
    }

    struct EchoGenerator {
        prompt: Mutex<String>,
    }

    #[async_trait]
    impl Generator for EchoGenerator {
        fn model_name(&self) -> &str {
            "echo"
        }
        async fn generate(&self, prompt: &str) -> Result<String> {
            *self.prompt.lock().unwrap() = prompt.to_string();
            Ok("  They worked at Acme.  ".to_string())
        }
    }

    async fn index_with(text: Option<&str>) -> (tempfile::TempDir, VectorIndex) {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::minimal();
        config.db.path = tmp.path().join("qa.sqlite");
        let pool = db::open(&config.db).await.unwrap();
        let index = VectorIndex::new(pool);
        if let Some(text) = text {
            let upload = Upload {
                file_name: "cv.txt".to_string(),
                content_type: MIME_TEXT.to_string(),
                bytes: text.as_bytes().to_vec(),
            };
            index_resume(&index, &config, &LengthEmbedder, &upload, &NoProgress)
                .await
                .unwrap();
        }
        (tmp, index)
    }

    #[tokio::test]
    async fn empty_question_is_rejected() {
        let (_tmp, index) = index_with(None).await;
        let generator = EchoGenerator {
            prompt: Mutex::new(String::new()),
        };
        let err = answer_question(&index, &LengthEmbedder, &generator, "   ", 4)
            .await
            .unwrap_err();
        assert!(matches!(err, AskError::EmptyQuestion));
    }

    #[tokio::test]
    async fn question_without_index_is_rejected() {
        let (_tmp, index) = index_with(None).await;
        let generator = EchoGenerator {
            prompt: Mutex::new(String::new()),
        };
        let err = answer_question(&index, &LengthEmbedder, &generator, "Where?", 4)
            .await
            .unwrap_err();
        assert!(matches!(err, AskError::NoIndex));
        assert!(generator.prompt.lock().unwrap().is_empty());
    }

    struct WideEmbedder;

    #[async_trait]
    impl EmbeddingProvider for WideEmbedder {
        fn model_name(&self) -> &str {
            "wide"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
        }
    }

    #[tokio::test]
    async fn changed_embedding_model_requires_reindex() {
        let resume = "Jane Doe worked at Acme Corp as a backend engineer writing Rust services.";
        let (_tmp, index) = index_with(Some(resume)).await;
        let generator = EchoGenerator {
            prompt: Mutex::new(String::new()),
        };

        let err = answer_question(&index, &WideEmbedder, &generator, "Where?", 4)
            .await
            .unwrap_err();
        match &err {
            AskError::ModelMismatch {
                indexed,
                indexed_dims,
                current,
                current_dims,
            } => {
                assert_eq!((indexed.as_str(), *indexed_dims), ("length", 2));
                assert_eq!((current.as_str(), *current_dims), ("wide", 3));
            }
            other => panic!("expected a model mismatch, got {:?}", other),
        }
        assert!(err.to_string().contains("re-index"));
        assert!(generator.prompt.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn answer_uses_retrieved_context() {
        let resume = "Jane Doe worked at Acme Corp as a backend engineer writing Rust services.";
        let (_tmp, index) = index_with(Some(resume)).await;
        let generator = EchoGenerator {
            prompt: Mutex::new(String::new()),
        };

        let answer = answer_question(&index, &LengthEmbedder, &generator, " Where did Jane work? ", 4)
            .await
            .unwrap();
        assert_eq!(answer.question, "Where did Jane work?");
        assert_eq!(answer.answer, "They worked at Acme.");
        assert_eq!(answer.sources.len(), 1);

        let prompt = generator.prompt.lock().unwrap().clone();
        assert!(prompt.contains("Resume context:\nJane Doe worked at Acme Corp"));
        assert!(prompt.contains("Question: Where did Jane work?"));
    }
}
