//! Core data types shared by the analysis and question-answering pipelines.

use serde::Serialize;

/// Sentinel used for score-like fields the model did not provide.
pub const NOT_AVAILABLE: &str = "N/A";

/// Error indicator carried by every [`ParseFailure`].
pub const PARSE_FAILURE_MESSAGE: &str = "Failed to parse response";

/// Which optional fields the caller asked the model for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldSet {
    pub job_match: bool,
}

impl FieldSet {
    pub fn with_job_match() -> Self {
        Self { job_match: true }
    }
}

/// Structured critique of a resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    pub score: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_match: Option<String>,
    pub improvements: Vec<String>,
    pub skill_suggestions: Vec<String>,
}

/// A model reply that could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseFailure {
    pub error: String,
    pub raw_response: String,
}

impl ParseFailure {
    pub fn new(raw_response: impl Into<String>) -> Self {
        Self {
            error: PARSE_FAILURE_MESSAGE.to_string(),
            raw_response: raw_response.into(),
        }
    }
}

/// Outcome of normalizing one model reply: exactly one of the two variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Normalized {
    Analysis(AnalysisResult),
    ParseFailure(ParseFailure),
}

impl Normalized {
    pub fn is_parse_failure(&self) -> bool {
        matches!(self, Normalized::ParseFailure(_))
    }
}

/// A window of resume text stored in the vector index.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// A chunk returned from similarity search.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub chunk_index: i64,
    pub text: String,
    pub score: f32,
}

/// Result of indexing an uploaded resume.
#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    pub resume_id: String,
    pub file_name: String,
    pub chunks: usize,
    pub embedded: usize,
    pub model: String,
}

/// Answer to a question about the indexed resume.
#[derive(Debug, Clone, Serialize)]
pub struct QaAnswer {
    pub question: String,
    pub answer: String,
    pub sources: Vec<RetrievedChunk>,
}

/// Which user input a check refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Resume,
    JobDescription,
}

impl std::fmt::Display for InputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputKind::Resume => f.write_str("resume"),
            InputKind::JobDescription => f.write_str("job description"),
        }
    }
}

/// An uploaded document: raw bytes plus the declared content type.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Read a file from disk, inferring its content type from the extension.
    pub fn from_path(path: &std::path::Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let content_type = crate::extract::content_type_for_path(path).with_context(|| {
            format!(
                "unsupported file type: {} (expected .pdf, .docx or .txt)",
                path.display()
            )
        })?;
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            file_name,
            content_type: content_type.to_string(),
            bytes,
        })
    }
}
