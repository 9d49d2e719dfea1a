//! Resume analysis pipeline.
//!
//! ```text
//! Upload ─▶ extract ─▶ guard ─▶ prompt ─▶ Generator ─▶ normalize ─▶ Normalized
//! ```
//!
//! Every check runs before the generation call, so a missing or unreadable
//! input never costs a model request. A reply that cannot be interpreted is
//! not an error: it comes back as [`Normalized::ParseFailure`].

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use thiserror::Error;

use crate::config::{AnalysisConfig, Config};
use crate::extract::{self, ExtractError};
use crate::generation::{self, Generator};
use crate::models::{FieldSet, InputKind, Normalized, Upload};
use crate::normalize::normalize;
use crate::prompt;
use crate::render;

/// Failures that stop an analysis before a result exists.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("no {0} was provided")]
    MissingInput(InputKind),
    #[error("the {input} contains too little readable text")]
    ExtractionEmpty { input: InputKind },
    #[error(transparent)]
    Extraction(#[from] ExtractError),
    #[error("generation failed: {0:#}")]
    Generation(anyhow::Error),
}

/// True when the trimmed text has at least `min_len` characters.
///
/// ```rust
/// use resume_analyzer::analyze::is_meaningful;
///
/// assert!(!is_meaningful("", 50));
/// assert!(!is_meaningful(&format!("  {}  ", "x".repeat(49)), 50));
/// assert!(is_meaningful(&"x".repeat(51), 50));
/// ```
pub fn is_meaningful(text: &str, min_len: usize) -> bool {
    text.trim().chars().count() >= min_len
}

/// Inputs for one analysis.
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    pub resume: Option<Upload>,
    /// Job description text; blank text counts as not supplied.
    pub job_description: Option<String>,
}

pub struct Analyzer {
    generator: Arc<dyn Generator>,
    settings: AnalysisConfig,
}

impl Analyzer {
    pub fn new(generator: Arc<dyn Generator>, settings: AnalysisConfig) -> Self {
        Self {
            generator,
            settings,
        }
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<Normalized, AnalyzeError> {
        let resume = request
            .resume
            .as_ref()
            .ok_or(AnalyzeError::MissingInput(InputKind::Resume))?;
        let job_description = request
            .job_description
            .as_deref()
            .map(str::trim)
            .filter(|jd| !jd.is_empty());
        if job_description.is_none() && self.settings.require_job_description {
            return Err(AnalyzeError::MissingInput(InputKind::JobDescription));
        }

        let resume_text = extract::extract_text(&resume.bytes, &resume.content_type)?;
        let min_len = self.settings.min_text_chars;
        if !is_meaningful(&resume_text, min_len) {
            tracing::warn!(file = %resume.file_name, "resume text below minimum length");
            return Err(AnalyzeError::ExtractionEmpty {
                input: InputKind::Resume,
            });
        }
        if let Some(jd) = job_description {
            if !is_meaningful(jd, min_len) {
                return Err(AnalyzeError::ExtractionEmpty {
                    input: InputKind::JobDescription,
                });
            }
        }

        let fields = FieldSet {
            job_match: self.settings.request_job_match && job_description.is_some(),
        };
        let prompt = prompt::analysis_prompt(&resume_text, job_description, fields);

        tracing::info!(
            file = %resume.file_name,
            model = self.generator.model_name(),
            chars = resume_text.len(),
            job_match = fields.job_match,
            "analyzing resume"
        );
        let raw = self
            .generator
            .generate(&prompt)
            .await
            .map_err(AnalyzeError::Generation)?;

        let outcome = normalize(&raw, fields);
        if outcome.is_parse_failure() {
            tracing::warn!(reply_len = raw.len(), "model reply could not be parsed");
        }
        Ok(outcome)
    }
}

/// Read a job description from a file (any supported format) or inline text.
fn load_job_description(file: Option<&Path>, text: Option<String>) -> Result<Option<String>> {
    match file {
        Some(path) => {
            let upload = Upload::from_path(path)?;
            let text = extract::extract_text(&upload.bytes, &upload.content_type)
                .with_context(|| format!("failed to read job description {}", path.display()))?;
            Ok(Some(text))
        }
        None => Ok(text),
    }
}

/// `resumectl analyze`: analyze one resume file and print the critique.
pub async fn run_analyze(
    config: &Config,
    resume_path: &Path,
    job_description_file: Option<&Path>,
    job_text: Option<String>,
    json: bool,
) -> Result<()> {
    let generator: Arc<dyn Generator> = Arc::from(generation::create_generator(&config.generation)?);
    let analyzer = Analyzer::new(generator, config.analysis.clone());

    let request = AnalysisRequest {
        resume: Some(Upload::from_path(resume_path)?),
        job_description: load_job_description(job_description_file, job_text)?,
    };

    let outcome = analyzer
        .analyze(&request)
        .await
        .map_err(|e| anyhow::anyhow!(render::user_message(&e)))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print!("{}", render::render_analysis(&outcome));
    }
    Ok(())
}
