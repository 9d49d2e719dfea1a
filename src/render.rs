//! Terminal rendering of analysis results and answers.

use std::fmt::Write;

use crate::analyze::AnalyzeError;
use crate::extract::ExtractError;
use crate::models::{InputKind, Normalized, QaAnswer};

/// Warning text shown to the user for each analysis failure.
pub fn user_message(err: &AnalyzeError) -> String {
    match err {
        AnalyzeError::MissingInput(InputKind::Resume) => {
            "Please upload a resume before analyzing.".to_string()
        }
        AnalyzeError::MissingInput(InputKind::JobDescription) => {
            "Please enter a job description before analyzing.".to_string()
        }
        AnalyzeError::ExtractionEmpty { input } => format!(
            "Could not read enough text from the {}. Check that it is not a scanned image or empty.",
            input
        ),
        AnalyzeError::Extraction(ExtractError::UnsupportedContentType(ct)) => format!(
            "Unsupported file type '{}'. Upload a PDF, DOCX or plain-text resume.",
            ct
        ),
        AnalyzeError::Extraction(e) => format!("Could not read the resume: {}", e),
        AnalyzeError::Generation(e) => format!("The analysis service failed: {:#}", e),
    }
}

/// Score block, improvements and skill suggestions; or the error and raw reply.
pub fn render_analysis(outcome: &Normalized) -> String {
    let mut out = String::new();
    match outcome {
        Normalized::Analysis(result) => {
            let _ = writeln!(out, "CV Score: {}", result.score);
            if let Some(job_match) = &result.job_match {
                let _ = writeln!(out, "Job Match: {}", job_match);
            }
            render_list(&mut out, "Improvements", &result.improvements);
            render_list(&mut out, "Skill Suggestions", &result.skill_suggestions);
        }
        Normalized::ParseFailure(failure) => {
            let _ = writeln!(out, "An error occurred: {}", failure.error);
            let _ = writeln!(out, "Raw response:");
            let _ = writeln!(out, "{}", failure.raw_response);
        }
    }
    out
}

fn render_list(out: &mut String, title: &str, items: &[String]) {
    let _ = writeln!(out, "\n{}:", title);
    if items.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for item in items {
        let _ = writeln!(out, "  - {}", item);
    }
}

pub fn render_answer(answer: &QaAnswer) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Answer:\n{}", answer.answer);
    if !answer.sources.is_empty() {
        let _ = writeln!(out, "\nSources:");
        for source in &answer.sources {
            let preview: String = source.text.chars().take(80).collect();
            let _ = writeln!(
                out,
                "  [chunk {}] {:.3}  {}",
                source.chunk_index,
                source.score,
                preview.replace('\n', " ")
            );
        }
    }
    out
}
