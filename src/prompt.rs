//! Fixed prompt templates for the analysis and question-answering flows.

use crate::models::FieldSet;

const QA_TEMPLATE: &str = "\
You are an AI assistant specialized in analyzing resumes and providing insights about the candidate.
Given the following extracted parts of a resume and a question, create a final answer. \
If you don't know the answer based on the given context, then say you don't have enough information.

Resume context:
{context}

Question: {question}
Answer:";

/// Build the critique prompt for one resume.
///
/// The job description block and the `job_match` request are included only
/// when a job description is supplied and `fields.job_match` is set.
pub fn analysis_prompt(resume_text: &str, job_description: Option<&str>, fields: FieldSet) -> String {
    let mut prompt = String::new();

    match job_description {
        Some(jd) => {
            prompt.push_str(
                "Analyze the given resume text and compare it with the following job description:\n\n",
            );
            prompt.push_str("Job Description:\n");
            prompt.push_str(jd.trim());
            prompt.push_str("\n\n");
        }
        None => prompt.push_str("Analyze the given resume text:\n\n"),
    }

    prompt.push_str("Resume Text:\n");
    prompt.push_str(resume_text.trim());
    prompt.push_str("\n\nProvide the following information:\n");
    prompt.push_str("1. CV Score (out of 100)\n");

    let mut keys = vec!["\"score\""];
    let mut item = 2;
    if fields.job_match {
        prompt.push_str(&format!(
            "{}. Job Match percentage between the resume and the job description\n",
            item
        ));
        keys.push("\"job_match\"");
        item += 1;
    }
    prompt.push_str(&format!("{}. Things that can be improved in the CV\n", item));
    prompt.push_str(&format!("{}. Skills Improvement Suggestions\n\n", item + 1));
    keys.push("\"improvements\"");

    prompt.push_str(&format!(
        "Format the response as JSON with keys: {}, and \"skill_suggestions\".\n",
        keys.join(", ")
    ));
    prompt
}

/// Build the question-answering prompt from retrieved resume context.
pub fn qa_prompt(context: &str, question: &str) -> String {
    QA_TEMPLATE
        .replace("{context}", context)
        .replace("{question}", question)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_prompt_without_job_description() {
        let p = analysis_prompt("Jane Doe, Rust engineer", None, FieldSet::default());
        assert!(p.contains("Resume Text:\nJane Doe, Rust engineer"));
        assert!(!p.contains("Job Description"));
        assert!(!p.contains("job_match"));
        assert!(p.contains(r#"keys: "score", "improvements", and "skill_suggestions"."#));
    }

    #[test]
    fn analysis_prompt_with_job_match() {
        let p = analysis_prompt("resume", Some("  Backend role  "), FieldSet::with_job_match());
        assert!(p.contains("Job Description:\nBackend role\n"));
        assert!(p.contains("2. Job Match percentage"));
        assert!(p.contains("4. Skills Improvement Suggestions"));
        assert!(p.contains(r#""score", "job_match", "improvements", and "skill_suggestions""#));
    }

    #[test]
    fn job_description_without_job_match_field() {
        let p = analysis_prompt("resume", Some("role"), FieldSet::default());
        assert!(p.contains("Job Description:\nrole"));
        assert!(!p.contains("job_match"));
    }

    #[test]
    fn qa_prompt_fills_placeholders() {
        let p = qa_prompt("Worked at Acme", "Where did they work?");
        assert!(p.contains("Resume context:\nWorked at Acme\n"));
        assert!(p.contains("Question: Where did they work?\nAnswer:"));
        assert!(p.contains("say you don't have enough information"));
    }
}
