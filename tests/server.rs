use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tempfile::TempDir;

use resume_analyzer::config::Config;
use resume_analyzer::db;
use resume_analyzer::embedding::EmbeddingProvider;
use resume_analyzer::generation::Generator;
use resume_analyzer::server::{router, AppState};

const RESUME: &str = "Jane Doe\nSenior backend engineer at Acme Corp.\n\n\
                      Eight years of Rust and PostgreSQL. Built payment services \
                      handling millions of requests per day.";

const ANALYSIS_REPLY: &str = r#"Sure! Here is the analysis:
{"score": 82, "job_match": "75%", "improvements": ["Quantify impact"], "skill_suggestions": ["Kubernetes"]}"#;

/// Answers questions with a fixed string and analyses with `analysis_reply`.
struct StubGenerator {
    analysis_reply: String,
}

#[async_trait]
impl Generator for StubGenerator {
    fn model_name(&self) -> &str {
        "stub"
    }
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        if prompt.contains("Question:") {
            Ok("The candidate works at Acme Corp.".to_string())
        } else {
            Ok(self.analysis_reply.clone())
        }
    }
}

struct StubEmbedder;

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    fn model_name(&self) -> &str {
        "stub-embed"
    }
    fn dims(&self) -> usize {
        2
    }
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| vec![1.0, t.matches("Acme").count() as f32])
            .collect())
    }
}

async fn spawn_app(analysis_reply: &str, configure: impl FnOnce(&mut Config)) -> (TempDir, SocketAddr) {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::minimal();
    config.db.path = tmp.path().join("server.sqlite");
    configure(&mut config);

    let pool = db::open(&config.db).await.unwrap();
    let generator = Arc::new(StubGenerator {
        analysis_reply: analysis_reply.to_string(),
    });
    let state = AppState::new(config, generator, Arc::new(StubEmbedder), pool);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    (tmp, addr)
}

fn resume_part(bytes: Vec<u8>, file_name: &str, mime: &str) -> Part {
    Part::bytes(bytes)
        .file_name(file_name.to_string())
        .mime_str(mime)
        .unwrap()
}

async fn post_form(addr: SocketAddr, path: &str, form: Form) -> (u16, Value) {
    let res = reqwest::Client::new()
        .post(format!("http://{}{}", addr, path))
        .multipart(form)
        .send()
        .await
        .unwrap();
    let status = res.status().as_u16();
    (status, res.json().await.unwrap())
}

async fn post_json(addr: SocketAddr, path: &str, body: &str) -> (u16, Value) {
    let res = reqwest::Client::new()
        .post(format!("http://{}{}", addr, path))
        .header("Content-Type", "application/json")
        .body(body.to_string())
        .send()
        .await
        .unwrap();
    let status = res.status().as_u16();
    (status, res.json().await.unwrap())
}

fn docx_with_text(text: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>",
            text
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

#[tokio::test]
async fn health_and_index_page() {
    let (_tmp, addr) = spawn_app(ANALYSIS_REPLY, |_| {}).await;

    let health: Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));

    let page = reqwest::get(format!("http://{}/", addr))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("Resume Analyzer"));
    assert!(page.contains("/api/analyze"));
}

#[tokio::test]
async fn analyze_with_job_description() {
    let (_tmp, addr) = spawn_app(ANALYSIS_REPLY, |_| {}).await;

    let form = Form::new()
        .part("resume", resume_part(RESUME.as_bytes().to_vec(), "cv.txt", "text/plain"))
        .text(
            "job_description",
            "Backend engineer to build and operate Rust services on PostgreSQL at scale.",
        );
    let (status, body) = post_form(addr, "/api/analyze", form).await;

    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["status"], "analysis");
    assert_eq!(body["score"], "82");
    assert_eq!(body["job_match"], "75%");
    assert_eq!(body["improvements"][0], "Quantify impact");
    assert_eq!(body["skill_suggestions"][0], "Kubernetes");
}

#[tokio::test]
async fn analyze_without_job_description_omits_job_match() {
    let (_tmp, addr) = spawn_app(ANALYSIS_REPLY, |_| {}).await;

    let form = Form::new().part("resume", resume_part(RESUME.as_bytes().to_vec(), "cv.txt", "text/plain"));
    let (status, body) = post_form(addr, "/api/analyze", form).await;

    assert_eq!(status, 200);
    assert_eq!(body["score"], "82");
    assert!(body.get("job_match").is_none());
}

#[tokio::test]
async fn analyze_docx_upload() {
    let (_tmp, addr) = spawn_app(ANALYSIS_REPLY, |_| {}).await;

    let form = Form::new().part(
        "resume",
        resume_part(
            docx_with_text(&RESUME.replace('\n', " ")),
            "cv.docx",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ),
    );
    let (status, body) = post_form(addr, "/api/analyze", form).await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["status"], "analysis");
}

#[tokio::test]
async fn unparseable_reply_is_returned_as_parse_failure() {
    let (_tmp, addr) = spawn_app("I cannot help with that.", |_| {}).await;

    let form = Form::new().part("resume", resume_part(RESUME.as_bytes().to_vec(), "cv.txt", "text/plain"));
    let (status, body) = post_form(addr, "/api/analyze", form).await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "parse_failure");
    assert_eq!(body["error"], "Failed to parse response");
    assert_eq!(body["raw_response"], "I cannot help with that.");
}

#[tokio::test]
async fn analyze_error_codes() {
    let (_tmp, addr) = spawn_app(ANALYSIS_REPLY, |_| {}).await;

    let form = Form::new().text("job_description", "anything");
    let (status, body) = post_form(addr, "/api/analyze", form).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "missing_input");

    let form = Form::new().part("resume", resume_part(b"Jane Doe".to_vec(), "cv.txt", "text/plain"));
    let (status, body) = post_form(addr, "/api/analyze", form).await;
    assert_eq!(status, 422);
    assert_eq!(body["error"]["code"], "extraction_empty");

    let form = Form::new().part("resume", resume_part(vec![0x89, b'P', b'N', b'G'], "cv.png", "image/png"));
    let (status, body) = post_form(addr, "/api/analyze", form).await;
    assert_eq!(status, 415);
    assert_eq!(body["error"]["code"], "unsupported_content_type");

    let form = Form::new().part("resume", resume_part(b"not a pdf".to_vec(), "cv.pdf", "application/pdf"));
    let (status, body) = post_form(addr, "/api/analyze", form).await;
    assert_eq!(status, 422);
    assert_eq!(body["error"]["code"], "extraction_failed");
}

#[tokio::test]
async fn required_job_description_is_enforced() {
    let (_tmp, addr) = spawn_app(ANALYSIS_REPLY, |c| c.analysis.require_job_description = true).await;

    let form = Form::new().part("resume", resume_part(RESUME.as_bytes().to_vec(), "cv.txt", "text/plain"));
    let (status, body) = post_form(addr, "/api/analyze", form).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "missing_input");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("job description"));
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let (_tmp, addr) = spawn_app(ANALYSIS_REPLY, |c| c.analysis.max_upload_bytes = 1024).await;

    let big = "x ".repeat(4096).into_bytes();
    let form = Form::new().part("resume", resume_part(big, "cv.txt", "text/plain"));
    let res = reqwest::Client::new()
        .post(format!("http://{}/api/analyze", addr))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 413);
}

#[tokio::test]
async fn index_then_ask() {
    let (_tmp, addr) = spawn_app(ANALYSIS_REPLY, |_| {}).await;

    let (status, body) = post_json(addr, "/api/ask", r#"{"question": "Where do they work?"}"#).await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "no_index");

    let form = Form::new().part("resume", resume_part(RESUME.as_bytes().to_vec(), "cv.txt", "text/plain"));
    let (status, body) = post_form(addr, "/api/index", form).await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["file_name"], "cv.txt");
    assert_eq!(body["chunks"], 1);
    assert_eq!(body["model"], "stub-embed");

    let (status, body) = post_json(addr, "/api/ask", r#"{"question": "Where do they work?"}"#).await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["answer"], "The candidate works at Acme Corp.");
    assert_eq!(body["sources"][0]["chunk_index"], 0);
}

#[tokio::test]
async fn ask_rejects_bad_input() {
    let (_tmp, addr) = spawn_app(ANALYSIS_REPLY, |_| {}).await;

    let (status, body) = post_json(addr, "/api/ask", r#"{"question": "   "}"#).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, body) = post_json(addr, "/api/ask", "not json").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
}
