//! Text-generation providers.
//!
//! Defines the [`Generator`] trait and concrete implementations:
//! - **[`GeminiGenerator`]** — Google Generative Language API (`generateContent`).
//! - **[`OpenAIGenerator`]** — OpenAI-compatible chat completions.
//! - **[`OllamaGenerator`]** — a local Ollama instance (`/api/generate`).
//! - **[`DisabledGenerator`]** — always errors; used when no provider is configured.
//!
//! Providers receive their API key through [`GenerationConfig::api_key`]; they
//! never read the environment. Use [`create_generator`] to build the provider
//! named in the configuration.
//!
//! ```rust
//! # use resume_analyzer::config::GenerationConfig;
//! # use resume_analyzer::generation::create_generator;
//! let config = GenerationConfig {
//!     provider: "disabled".to_string(),
//!     ..GenerationConfig::default()
//! };
//! let generator = create_generator(&config).unwrap();
//! assert_eq!(generator.model_name(), "disabled");
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::GenerationConfig;
use crate::http::{self, Auth, GEMINI_KEY_HEADER};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const OPENAI_BASE_URL: &str = "https://api.openai.com";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// A service that turns one prompt into one raw text reply.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier (e.g. `"gemini-pro"`).
    fn model_name(&self) -> &str;

    /// Send `prompt` and return the model's unparsed reply.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

// ============ Disabled ============

pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        bail!("Generation provider is disabled. Set [generation] provider in config.")
    }
}

// ============ Gemini ============

pub struct GeminiGenerator {
    model: String,
    api_key: String,
    base_url: String,
    temperature: Option<f32>,
    max_retries: u32,
    client: reqwest::Client,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = require_key(config)?;
        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: base_url(config, GEMINI_BASE_URL),
            temperature: config.temperature,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url,
            self.model.trim_start_matches("models/")
        );
        let mut body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });
        if let Some(t) = self.temperature {
            body["generationConfig"] = json!({ "temperature": t });
        }

        let reply = http::post_json_with_retry(
            &self.client,
            &url,
            Auth::Header(GEMINI_KEY_HEADER, &self.api_key),
            &body,
            self.max_retries,
            "Gemini",
        )
        .await?;
        parse_gemini_response(&reply)
    }
}

/// Concatenate the text parts of the first candidate.
fn parse_gemini_response(json: &Value) -> Result<String> {
    let parts = json
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array)
        .ok_or_else(|| match json.pointer("/promptFeedback/blockReason") {
            Some(reason) => anyhow::anyhow!("Gemini blocked the prompt: {}", reason),
            None => anyhow::anyhow!("Invalid Gemini response: missing candidate content"),
        })?;

    Ok(parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join(""))
}

// ============ OpenAI ============

pub struct OpenAIGenerator {
    model: String,
    api_key: String,
    base_url: String,
    temperature: Option<f32>,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = require_key(config)?;
        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: base_url(config, OPENAI_BASE_URL),
            temperature: config.temperature,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let mut body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }

        let reply = http::post_json_with_retry(
            &self.client,
            &url,
            Auth::Bearer(&self.api_key),
            &body,
            self.max_retries,
            "OpenAI",
        )
        .await?;
        parse_openai_response(&reply)
    }
}

fn parse_openai_response(json: &Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

// ============ Ollama ============

pub struct OllamaGenerator {
    model: String,
    base_url: String,
    temperature: Option<f32>,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            model: config.model.clone(),
            base_url: base_url(config, OLLAMA_BASE_URL),
            temperature: config.temperature,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let mut body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        if let Some(t) = self.temperature {
            body["options"] = json!({ "temperature": t });
        }

        let reply = http::post_json_with_retry(
            &self.client,
            &url,
            Auth::None,
            &body,
            self.max_retries,
            "Ollama",
        )
        .await?;
        reply
            .get("response")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response field"))
    }
}

// ============ Construction ============

fn require_key(config: &GenerationConfig) -> Result<String> {
    config.api_key.clone().ok_or_else(|| {
        anyhow::anyhow!(
            "{} environment variable not set (required by generation provider '{}')",
            config.api_key_env,
            config.provider
        )
    })
}

fn base_url(config: &GenerationConfig, default: &str) -> String {
    config
        .url
        .as_deref()
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

/// Create the [`Generator`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledGenerator`] |
/// | `"gemini"` | [`GeminiGenerator`] |
/// | `"openai"` | [`OpenAIGenerator`] |
/// | `"ollama"` | [`OllamaGenerator`] |
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledGenerator)),
        "gemini" => Ok(Box::new(GeminiGenerator::new(config)?)),
        "openai" => Ok(Box::new(OpenAIGenerator::new(config)?)),
        "ollama" => Ok(Box::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}
