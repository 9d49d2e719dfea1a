//! # Resume Analyzer
//!
//! Critiques resumes and answers questions about them with a hosted
//! language model.
//!
//! A resume (PDF, DOCX or plain text) is turned into text, checked for
//! usable content, and sent to a generation service together with an
//! optional job description. The model's loosely formatted JSON reply is
//! normalized into a typed [`models::AnalysisResult`]. A second flow indexes
//! the resume into overlapping chunks with embeddings stored in SQLite and
//! answers natural-language questions from the most similar chunks.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌───────┐   ┌────────┐   ┌────────────┐   ┌───────────┐
//! │ extract │──▶│ guard │──▶│ prompt │──▶│ generation │──▶│ normalize │
//! └─────────┘   └───┬───┘   └────────┘   └────────────┘   └───────────┘
//!                   │
//!                   ▼
//!              ┌─────────┐   ┌───────────┐   ┌──────────┐
//!              │  chunk  │──▶│ embedding │──▶│  SQLite  │──▶ qa
//!              └─────────┘   └───────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! resumectl analyze cv.pdf --job-text "Backend engineer, Rust, PostgreSQL ..."
//! resumectl index cv.pdf
//! resumectl ask "What did the candidate do at their last job?"
//! resumectl serve                # web UI on http://127.0.0.1:8501
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`normalize`] | Model reply → typed result |
//! | [`extract`] | PDF / DOCX / text extraction |
//! | [`prompt`] | Prompt templates |
//! | [`generation`] | Text-generation providers |
//! | [`analyze`] | Analysis pipeline and input guard |
//! | [`chunk`] | Overlapping text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | SQLite vector index |
//! | [`qa`] | Question answering |
//! | [`render`] | Terminal output |
//! | [`server`] | HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod analyze;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod generation;
pub mod http;
pub mod index;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod prompt;
pub mod qa;
pub mod render;
pub mod server;
