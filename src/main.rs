//! # Resume Analyzer CLI (`resumectl`)
//!
//! ## Usage
//!
//! ```bash
//! resumectl --config ./config/resume.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `resumectl init` | Create the SQLite database and schema |
//! | `resumectl extract <file>` | Print the text extracted from a resume |
//! | `resumectl analyze <file>` | Score a resume and list improvements |
//! | `resumectl index <file>` | Index a resume for question answering |
//! | `resumectl ask "<question>"` | Ask a question about the indexed resume |
//! | `resumectl serve` | Start the HTTP server and web UI |
//! | `resumectl completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! export GEMINI_API_KEY=...
//! resumectl analyze cv.pdf --job-description role.txt
//! resumectl analyze cv.pdf --json
//!
//! export GOOGLE_API_KEY=...
//! resumectl index cv.pdf
//! resumectl ask "Which databases has the candidate used?"
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use resume_analyzer::analyze;
use resume_analyzer::config::{self, Config};
use resume_analyzer::db;
use resume_analyzer::extract;
use resume_analyzer::index;
use resume_analyzer::models::Upload;
use resume_analyzer::progress::ProgressMode;
use resume_analyzer::qa;
use resume_analyzer::server;

const DEFAULT_CONFIG_PATH: &str = "./config/resume.toml";

/// Resume Analyzer: critique resumes and answer questions about them using a
/// hosted language model.
///
/// API keys are read from the environment variables named in the config
/// (`GEMINI_API_KEY` and `GOOGLE_API_KEY` by default). A `.env` file in the
/// working directory is loaded first. See `config/resume.example.toml`.
#[derive(Parser)]
#[command(name = "resumectl", version, about = "Resume critique and question answering")]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// When omitted, `./config/resume.toml` is used if it exists; otherwise
    /// built-in defaults apply.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit log lines as JSON (logs always go to stderr).
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the resumes, chunks and
    /// embeddings tables. Safe to run repeatedly.
    Init,

    /// Print the plain text extracted from a resume (PDF, DOCX or TXT).
    Extract {
        file: PathBuf,
    },

    /// Analyze a resume: score, improvements and skill suggestions.
    ///
    /// With a job description, the model is also asked for a job-match
    /// percentage.
    Analyze {
        /// Resume file (PDF, DOCX or TXT).
        file: PathBuf,

        /// Job description file (PDF, DOCX or TXT).
        #[arg(long, conflicts_with = "job_text")]
        job_description: Option<PathBuf>,

        /// Job description given inline.
        #[arg(long)]
        job_text: Option<String>,

        /// Print the result as JSON instead of formatted text.
        #[arg(long)]
        json: bool,
    },

    /// Index a resume for question answering, replacing any previous one.
    Index {
        file: PathBuf,

        /// Progress output on stderr.
        #[arg(long, value_enum, default_value_t = ProgressArg::Auto)]
        progress: ProgressArg,

        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Ask a question about the indexed resume.
    Ask {
        question: String,

        /// Print the answer and its sources as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP server (JSON API and web UI) on `[server].bind`.
    Serve,

    /// Print shell completion script to stdout.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ProgressArg {
    /// Human-readable when stderr is a terminal, otherwise off.
    Auto,
    Off,
    Human,
    Json,
}

impl ProgressArg {
    fn mode(self) -> ProgressMode {
        match self {
            ProgressArg::Auto => ProgressMode::default_for_tty(),
            ProgressArg::Off => ProgressMode::Off,
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("resume_analyzer=info,resumectl=info,tower_http=info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn resolve_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => config::load_config(path),
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if default.exists() {
                config::load_config(default)
            } else {
                tracing::debug!("no config file found, using defaults");
                Ok(Config::minimal())
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "resumectl", &mut std::io::stdout());
        return Ok(());
    }

    dotenvy::dotenv().ok();
    init_tracing(cli.log_json);

    let cfg = resolve_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => {
            let pool = db::open(&cfg.db).await?;
            pool.close().await;
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Extract { file } => {
            let upload = Upload::from_path(&file)?;
            let text = extract::extract_text(&upload.bytes, &upload.content_type)?;
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", text)?;
        }
        Commands::Analyze {
            file,
            job_description,
            job_text,
            json,
        } => {
            analyze::run_analyze(&cfg, &file, job_description.as_deref(), job_text, json).await?;
        }
        Commands::Index {
            file,
            progress,
            json,
        } => {
            index::run_index(&cfg, &file, progress.mode(), json).await?;
        }
        Commands::Ask { question, json } => {
            qa::run_ask(&cfg, &question, json).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
