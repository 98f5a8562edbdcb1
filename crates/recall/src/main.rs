//! # Recall CLI (`rcl`)
//!
//! The `rcl` binary is the interface to a Recall vault. It provides
//! commands for database initialization, credential provisioning, media
//! capture, search, grounded chat, and per-document AI tasks.
//!
//! ## Usage
//!
//! ```bash
//! rcl --config ./config/rcl.toml --code <ACCESS_CODE> <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rcl init` | Create the SQLite database and run schema migrations |
//! | `rcl credential add <secret>` | Provision an access code |
//! | `rcl capture <path>` | Extract a photo/file/recording, confirm, save |
//! | `rcl list` | List your documents, newest first |
//! | `rcl search "<query>"` | Keyword or vector search over your documents |
//! | `rcl get <id>` | Show a full document and its task history |
//! | `rcl chat` | Chat over your documents with streamed replies |
//! | `rcl task <id> "<prompt>"` | Run an AI task against a document |
//! | `rcl stats` | Show vault statistics |
//! | `rcl completions <shell>` | Generate shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # One-time setup
//! rcl init
//! rcl credential add s3cret
//!
//! # Capture a photo of a recipe and confirm the extraction
//! rcl --code s3cret capture dinner.jpg --category Recipe
//!
//! # Find it again
//! rcl --code s3cret search "pasta" --mode vector
//!
//! # Ask questions over everything you've captured
//! rcl --code s3cret chat
//! ```

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use recall::auth;
use recall::chat;
use recall::config::{self, Config};
use recall::db;
use recall::get;
use recall::ingest;
use recall::migrate;
use recall::model::openai::OpenAiModel;
use recall::model::ModelService;
use recall::search;
use recall::sqlite_store::SqliteStore;
use recall::stats;
use recall::store::Store;
use recall::task;

/// Recall — capture photos, files, and voice notes into a searchable,
/// chat-ready document vault.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; commands that touch documents additionally need an access code
/// via `--code` or the `RECALL_CODE` environment variable. The model API
/// key is read from `OPENAI_API_KEY`.
#[derive(Parser)]
#[command(
    name = "rcl",
    about = "Recall — capture real-life artifacts into a searchable, chat-ready document vault",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rcl.toml")]
    config: PathBuf,

    /// Access code for this session.
    #[arg(long, global = true, env = "RECALL_CODE")]
    code: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (credentials, documents, document_tasks, documents_fts).
    /// This command is idempotent — running it multiple times is safe.
    Init,

    /// Manage access codes.
    Credential {
        #[command(subcommand)]
        action: CredentialAction,
    },

    /// Capture a photo, uploaded file, or voice recording.
    ///
    /// Sends the media to the model service for extraction, shows the
    /// resulting JSON as a preview, and persists it only after an explicit
    /// confirmation. Audio files (wav, mp3, m4a, ogg, flac, webm) are
    /// transcribed; everything else is treated as an image.
    Capture {
        /// Path to the media file.
        path: PathBuf,

        /// Declared category of the capture (Recipe, Document, Animal,
        /// Vehicle, Product, ...). The model still classifies on its own.
        #[arg(long, default_value = "Other")]
        category: String,

        /// Skip the confirmation prompt and save immediately.
        #[arg(long)]
        yes: bool,
    },

    /// List your documents, most recently captured first.
    List,

    /// Search your documents.
    Search {
        /// The search query string. An empty query lists everything.
        query: String,

        /// Search mode: `keyword` (full-text) or `vector` (similarity).
        #[arg(long, default_value = "keyword")]
        mode: String,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Show a full document and its task history.
    Get {
        /// Document UUID.
        id: String,

        /// Write the stored original media to this path.
        #[arg(long)]
        media_out: Option<PathBuf>,
    },

    /// Chat over your documents with streamed, grounded replies.
    ///
    /// Each turn retrieves your most similar documents and answers from
    /// them. `/new` starts a fresh conversation, `/quit` exits.
    Chat,

    /// Run an AI task against a stored document.
    ///
    /// Sends your prompt together with the document's extraction to the
    /// model and appends the result to the document's task history.
    Task {
        /// Document UUID.
        id: String,

        /// Free-form instruction, e.g. "translate the summary to French".
        prompt: String,
    },

    /// Show vault statistics for your access code.
    Stats,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: clap_complete::Shell,
    },
}

/// Credential management subcommands.
#[derive(Subcommand)]
enum CredentialAction {
    /// Provision a new access code.
    ///
    /// Codes are provisioned out-of-band by whoever operates the vault;
    /// there is no self-service signup.
    Add {
        /// The access code to add.
        secret: String,
    },
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    // Completions need no config file.
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "rcl", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Credential {
            action: CredentialAction::Add { secret },
        } => {
            let store = open_store(&cfg).await?;
            if store.add_credential(&secret).await? {
                println!("Access code added.");
            } else {
                println!("Access code already exists.");
            }
        }
        Commands::Capture {
            path,
            category,
            yes,
        } => {
            let store = open_store(&cfg).await?;
            let session = authenticate(&store, &cli.code).await?;
            let model = OpenAiModel::new(&cfg.model, &cfg.embedding)?;
            ingest::run_capture(&cfg, &store, &model, &session, &path, &category, yes).await?;
        }
        Commands::List => {
            let store = open_store(&cfg).await?;
            let session = authenticate(&store, &cli.code).await?;
            search::run_list(&store, &session).await?;
        }
        Commands::Search { query, mode, limit } => {
            let store = open_store(&cfg).await?;
            let session = authenticate(&store, &cli.code).await?;
            // Keyword search and listing work without any model service.
            let model = if mode == "vector" && !query.trim().is_empty() {
                Some(OpenAiModel::new(&cfg.model, &cfg.embedding)?)
            } else {
                None
            };
            search::run_search(
                &cfg,
                &store,
                model.as_ref().map(|m| m as &dyn ModelService),
                &session,
                &query,
                &mode,
                limit,
            )
            .await?;
        }
        Commands::Get { id, media_out } => {
            let store = open_store(&cfg).await?;
            let session = authenticate(&store, &cli.code).await?;
            get::run_get(&store, &session, &id, media_out.as_deref()).await?;
        }
        Commands::Chat => {
            let store = open_store(&cfg).await?;
            let session = authenticate(&store, &cli.code).await?;
            let model = OpenAiModel::new(&cfg.model, &cfg.embedding)?;
            chat::run_chat(&cfg, &store, &model, &session).await?;
        }
        Commands::Task { id, prompt } => {
            let store = open_store(&cfg).await?;
            let session = authenticate(&store, &cli.code).await?;
            let model = OpenAiModel::new(&cfg.model, &cfg.embedding)?;
            task::run_task(&store, &model, &session, &id, &prompt).await?;
        }
        Commands::Stats => {
            let store = open_store(&cfg).await?;
            let session = authenticate(&store, &cli.code).await?;
            stats::run_stats(store.pool(), &session).await?;
        }
        Commands::Completions { .. } => unreachable!(),
    }

    Ok(())
}

async fn open_store(cfg: &Config) -> anyhow::Result<SqliteStore> {
    let pool = db::connect(cfg).await?;
    Ok(SqliteStore::new(pool))
}

async fn authenticate(store: &SqliteStore, code: &Option<String>) -> anyhow::Result<auth::Session> {
    auth::authenticate(store, code.as_deref().unwrap_or("")).await
}
