//! # Recall
//!
//! **Capture real-life artifacts and turn them into searchable documents.**
//!
//! Recall takes a photo, an uploaded file, or a voice recording, sends it
//! to an external model API for transcription/classification into JSON,
//! stores the result with a vector embedding in SQLite, and retrieves it
//! later via keyword search, vector similarity search, or a
//! retrieval-augmented chat over the stored documents.
//!
//! ## Data Flow
//!
//! 1. A session authenticates with an access code ([`auth`]); the code is
//!    the owner key on everything it stores.
//! 2. The **ingestion pipeline** ([`ingest`]) previews an extraction from
//!    the model service and, only after explicit confirmation, embeds and
//!    persists it as one document.
//! 3. The **retrieval engine** (`recall_core::retrieval`) serves keyword
//!    (FTS5/BM25) and vector (cosine) search, always scoped to the owner
//!    inside the query.
//! 4. The **conversational assistant** ([`chat`]) retrieves top-k similar
//!    documents per turn and streams a grounded reply.
//! 5. The **task runner** ([`task`]) re-runs arbitrary prompts against a
//!    stored document and appends the results to its history.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | SQLite connection pool with WAL mode |
//! | [`migrate`] | Database schema migrations (idempotent) |
//! | [`sqlite_store`] | SQLite implementation of the core `Store` trait |
//! | [`auth`] | Access-code authentication and the session object |
//! | [`model`] | Model service trait, OpenAI-compatible backend, mock |
//! | [`ingest`] | Capture → preview → confirm → embed → persist |
//! | [`search`] | Keyword/vector search and listing CLI |
//! | [`chat`] | Retrieval-augmented streaming chat assistant |
//! | [`task`] | Per-document AI task runner (append-only history) |
//! | [`get`] | Document retrieval by UUID, media export |
//! | [`stats`] | Per-owner vault statistics |

pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod get;
pub mod ingest;
pub mod migrate;
pub mod model;
pub mod search;
pub mod sqlite_store;
pub mod stats;
pub mod task;

pub use recall_core::{extraction, models, retrieval, store};
