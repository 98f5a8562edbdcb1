//! Storage abstraction for Recall.
//!
//! The [`Store`] trait defines every storage operation the capture,
//! retrieval, chat, and task modules need, enabling pluggable backends
//! (SQLite, in-memory).
//!
//! Tenant isolation is structural: every read and write that touches
//! documents takes the owning credential and applies it inside the query
//! itself, never as a post-filter in the caller.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{Credential, Document, TaskRecord};

/// A document as returned from search and listing.
///
/// Carries the full structured extraction (serialized) for display and for
/// chat-context assembly, but never the embedding vector or the media
/// payload — those stay in the store.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentHit {
    pub id: String,
    pub name: String,
    pub kind_user: String,
    pub kind_ai: String,
    pub summary: String,
    pub extraction_json: String,
    /// BM25-derived score (keyword), cosine similarity (vector), or `0.0`
    /// for plain listing.
    pub score: f64,
    pub created_at: i64,
}

/// Abstract storage backend for Recall.
///
/// All operations are async (via `async-trait`). In-memory implementations
/// return immediately-ready futures.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`find_credential`](Store::find_credential) | Look up an access code |
/// | [`add_credential`](Store::add_credential) | Provision an access code |
/// | [`insert_document`](Store::insert_document) | Persist one committed capture |
/// | [`get_document`](Store::get_document) | Fetch a full owned document |
/// | [`list_documents`](Store::list_documents) | All owned documents, newest first |
/// | [`keyword_search`](Store::keyword_search) | Owner-scoped full-text search |
/// | [`vector_search`](Store::vector_search) | Owner-scoped similarity search |
/// | [`find_by_content_hash`](Store::find_by_content_hash) | Duplicate-capture lookup |
/// | [`append_task`](Store::append_task) | Append one task record atomically |
/// | [`list_tasks`](Store::list_tasks) | Task history, oldest first |
#[async_trait]
pub trait Store: Send + Sync {
    /// Look up an access code. `None` means authentication fails.
    async fn find_credential(&self, secret: &str) -> Result<Option<Credential>>;

    /// Provision an access code. Returns `false` if it already existed.
    async fn add_credential(&self, secret: &str) -> Result<bool>;

    /// Persist a committed capture as one atomic insert.
    ///
    /// Returns the document ID.
    async fn insert_document(&self, doc: &Document) -> Result<String>;

    /// Fetch a full document by ID, scoped to its owner.
    ///
    /// Returns `None` for unknown IDs and for documents owned by a
    /// different credential — the two cases are indistinguishable to the
    /// caller.
    async fn get_document(&self, owner: &str, id: &str) -> Result<Option<Document>>;

    /// All documents owned by `owner`, most recently inserted first.
    async fn list_documents(&self, owner: &str) -> Result<Vec<DocumentHit>>;

    /// Full-text search across the indexed extraction text, restricted to
    /// `owner` inside the query. Ranking is delegated to the index.
    async fn keyword_search(&self, owner: &str, query: &str, limit: i64)
        -> Result<Vec<DocumentHit>>;

    /// Similarity search over stored embeddings, restricted to `owner`
    /// inside the query, ordered by decreasing cosine similarity.
    ///
    /// `limit` is the candidate-pool size; callers oversample and truncate.
    async fn vector_search(
        &self,
        owner: &str,
        query_vec: &[f32],
        limit: i64,
    ) -> Result<Vec<DocumentHit>>;

    /// ID of an owned document with the given media content hash, if any.
    async fn find_by_content_hash(&self, owner: &str, hash: &str) -> Result<Option<String>>;

    /// Append one task record to an owned document's history.
    ///
    /// The append must be atomic with respect to concurrent appends on the
    /// same document: records are only ever added at the end, never
    /// replaced. Fails with a not-found error for unknown or foreign IDs.
    async fn append_task(
        &self,
        owner: &str,
        document_id: &str,
        prompt: &str,
        result: &str,
    ) -> Result<TaskRecord>;

    /// Task history for an owned document, oldest first.
    async fn list_tasks(&self, owner: &str, document_id: &str) -> Result<Vec<TaskRecord>>;
}
