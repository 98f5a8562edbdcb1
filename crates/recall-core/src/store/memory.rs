//! In-memory [`Store`] implementation for tests.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.
//! Vector search is brute-force cosine similarity over all stored
//! embeddings; keyword search is naive term matching over the serialized
//! extraction.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{Credential, Document, TaskRecord};

use super::{DocumentHit, Store};

/// In-memory store used by unit tests across the workspace.
pub struct InMemoryStore {
    credentials: RwLock<HashMap<String, Credential>>,
    docs: RwLock<Vec<Document>>,
    tasks: RwLock<HashMap<String, Vec<TaskRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            credentials: RwLock::new(HashMap::new()),
            docs: RwLock::new(Vec::new()),
            tasks: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn to_hit(doc: &Document, score: f64) -> DocumentHit {
    DocumentHit {
        id: doc.id.clone(),
        name: doc.extraction.name.clone(),
        kind_user: doc.extraction.kind.user.clone(),
        kind_ai: doc.extraction.kind.ai_classified.clone(),
        summary: doc.extraction.summary.clone(),
        extraction_json: doc.extraction.to_json(),
        score,
        created_at: doc.created_at,
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn find_credential(&self, secret: &str) -> Result<Option<Credential>> {
        Ok(self.credentials.read().unwrap().get(secret).cloned())
    }

    async fn add_credential(&self, secret: &str) -> Result<bool> {
        let mut creds = self.credentials.write().unwrap();
        if creds.contains_key(secret) {
            return Ok(false);
        }
        creds.insert(
            secret.to_string(),
            Credential {
                secret: secret.to_string(),
                created_at: chrono::Utc::now().timestamp(),
            },
        );
        Ok(true)
    }

    async fn insert_document(&self, doc: &Document) -> Result<String> {
        self.docs.write().unwrap().push(doc.clone());
        Ok(doc.id.clone())
    }

    async fn get_document(&self, owner: &str, id: &str) -> Result<Option<Document>> {
        let docs = self.docs.read().unwrap();
        Ok(docs
            .iter()
            .find(|d| d.id == id && d.owner == owner)
            .cloned())
    }

    async fn list_documents(&self, owner: &str) -> Result<Vec<DocumentHit>> {
        let docs = self.docs.read().unwrap();
        // Insertion order, reversed: newest first.
        Ok(docs
            .iter()
            .rev()
            .filter(|d| d.owner == owner)
            .map(|d| to_hit(d, 0.0))
            .collect())
    }

    async fn keyword_search(
        &self,
        owner: &str,
        query: &str,
        limit: i64,
    ) -> Result<Vec<DocumentHit>> {
        let query_lower = query.to_lowercase();
        let terms: Vec<&str> = query_lower.split_whitespace().collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let docs = self.docs.read().unwrap();
        let mut hits: Vec<DocumentHit> = docs
            .iter()
            .filter(|d| d.owner == owner)
            .filter_map(|d| {
                let text = d.extraction.to_json().to_lowercase();
                let matches = terms.iter().filter(|t| text.contains(*t)).count();
                if matches > 0 {
                    Some(to_hit(d, matches as f64))
                } else {
                    None
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit as usize);
        Ok(hits)
    }

    async fn vector_search(
        &self,
        owner: &str,
        query_vec: &[f32],
        limit: i64,
    ) -> Result<Vec<DocumentHit>> {
        let docs = self.docs.read().unwrap();
        let mut hits: Vec<DocumentHit> = docs
            .iter()
            .filter(|d| d.owner == owner && !d.embedding.is_empty())
            .map(|d| {
                let sim = cosine_similarity(query_vec, &d.embedding) as f64;
                to_hit(d, sim)
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit as usize);
        Ok(hits)
    }

    async fn find_by_content_hash(&self, owner: &str, hash: &str) -> Result<Option<String>> {
        let docs = self.docs.read().unwrap();
        Ok(docs
            .iter()
            .find(|d| d.owner == owner && d.content_hash == hash)
            .map(|d| d.id.clone()))
    }

    async fn append_task(
        &self,
        owner: &str,
        document_id: &str,
        prompt: &str,
        result: &str,
    ) -> Result<TaskRecord> {
        {
            let docs = self.docs.read().unwrap();
            if !docs.iter().any(|d| d.id == document_id && d.owner == owner) {
                bail!("document not found: {}", document_id);
            }
        }

        let mut tasks = self.tasks.write().unwrap();
        let history = tasks.entry(document_id.to_string()).or_default();
        let record = TaskRecord {
            seq: history.len() as i64,
            prompt: prompt.to_string(),
            result: result.to_string(),
            created_at: chrono::Utc::now().timestamp(),
        };
        history.push(record.clone());
        Ok(record)
    }

    async fn list_tasks(&self, owner: &str, document_id: &str) -> Result<Vec<TaskRecord>> {
        {
            let docs = self.docs.read().unwrap();
            if !docs.iter().any(|d| d.id == document_id && d.owner == owner) {
                return Ok(Vec::new());
            }
        }
        let tasks = self.tasks.read().unwrap();
        Ok(tasks.get(document_id).cloned().unwrap_or_default())
    }
}
