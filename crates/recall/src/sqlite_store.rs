//! SQLite-backed [`Store`] implementation.
//!
//! Maps each [`Store`] operation to SQL against the schema created by
//! [`crate::migrate`]. The owning credential is bound into every document
//! query — isolation is enforced by the database, not by callers.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use recall_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use recall_core::models::{Credential, Document, TaskRecord};
use recall_core::store::{DocumentHit, Store};

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_hit(row: &sqlx::sqlite::SqliteRow, score: f64) -> DocumentHit {
    DocumentHit {
        id: row.get("id"),
        name: row.get("name"),
        kind_user: row.get("kind_user"),
        kind_ai: row.get("kind_ai"),
        summary: row.get("summary"),
        extraction_json: row.get("extraction_json"),
        score,
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn find_credential(&self, secret: &str) -> Result<Option<Credential>> {
        let row = sqlx::query("SELECT secret, created_at FROM credentials WHERE secret = ?")
            .bind(secret)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| Credential {
            secret: r.get("secret"),
            created_at: r.get("created_at"),
        }))
    }

    async fn add_credential(&self, secret: &str) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query("INSERT OR IGNORE INTO credentials (secret, created_at) VALUES (?, ?)")
            .bind(secret)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_document(&self, doc: &Document) -> Result<String> {
        let extraction_json = doc.extraction.to_json();
        let embedding_blob = vec_to_blob(&doc.embedding);

        // Document row and its FTS entry land in one transaction: a capture
        // is either fully committed or absent.
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO documents (id, owner, media_b64, media_mime, content_hash,
                                   extraction_json, name, kind_user, kind_ai, summary,
                                   embedding, embedding_model, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.owner)
        .bind(&doc.media_b64)
        .bind(&doc.media_mime)
        .bind(&doc.content_hash)
        .bind(&extraction_json)
        .bind(&doc.extraction.name)
        .bind(&doc.extraction.kind.user)
        .bind(&doc.extraction.kind.ai_classified)
        .bind(&doc.extraction.summary)
        .bind(&embedding_blob)
        .bind(&doc.embedding_model)
        .bind(doc.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO documents_fts (document_id, owner, content) VALUES (?, ?, ?)")
            .bind(&doc.id)
            .bind(&doc.owner)
            .bind(&extraction_json)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(doc.id.clone())
    }

    async fn get_document(&self, owner: &str, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            r#"
            SELECT id, owner, media_b64, media_mime, content_hash, extraction_json,
                   embedding, embedding_model, created_at
            FROM documents
            WHERE id = ? AND owner = ?
            "#,
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let extraction_json: String = row.get("extraction_json");
        let extraction = serde_json::from_str(&extraction_json)?;
        let blob: Vec<u8> = row.get("embedding");

        Ok(Some(Document {
            id: row.get("id"),
            owner: row.get("owner"),
            media_b64: row.get("media_b64"),
            media_mime: row.get("media_mime"),
            content_hash: row.get("content_hash"),
            extraction,
            embedding: blob_to_vec(&blob),
            embedding_model: row.get("embedding_model"),
            created_at: row.get("created_at"),
        }))
    }

    async fn list_documents(&self, owner: &str) -> Result<Vec<DocumentHit>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, kind_user, kind_ai, summary, extraction_json, created_at
            FROM documents
            WHERE owner = ?
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|r| row_to_hit(r, 0.0)).collect())
    }

    async fn keyword_search(
        &self,
        owner: &str,
        query: &str,
        limit: i64,
    ) -> Result<Vec<DocumentHit>> {
        let rows = sqlx::query(
            r#"
            SELECT d.id, d.name, d.kind_user, d.kind_ai, d.summary, d.extraction_json,
                   d.created_at, rank
            FROM documents_fts
            JOIN documents d ON d.id = documents_fts.document_id
            WHERE documents_fts MATCH ? AND documents_fts.owner = ?
            ORDER BY rank
            LIMIT ?
            "#,
        )
        .bind(query)
        .bind(owner)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| {
                let rank: f64 = r.get("rank");
                // BM25 rank is ascending-better; negate so higher = better.
                row_to_hit(r, -rank)
            })
            .collect())
    }

    async fn vector_search(
        &self,
        owner: &str,
        query_vec: &[f32],
        limit: i64,
    ) -> Result<Vec<DocumentHit>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, kind_user, kind_ai, summary, extraction_json,
                   embedding, created_at
            FROM documents
            WHERE owner = ?
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<DocumentHit> = rows
            .iter()
            .map(|r| {
                let blob: Vec<u8> = r.get("embedding");
                let vec = blob_to_vec(&blob);
                let similarity = cosine_similarity(query_vec, &vec) as f64;
                row_to_hit(r, similarity)
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
        let id: Option<String> = sqlx::query_scalar(
            "SELECT id FROM documents WHERE owner = ? AND content_hash = ? LIMIT 1",
        )
        .bind(owner)
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn append_task(
        &self,
        owner: &str,
        document_id: &str,
        prompt: &str,
        result: &str,
    ) -> Result<TaskRecord> {
        let now = chrono::Utc::now().timestamp();

        // Sequence allocation and insert share one transaction so that
        // concurrent appends to the same document interleave instead of
        // clobbering each other.
        let mut tx = self.pool.begin().await?;

        let owned: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM documents WHERE id = ? AND owner = ?")
                .bind(document_id)
                .bind(owner)
                .fetch_optional(&mut *tx)
                .await?;

        if owned.is_none() {
            bail!("document not found: {}", document_id);
        }

        let seq: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(seq) + 1, 0) FROM document_tasks WHERE document_id = ?",
        )
        .bind(document_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO document_tasks (document_id, seq, prompt, result, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(document_id)
        .bind(seq)
        .bind(prompt)
        .bind(result)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(TaskRecord {
            seq,
            prompt: prompt.to_string(),
            result: result.to_string(),
            created_at: now,
        })
    }

    async fn list_tasks(&self, owner: &str, document_id: &str) -> Result<Vec<TaskRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT t.seq, t.prompt, t.result, t.created_at
            FROM document_tasks t
            JOIN documents d ON d.id = t.document_id
            WHERE t.document_id = ? AND d.owner = ?
            ORDER BY t.seq ASC
            "#,
        )
        .bind(document_id)
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| TaskRecord {
                seq: r.get("seq"),
                prompt: r.get("prompt"),
                result: r.get("result"),
                created_at: r.get("created_at"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::{db, migrate};
    use recall_core::models::{content_hash, Classification, Extraction};

    async fn test_store() -> (tempfile::TempDir, SqliteStore) {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = Config::minimal(tmp.path().join("recall.sqlite"));
        let pool = db::connect(&config).await.unwrap();
        migrate::apply_schema(&pool).await.unwrap();
        (tmp, SqliteStore::new(pool))
    }

    fn make_doc(owner: &str, name: &str, summary: &str, embedding: Vec<f32>) -> Document {
        Document::new(
            owner,
            Extraction {
                name: name.to_string(),
                kind: Classification {
                    user: "Recipe".to_string(),
                    ai_classified: "Recipe".to_string(),
                },
                summary: summary.to_string(),
                extra: serde_json::Map::new(),
            },
            embedding,
            "test-embed",
            Some("aGVsbG8=".to_string()),
            Some("image/jpeg".to_string()),
            content_hash(name.as_bytes()),
        )
    }

    #[tokio::test]
    async fn test_credentials_roundtrip() {
        let (_tmp, store) = test_store().await;

        assert!(store.find_credential("abc").await.unwrap().is_none());
        assert!(store.add_credential("abc").await.unwrap());
        assert!(!store.add_credential("abc").await.unwrap());

        let cred = store.find_credential("abc").await.unwrap().unwrap();
        assert_eq!(cred.secret, "abc");
    }

    #[tokio::test]
    async fn test_insert_and_get_scoped_to_owner() {
        let (_tmp, store) = test_store().await;
        let doc = make_doc("abc", "Pasta", "a pasta recipe", vec![1.0, 0.0]);
        let id = store.insert_document(&doc).await.unwrap();

        let fetched = store.get_document("abc", &id).await.unwrap().unwrap();
        assert_eq!(fetched.extraction.name, "Pasta");
        assert_eq!(fetched.embedding, vec![1.0, 0.0]);
        assert_eq!(fetched.media_mime.as_deref(), Some("image/jpeg"));

        // Foreign credential sees nothing, same as an unknown id.
        assert!(store.get_document("xyz", &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let (_tmp, store) = test_store().await;
        let mut first = make_doc("abc", "First", "one", vec![1.0]);
        first.created_at = 100;
        let mut second = make_doc("abc", "Second", "two", vec![1.0]);
        second.created_at = 200;
        store.insert_document(&first).await.unwrap();
        store.insert_document(&second).await.unwrap();
        store
            .insert_document(&make_doc("xyz", "Foreign", "three", vec![1.0]))
            .await
            .unwrap();

        let hits = store.list_documents("abc").await.unwrap();
        let names: Vec<&str> = hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Second", "First"]);
    }

    #[tokio::test]
    async fn test_keyword_search_filters_owner_in_query() {
        let (_tmp, store) = test_store().await;
        store
            .insert_document(&make_doc("abc", "Pasta", "a pasta recipe", vec![1.0]))
            .await
            .unwrap();
        store
            .insert_document(&make_doc("xyz", "Pasta", "a pasta recipe", vec![1.0]))
            .await
            .unwrap();

        let hits = store.keyword_search("abc", "pasta", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Pasta");

        let foreign = store.keyword_search("nobody", "pasta", 10).await.unwrap();
        assert!(foreign.is_empty());
    }

    #[tokio::test]
    async fn test_vector_search_ranked_and_bounded() {
        let (_tmp, store) = test_store().await;
        store
            .insert_document(&make_doc("abc", "Near", "close match", vec![1.0, 0.0]))
            .await
            .unwrap();
        store
            .insert_document(&make_doc("abc", "Far", "distant match", vec![0.0, 1.0]))
            .await
            .unwrap();
        store
            .insert_document(&make_doc("xyz", "Foreign", "other tenant", vec![1.0, 0.0]))
            .await
            .unwrap();

        let hits = store.vector_search("abc", &[1.0, 0.1], 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].name, "Near");
        assert!(hits[0].score > hits[1].score);

        let bounded = store.vector_search("abc", &[1.0, 0.1], 1).await.unwrap();
        assert_eq!(bounded.len(), 1);
    }

    #[tokio::test]
    async fn test_task_append_is_ordered_and_owner_checked() {
        let (_tmp, store) = test_store().await;
        let doc = make_doc("abc", "Pasta", "a pasta recipe", vec![1.0]);
        let id = store.insert_document(&doc).await.unwrap();

        let first = store
            .append_task("abc", &id, "translate to French", "recette de pâtes")
            .await
            .unwrap();
        let second = store
            .append_task("abc", &id, "list ingredients", "flour, eggs")
            .await
            .unwrap();
        assert_eq!(first.seq, 0);
        assert_eq!(second.seq, 1);

        let history = store.list_tasks("abc", &id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].prompt, "translate to French");
        assert_eq!(history[1].prompt, "list ingredients");

        // Appending through a foreign credential is a not-found error.
        let err = store
            .append_task("xyz", &id, "anything", "anything")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("document not found"));
        assert_eq!(store.list_tasks("abc", &id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_content_hash_lookup() {
        let (_tmp, store) = test_store().await;
        let doc = make_doc("abc", "Pasta", "a pasta recipe", vec![1.0]);
        let hash = doc.content_hash.clone();
        let id = store.insert_document(&doc).await.unwrap();

        assert_eq!(
            store.find_by_content_hash("abc", &hash).await.unwrap(),
            Some(id)
        );
        assert!(store
            .find_by_content_hash("xyz", &hash)
            .await
            .unwrap()
            .is_none());
    }
}
