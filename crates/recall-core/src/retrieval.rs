//! Owner-scoped retrieval over a [`Store`] backend.
//!
//! The retrieval engine operates entirely through the [`Store`] trait and
//! has no database or configuration dependencies. The calling application
//! is responsible for embedding the query text (vector mode) and for
//! constructing [`RetrievalParams`].
//!
//! # Modes
//!
//! | Mode | Engine | Requires query embedding |
//! |------|--------|--------------------------|
//! | `keyword` | Full-text index (BM25) | No |
//! | `vector` | Cosine similarity over embeddings | Yes |
//!
//! An empty query bypasses both modes and lists every owned document,
//! most recently inserted first.

use anyhow::{bail, Result};

use crate::store::{DocumentHit, Store};

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone)]
pub struct RetrievalParams {
    /// Maximum results to return.
    pub final_limit: i64,
    /// Vector mode fetches `final_limit × vector_pool_factor` candidates
    /// before truncating, to improve recall under approximate search.
    pub vector_pool_factor: i64,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            final_limit: 12,
            vector_pool_factor: 8,
        }
    }
}

/// Run an owner-scoped search against a [`Store`] backend.
///
/// All frontends delegate here. The owner filter is applied by the store
/// inside each query; results never include embedding vectors or media
/// payloads.
pub async fn search<S: Store + ?Sized>(
    store: &S,
    owner: &str,
    query: &str,
    mode: &str,
    query_vec: Option<&[f32]>,
    params: &RetrievalParams,
) -> Result<Vec<DocumentHit>> {
    if query.trim().is_empty() {
        return store.list_documents(owner).await;
    }

    match mode {
        "keyword" => store.keyword_search(owner, query, params.final_limit).await,
        "vector" => {
            let Some(qv) = query_vec else {
                bail!("query_vec is required for vector mode");
            };
            let pool = params.final_limit.saturating_mul(params.vector_pool_factor);
            let mut hits = store.vector_search(owner, qv, pool).await?;
            hits.truncate(params.final_limit as usize);
            Ok(hits)
        }
        other => bail!("Unknown search mode: {}. Use keyword or vector.", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classification, Document, Extraction};
    use crate::store::memory::InMemoryStore;

    fn make_doc(id: &str, owner: &str, name: &str, embedding: Vec<f32>, created_at: i64) -> Document {
        Document {
            id: id.to_string(),
            owner: owner.to_string(),
            media_b64: None,
            media_mime: None,
            content_hash: format!("hash-{}", id),
            extraction: Extraction {
                name: name.to_string(),
                kind: Classification {
                    user: "Other".to_string(),
                    ai_classified: "Other".to_string(),
                },
                summary: format!("summary of {}", name),
                extra: serde_json::Map::new(),
            },
            embedding,
            embedding_model: "test-model".to_string(),
            created_at,
        }
    }

    async fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .insert_document(&make_doc("d1", "abc", "Pasta", vec![1.0, 0.0], 10))
            .await
            .unwrap();
        store
            .insert_document(&make_doc("d2", "abc", "Soup", vec![0.0, 1.0], 20))
            .await
            .unwrap();
        store
            .insert_document(&make_doc("d3", "xyz", "Pasta", vec![1.0, 0.0], 30))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_empty_query_lists_owned_newest_first() {
        let store = seeded_store().await;
        let hits = search(&store, "abc", "", "keyword", None, &RetrievalParams::default())
            .await
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["d2", "d1"]);
        assert!(hits.iter().all(|h| h.score == 0.0));
    }

    #[tokio::test]
    async fn test_keyword_search_never_crosses_owners() {
        let store = seeded_store().await;
        let hits = search(
            &store,
            "abc",
            "pasta",
            "keyword",
            None,
            &RetrievalParams::default(),
        )
        .await
        .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "d1");

        // Exact-matching text in a foreign document stays invisible.
        let foreign = search(
            &store,
            "abc",
            "summary of Pasta",
            "keyword",
            None,
            &RetrievalParams::default(),
        )
        .await
        .unwrap();
        assert!(foreign.iter().all(|h| h.id != "d3"));
    }

    #[tokio::test]
    async fn test_vector_search_bounded_and_ordered() {
        let store = seeded_store().await;
        let params = RetrievalParams {
            final_limit: 1,
            vector_pool_factor: 8,
        };
        let hits = search(&store, "abc", "noodles", "vector", Some(&[1.0, 0.1]), &params)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "d1");

        let params = RetrievalParams {
            final_limit: 10,
            vector_pool_factor: 8,
        };
        let hits = search(&store, "abc", "noodles", "vector", Some(&[1.0, 0.1]), &params)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);
        assert!(hits.iter().all(|h| h.id != "d3"));
    }

    #[tokio::test]
    async fn test_vector_mode_requires_embedding() {
        let store = seeded_store().await;
        let err = search(
            &store,
            "abc",
            "noodles",
            "vector",
            None,
            &RetrievalParams::default(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("query_vec"));
    }

    #[tokio::test]
    async fn test_unknown_mode_rejected() {
        let store = seeded_store().await;
        let err = search(
            &store,
            "abc",
            "pasta",
            "hybrid",
            None,
            &RetrievalParams::default(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Unknown search mode"));
    }

    #[tokio::test]
    async fn test_hits_exclude_embeddings() {
        let store = seeded_store().await;
        let hits = search(&store, "abc", "", "keyword", None, &RetrievalParams::default())
            .await
            .unwrap();
        for hit in hits {
            assert!(!hit.extraction_json.contains("embedding"));
        }
    }
}
