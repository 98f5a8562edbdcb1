//! Per-document AI task runner.
//!
//! Re-invokes the model service with an arbitrary user instruction against
//! a stored document's extraction and appends the result to the document's
//! append-only task history.

use anyhow::{bail, Result};

use recall_core::models::TaskRecord;
use recall_core::store::Store;

use crate::auth::Session;
use crate::model::ModelService;

/// System instruction for task runs. Results are meant to be used as-is.
const TASK_SYSTEM_PROMPT: &str = "You run instructions against a single JSON document. \
    Produce directly copy-pasteable plain output with no explanation, preamble, or \
    commentary.";

/// Run one AI task against an owned document and append the result.
///
/// Fails with a not-found error for unknown or foreign document IDs; the
/// history is only ever appended to, never rewritten.
pub async fn run_task_once(
    store: &dyn Store,
    model: &dyn ModelService,
    session: &Session,
    document_id: &str,
    prompt: &str,
) -> Result<TaskRecord> {
    let Some(doc) = store.get_document(session.owner(), document_id).await? else {
        bail!("document not found: {}", document_id);
    };

    let user = format!("{}\n\nDocument:\n{}", prompt, doc.extraction.to_json());
    let result = model.run_task(TASK_SYSTEM_PROMPT, &user).await?;

    store
        .append_task(session.owner(), document_id, prompt, &result)
        .await
}

/// CLI entry point: run the task, then print the full history oldest first.
pub async fn run_task(
    store: &dyn Store,
    model: &dyn ModelService,
    session: &Session,
    document_id: &str,
    prompt: &str,
) -> Result<()> {
    let record = run_task_once(store, model, session, document_id, prompt).await?;

    println!("--- Result ---");
    println!("{}", record.result);
    println!();

    let history = store.list_tasks(session.owner(), document_id).await?;
    println!("--- Task history ({}) ---", history.len());
    for task in &history {
        println!("[{}] {}", task.seq, task.prompt);
        println!("{}", task.result);
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::authenticate;
    use crate::model::mock::MockModel;
    use recall_core::models::{Classification, Document, Extraction};
    use recall_core::store::memory::InMemoryStore;

    fn make_doc(owner: &str) -> Document {
        Document::new(
            owner,
            Extraction {
                name: "Pasta".to_string(),
                kind: Classification {
                    user: "Recipe".to_string(),
                    ai_classified: "Recipe".to_string(),
                },
                summary: "a pasta recipe".to_string(),
                extra: serde_json::Map::new(),
            },
            vec![1.0, 0.0],
            "test-embed",
            None,
            None,
            "hash".to_string(),
        )
    }

    async fn setup() -> (InMemoryStore, Session, String) {
        let store = InMemoryStore::new();
        store.add_credential("abc").await.unwrap();
        let session = authenticate(&store, "abc").await.unwrap();
        let id = store.insert_document(&make_doc("abc")).await.unwrap();
        (store, session, id)
    }

    #[tokio::test]
    async fn test_two_runs_append_in_call_order() {
        let (store, session, id) = setup().await;
        let model = MockModel::new();
        model.push_task_reply("recette de pâtes");
        model.push_task_reply("flour, eggs, water");

        let first = run_task_once(&store, &model, &session, &id, "translate summary to French")
            .await
            .unwrap();
        let second = run_task_once(&store, &model, &session, &id, "list the ingredients")
            .await
            .unwrap();

        assert_eq!(first.seq, 0);
        assert_eq!(second.seq, 1);

        let history = store.list_tasks("abc", &id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].result, "recette de pâtes");
        assert_eq!(history[1].result, "flour, eggs, water");
    }

    #[tokio::test]
    async fn test_task_sends_document_json() {
        let (store, session, id) = setup().await;
        let model = MockModel::new();
        model.push_task_reply("ok");

        run_task_once(&store, &model, &session, &id, "summarize").await.unwrap();

        let requests = model.requests();
        assert!(requests.iter().any(|r| r.starts_with("task:summarize")));
    }

    #[tokio::test]
    async fn test_unknown_document_is_not_found() {
        let (store, session, _id) = setup().await;
        let model = MockModel::new();

        let err = run_task_once(&store, &model, &session, "missing", "summarize")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("document not found"));
    }

    #[tokio::test]
    async fn test_foreign_document_is_not_found() {
        let (store, _session, id) = setup().await;
        store.add_credential("xyz").await.unwrap();
        let other = authenticate(&store, "xyz").await.unwrap();
        let model = MockModel::new();
        model.push_task_reply("should never be stored");

        let err = run_task_once(&store, &model, &other, &id, "summarize")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("document not found"));
        assert!(store.list_tasks("abc", &id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_appends_nothing() {
        let (store, session, id) = setup().await;
        let model = MockModel::new(); // no scripted replies => task call fails

        assert!(run_task_once(&store, &model, &session, &id, "summarize")
            .await
            .is_err());
        assert!(store.list_tasks("abc", &id).await.unwrap().is_empty());
    }
}
