//! Retrieval-augmented conversational assistant.
//!
//! An [`Assistant`] owns the per-session message log. Each turn retrieves
//! the most similar documents by vector search, assembles their
//! extractions as context, and streams a grounded reply. The log is
//! strictly turn-ordered: the user message is recorded first, and the
//! assistant message is appended only after its stream completes cleanly,
//! so a failed turn leaves the log ending with the user message.

use std::io::Write;

use anyhow::Result;
use futures::StreamExt;

use recall_core::models::ChatMessage;
use recall_core::store::Store;

use crate::auth::Session;
use crate::config::Config;
use crate::model::ModelService;

/// Grounding instruction sent as the system message on every turn.
const GROUNDING_PROMPT: &str = "You answer questions about the user's captured documents. \
    Answer using only the provided context documents, and be concise. If the context does \
    not contain the answer, say so plainly instead of guessing.";

/// A chat session over the caller's document vault.
pub struct Assistant<'a> {
    store: &'a dyn Store,
    model: &'a dyn ModelService,
    session: &'a Session,
    top_k: i64,
    pool_factor: i64,
    history: Vec<ChatMessage>,
}

impl<'a> Assistant<'a> {
    pub fn new(
        config: &Config,
        store: &'a dyn Store,
        model: &'a dyn ModelService,
        session: &'a Session,
    ) -> Self {
        Self {
            store,
            model,
            session,
            top_k: config.retrieval.chat_top_k,
            pool_factor: config.retrieval.vector_pool_factor,
            history: Vec::new(),
        }
    }

    /// The full message log, in turn order.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Forget the conversation ("New Chat").
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Run one turn: record the user message, retrieve context, stream the
    /// reply through `on_chunk`, and record the completed assistant
    /// message. Returns the full reply text.
    ///
    /// On any failure after the user message is recorded — embedding,
    /// retrieval, request, or a broken stream — no assistant message is
    /// appended and the error propagates.
    pub async fn send_turn(
        &mut self,
        query: &str,
        on_chunk: &mut dyn FnMut(&str),
    ) -> Result<String> {
        self.history.push(ChatMessage::user(query));

        let context = self.retrieve_context(query).await?;

        // Prior history plus a final user turn carrying query and context.
        let mut messages: Vec<ChatMessage> =
            self.history[..self.history.len() - 1].to_vec();
        messages.push(ChatMessage::user(format!(
            "Context documents:\n{}\n\nQuestion: {}",
            context, query
        )));

        let mut stream = self.model.chat_stream(GROUNDING_PROMPT, &messages).await?;

        let mut reply = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            on_chunk(&chunk);
            reply.push_str(&chunk);
        }

        self.history.push(ChatMessage::assistant(reply.clone()));
        Ok(reply)
    }

    /// Top-k vector retrieval for the raw query; each hit contributes its
    /// serialized extraction to the context blob.
    async fn retrieve_context(&self, query: &str) -> Result<String> {
        let query_vec = self.model.embed(query).await?;
        let pool = self.top_k.saturating_mul(self.pool_factor);
        let mut hits = self
            .store
            .vector_search(self.session.owner(), &query_vec, pool)
            .await?;
        hits.truncate(self.top_k as usize);

        if hits.is_empty() {
            return Ok("(no matching documents)".to_string());
        }

        Ok(hits
            .iter()
            .map(|h| h.extraction_json.clone())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

/// Interactive chat REPL. `/new` clears the history, `/quit` exits.
pub async fn run_chat(
    config: &Config,
    store: &dyn Store,
    model: &dyn ModelService,
    session: &Session,
) -> Result<()> {
    let mut assistant = Assistant::new(config, store, model, session);

    println!("Chatting over your documents. /new starts a fresh chat, /quit exits.");

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if std::io::stdin().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/new" => {
                assistant.reset();
                println!("Started a new chat.");
                continue;
            }
            _ => {}
        }

        let result = assistant
            .send_turn(line, &mut |chunk| {
                print!("{}", chunk);
                let _ = std::io::stdout().flush();
            })
            .await;

        match result {
            Ok(_) => println!(),
            // The turn failed; the question stays in the log, no answer
            // was recorded, and the user can simply ask again.
            Err(e) => eprintln!("error: {:#}", e),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::authenticate;
    use crate::model::mock::{ChatScript, MockModel};
    use recall_core::models::{Classification, Document, Extraction, Role};
    use recall_core::store::memory::InMemoryStore;

    fn make_doc(owner: &str, name: &str, embedding: Vec<f32>) -> Document {
        Document::new(
            owner,
            Extraction {
                name: name.to_string(),
                kind: Classification {
                    user: "Recipe".to_string(),
                    ai_classified: "Recipe".to_string(),
                },
                summary: format!("summary of {}", name),
                extra: serde_json::Map::new(),
            },
            embedding,
            "test-embed",
            None,
            None,
            format!("hash-{}", name),
        )
    }

    async fn setup(store: &InMemoryStore) -> Session {
        store.add_credential("abc").await.unwrap();
        authenticate(store, "abc").await.unwrap()
    }

    #[tokio::test]
    async fn test_turns_keep_strict_order() {
        let store = InMemoryStore::new();
        let session = setup(&store).await;
        let model = MockModel::new();
        model.push_chat_script(ChatScript::text("First answer."));
        model.push_chat_script(ChatScript::text("Second answer."));

        let config = Config::minimal("/tmp/unused.sqlite");
        let mut assistant = Assistant::new(&config, &store, &model, &session);

        assistant.send_turn("first question", &mut |_| {}).await.unwrap();
        assistant.send_turn("second question", &mut |_| {}).await.unwrap();

        let log = assistant.history();
        assert_eq!(log.len(), 4);
        assert_eq!(log[0].role, Role::User);
        assert_eq!(log[0].content, "first question");
        assert_eq!(log[1].role, Role::Assistant);
        assert_eq!(log[1].content, "First answer.");
        assert_eq!(log[2].content, "second question");
        assert_eq!(log[3].role, Role::Assistant);
        assert_eq!(log[3].content, "Second answer.");
    }

    #[tokio::test]
    async fn test_chunks_arrive_in_order_and_concatenate() {
        let store = InMemoryStore::new();
        let session = setup(&store).await;
        let model = MockModel::new();
        model.push_chat_script(ChatScript::text("a streamed grounded reply"));

        let config = Config::minimal("/tmp/unused.sqlite");
        let mut assistant = Assistant::new(&config, &store, &model, &session);

        let mut seen = Vec::new();
        let reply = assistant
            .send_turn("question", &mut |chunk| seen.push(chunk.to_string()))
            .await
            .unwrap();

        assert!(seen.len() > 1);
        assert_eq!(seen.concat(), reply);
        assert_eq!(reply, "a streamed grounded reply");
    }

    #[tokio::test]
    async fn test_failed_retrieval_leaves_user_message_only() {
        let store = InMemoryStore::new();
        let session = setup(&store).await;
        let model = MockModel::new();
        model.fail_embeddings();

        let config = Config::minimal("/tmp/unused.sqlite");
        let mut assistant = Assistant::new(&config, &store, &model, &session);

        assert!(assistant.send_turn("doomed question", &mut |_| {}).await.is_err());

        let log = assistant.history();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].role, Role::User);
        assert_eq!(log[0].content, "doomed question");
    }

    #[tokio::test]
    async fn test_broken_stream_appends_no_assistant_message() {
        let store = InMemoryStore::new();
        let session = setup(&store).await;
        let model = MockModel::new();
        model.push_chat_script(ChatScript {
            chunks: vec!["partial ".to_string()],
            fail_after: true,
        });

        let config = Config::minimal("/tmp/unused.sqlite");
        let mut assistant = Assistant::new(&config, &store, &model, &session);

        assert!(assistant.send_turn("question", &mut |_| {}).await.is_err());
        assert_eq!(assistant.history().len(), 1);
    }

    #[tokio::test]
    async fn test_reset_clears_history() {
        let store = InMemoryStore::new();
        let session = setup(&store).await;
        let model = MockModel::new();
        model.push_chat_script(ChatScript::text("answer"));

        let config = Config::minimal("/tmp/unused.sqlite");
        let mut assistant = Assistant::new(&config, &store, &model, &session);
        assistant.send_turn("question", &mut |_| {}).await.unwrap();
        assert_eq!(assistant.history().len(), 2);

        assistant.reset();
        assert!(assistant.history().is_empty());
    }

    #[tokio::test]
    async fn test_context_drawn_from_own_documents_only() {
        let store = InMemoryStore::new();
        let session = setup(&store).await;
        store
            .insert_document(&make_doc("abc", "Pasta", vec![1.0; 8]))
            .await
            .unwrap();
        store
            .insert_document(&make_doc("xyz", "ForeignSecret", vec![1.0; 8]))
            .await
            .unwrap();

        let model = MockModel::new();
        let config = Config::minimal("/tmp/unused.sqlite");
        let assistant = Assistant::new(&config, &store, &model, &session);

        let context = assistant.retrieve_context("anything").await.unwrap();
        assert!(context.contains("Pasta"));
        assert!(!context.contains("ForeignSecret"));
    }
}
