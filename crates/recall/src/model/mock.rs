//! Scripted [`ModelService`] for deterministic tests.
//!
//! Replies are queued per operation and returned in order; embeddings are
//! derived deterministically from the input text so that identical texts
//! land near each other under cosine similarity.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use futures::StreamExt;

use recall_core::models::ChatMessage;

use super::{ChunkStream, ModelService};

/// One scripted chat turn: the fragments to stream, and whether the stream
/// dies after emitting them.
pub struct ChatScript {
    pub chunks: Vec<String>,
    pub fail_after: bool,
}

impl ChatScript {
    pub fn text(reply: &str) -> Self {
        // Split into word-ish fragments so consumers see real streaming.
        let chunks = reply
            .split_inclusive(' ')
            .map(|s| s.to_string())
            .collect::<Vec<_>>();
        Self {
            chunks,
            fail_after: false,
        }
    }
}

/// Deterministic mock backend used by unit tests across the crate.
#[derive(Default)]
pub struct MockModel {
    describe_replies: Mutex<Vec<String>>,
    transcripts: Mutex<Vec<String>>,
    task_replies: Mutex<Vec<String>>,
    chat_scripts: Mutex<Vec<ChatScript>>,
    embed_fail: AtomicBool,
    request_log: Mutex<Vec<String>>,
}

impl MockModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_describe_reply(&self, reply: impl Into<String>) {
        self.describe_replies.lock().unwrap().push(reply.into());
    }

    pub fn push_transcript(&self, transcript: impl Into<String>) {
        self.transcripts.lock().unwrap().push(transcript.into());
    }

    pub fn push_task_reply(&self, reply: impl Into<String>) {
        self.task_replies.lock().unwrap().push(reply.into());
    }

    pub fn push_chat_script(&self, script: ChatScript) {
        self.chat_scripts.lock().unwrap().push(script);
    }

    /// Make every subsequent `embed` call fail.
    pub fn fail_embeddings(&self) {
        self.embed_fail.store(true, Ordering::SeqCst);
    }

    /// Operations invoked so far, in order (operation name + input prefix).
    pub fn requests(&self) -> Vec<String> {
        self.request_log.lock().unwrap().clone()
    }

    fn log(&self, op: &str, input: &str) {
        let prefix: String = input.chars().take(40).collect();
        self.request_log
            .lock()
            .unwrap()
            .push(format!("{}:{}", op, prefix));
    }
}

/// Map text deterministically onto a small vector. Not meaningful as an
/// embedding, but stable: equal texts get equal vectors.
pub fn pseudo_embedding(text: &str) -> Vec<f32> {
    let mut acc = [0u32; 8];
    for (i, b) in text.bytes().enumerate() {
        acc[i % 8] = acc[i % 8].wrapping_add(b as u32).wrapping_mul(31);
    }
    acc.iter().map(|&v| (v % 1000) as f32 / 1000.0).collect()
}

#[async_trait]
impl ModelService for MockModel {
    async fn describe_image(
        &self,
        _image: &[u8],
        _mime: &str,
        _system: &str,
        user: &str,
    ) -> Result<String> {
        self.log("describe", user);
        let mut replies = self.describe_replies.lock().unwrap();
        if replies.is_empty() {
            bail!("MockModel: no more describe replies");
        }
        Ok(replies.remove(0))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.log("embed", text);
        if self.embed_fail.load(Ordering::SeqCst) {
            bail!("MockModel: embedding service unavailable");
        }
        Ok(pseudo_embedding(text))
    }

    async fn transcribe_audio(&self, _audio: &[u8], filename: &str) -> Result<String> {
        self.log("transcribe", filename);
        let mut transcripts = self.transcripts.lock().unwrap();
        if transcripts.is_empty() {
            bail!("MockModel: no more transcripts");
        }
        Ok(transcripts.remove(0))
    }

    async fn run_task(&self, _system: &str, user: &str) -> Result<String> {
        self.log("task", user);
        let mut replies = self.task_replies.lock().unwrap();
        if replies.is_empty() {
            bail!("MockModel: no more task replies");
        }
        Ok(replies.remove(0))
    }

    async fn chat_stream(&self, _system: &str, messages: &[ChatMessage]) -> Result<ChunkStream> {
        let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        self.log("chat", last);

        let mut scripts = self.chat_scripts.lock().unwrap();
        if scripts.is_empty() {
            bail!("MockModel: no more chat scripts");
        }
        let script = scripts.remove(0);

        let mut items: Vec<Result<String>> = script.chunks.into_iter().map(Ok).collect();
        if script.fail_after {
            items.push(Err(anyhow::anyhow!("MockModel: stream interrupted")));
        }

        Ok(futures::stream::iter(items).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replies_returned_in_order() {
        let model = MockModel::new();
        model.push_task_reply("first");
        model.push_task_reply("second");

        assert_eq!(model.run_task("s", "a").await.unwrap(), "first");
        assert_eq!(model.run_task("s", "b").await.unwrap(), "second");
        assert!(model.run_task("s", "c").await.is_err());
    }

    #[tokio::test]
    async fn test_pseudo_embedding_is_deterministic() {
        let model = MockModel::new();
        let a = model.embed("pasta").await.unwrap();
        let b = model.embed("pasta").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert_ne!(a, model.embed("soup").await.unwrap());
    }

    #[tokio::test]
    async fn test_scripted_stream_ends_with_error() {
        let model = MockModel::new();
        model.push_chat_script(ChatScript {
            chunks: vec!["partial ".to_string()],
            fail_after: true,
        });

        let mut stream = model
            .chat_stream("s", &[ChatMessage::user("hi")])
            .await
            .unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "partial ");
        assert!(stream.next().await.unwrap().is_err());
    }
}
