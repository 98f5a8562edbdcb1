//! Model service abstraction and implementations.
//!
//! Every "hard" operation — image transcription, embedding, audio
//! transcription, freeform tasks, grounded chat — is delegated to an
//! external model API behind the [`ModelService`] trait:
//!
//! - **[`openai::OpenAiModel`]** — OpenAI-compatible HTTP backend with
//!   retry/backoff and SSE streaming chat.
//! - **[`mock::MockModel`]** — deterministic scripted backend for tests.

pub mod mock;
pub mod openai;

use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;

use recall_core::models::ChatMessage;

/// A lazy, finite, forward-only sequence of streamed reply fragments.
///
/// Consumed exactly once per chat turn; fragments arrive in order and the
/// stream ends when the reply is complete or an error is yielded.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send + 'static>>;

/// Operations consumed from the external model service.
///
/// Model identifiers and prompt wording live in configuration and in the
/// calling modules; this trait only fixes the shapes.
#[async_trait]
pub trait ModelService: Send + Sync {
    /// Describe an image as text (expected: a JSON object, possibly fenced).
    async fn describe_image(
        &self,
        image: &[u8],
        mime: &str,
        system: &str,
        user: &str,
    ) -> Result<String>;

    /// Embed a text into a fixed-dimensionality vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Transcribe an audio clip to plain text.
    async fn transcribe_audio(&self, audio: &[u8], filename: &str) -> Result<String>;

    /// Run a one-shot freeform instruction, returning the full reply.
    async fn run_task(&self, system: &str, user: &str) -> Result<String>;

    /// Stream a chat completion for the given history.
    async fn chat_stream(&self, system: &str, messages: &[ChatMessage]) -> Result<ChunkStream>;
}
