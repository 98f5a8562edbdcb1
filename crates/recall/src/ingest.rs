//! Ingestion pipeline: capture → extraction preview → explicit confirm →
//! embed → persist.
//!
//! The pipeline is two distinct calls. [`preview`] sends the captured
//! media to the model service and returns the parsed extraction without
//! touching the store; [`commit`] embeds the extraction and persists the
//! document. Nothing is written until commit, so a bad or unwanted
//! extraction costs nothing.

use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use base64::Engine;

use recall_core::extraction::{parse_extraction, transcript_extraction};
use recall_core::models::{content_hash, Document, Extraction};
use recall_core::store::Store;

use crate::auth::Session;
use crate::config::Config;
use crate::model::ModelService;

/// System instruction for the image path. The reply must be a single JSON
/// object in the canonical shape; anything else fails the preview.
const IMAGE_SYSTEM_PROMPT: &str = "You are an OCR-to-JSON expert transcribing a captured image. \
    Respond with a single JSON object and nothing else. The object must have a top-level \
    \"name\" (string), \"type\" (an object with \"user\" and \"ai_classified\" string fields), \
    and \"summary\" (string), plus any other fields you find useful. If the declared category \
    is 'Other', classify the object as you see fit.";

fn image_user_prompt(category: &str) -> String {
    format!(
        "Please transcribe this {} into a JSON-only output suitable for a document store. \
         Always include the required name, type, and summary fields.",
        category
    )
}

/// What kind of media a capture is, decided from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
}

/// A capture loaded from disk, ready for preview.
pub struct CapturedMedia {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub kind: MediaKind,
    pub filename: String,
}

const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "m4a", "ogg", "flac", "webm"];

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

pub fn detect_kind(path: &Path) -> MediaKind {
    if AUDIO_EXTENSIONS.contains(&extension_of(path).as_str()) {
        MediaKind::Audio
    } else {
        MediaKind::Image
    }
}

fn mime_for(path: &Path, kind: MediaKind) -> String {
    let ext = extension_of(path);
    match kind {
        MediaKind::Image => match ext.as_str() {
            "png" => "image/png",
            "gif" => "image/gif",
            "webp" => "image/webp",
            // Camera captures and unknown uploads are treated as JPEG.
            _ => "image/jpeg",
        },
        MediaKind::Audio => match ext.as_str() {
            "wav" => "audio/wav",
            "ogg" => "audio/ogg",
            "flac" => "audio/flac",
            "webm" => "audio/webm",
            "m4a" => "audio/mp4",
            _ => "audio/mpeg",
        },
    }
    .to_string()
}

/// Read a capture from disk and classify it as image or audio.
pub fn load_media(path: &Path) -> Result<CapturedMedia> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read media file: {}", path.display()))?;
    if bytes.is_empty() {
        bail!("media file is empty: {}", path.display());
    }

    let kind = detect_kind(path);
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("capture")
        .to_string();

    Ok(CapturedMedia {
        mime: mime_for(path, kind),
        bytes,
        kind,
        filename,
    })
}

/// Run the extraction step without persisting anything.
///
/// Image captures go to the vision model and must come back as canonical
/// JSON (possibly fenced). Audio captures are transcribed and synthesized
/// into an extraction locally.
pub async fn preview(
    model: &dyn ModelService,
    media: &CapturedMedia,
    declared_category: &str,
) -> Result<Extraction> {
    match media.kind {
        MediaKind::Image => {
            let reply = model
                .describe_image(
                    &media.bytes,
                    &media.mime,
                    IMAGE_SYSTEM_PROMPT,
                    &image_user_prompt(declared_category),
                )
                .await?;
            parse_extraction(&reply)
        }
        MediaKind::Audio => {
            let transcript = model.transcribe_audio(&media.bytes, &media.filename).await?;
            if transcript.trim().is_empty() {
                bail!("transcription returned no text");
            }
            Ok(transcript_extraction(&transcript, Some(declared_category)))
        }
    }
}

/// Persist a confirmed extraction as one document.
///
/// Embeds the extraction's name + summary, attaches the session's owning
/// credential, and inserts the document (media included, task history
/// empty) atomically. Returns the new document ID.
pub async fn commit(
    store: &dyn Store,
    model: &dyn ModelService,
    session: &Session,
    media: &CapturedMedia,
    extraction: Extraction,
    embedding_model: &str,
) -> Result<String> {
    let embedding = model.embed(&extraction.embedding_text()).await?;

    let doc = Document::new(
        session.owner(),
        extraction,
        embedding,
        embedding_model,
        Some(base64::engine::general_purpose::STANDARD.encode(&media.bytes)),
        Some(media.mime.clone()),
        content_hash(&media.bytes),
    );

    store.insert_document(&doc).await
}

/// CLI entry point: preview, show the extraction, confirm, commit.
pub async fn run_capture(
    config: &Config,
    store: &dyn Store,
    model: &dyn ModelService,
    session: &Session,
    path: &Path,
    category: &str,
    assume_yes: bool,
) -> Result<()> {
    let media = load_media(path)?;
    let extraction = preview(model, &media, category).await?;

    println!("--- Extraction preview ---");
    println!(
        "{}",
        serde_json::to_string_pretty(&extraction).unwrap_or_else(|_| extraction.to_json())
    );
    println!();

    if !assume_yes {
        if !atty::is(atty::Stream::Stdin) {
            bail!("refusing to save without confirmation (pass --yes)");
        }
        print!("Save to vault? [y/N]: ");
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes") {
            println!("Discarded; nothing was saved.");
            return Ok(());
        }
    }

    let hash = content_hash(&media.bytes);
    if let Some(existing) = store.find_by_content_hash(session.owner(), &hash).await? {
        println!("note: identical media already captured as {}", existing);
    }

    let id = commit(
        store,
        model,
        session,
        &media,
        extraction,
        &config.embedding.model,
    )
    .await?;

    println!("saved {}", id);
    Ok(())
}
