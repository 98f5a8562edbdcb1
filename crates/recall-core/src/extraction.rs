//! Parsing and synthesis of structured extractions.
//!
//! Vision models frequently wrap their JSON reply in a Markdown code fence
//! even when asked for bare JSON. [`unwrap_code_fence`] strips the fence,
//! [`parse_extraction`] validates the canonical schema, and
//! [`transcript_extraction`] synthesizes an extraction for the audio path
//! where no structured reply exists.

use anyhow::{Context, Result};

use crate::models::{Classification, Extraction};

/// Classification tag applied to documents synthesized from audio.
pub const AUDIO_CLASSIFICATION: &str = "audio_transcription";

/// Number of transcript characters used for a synthesized document name.
const TRANSCRIPT_NAME_CHARS: usize = 15;

/// Strip a leading/trailing Markdown code fence from a model reply.
///
/// Handles ```` ```json ```` and bare ```` ``` ```` fences, with or without
/// surrounding whitespace. Input that carries no fence is returned
/// unchanged, so the operation is idempotent.
pub fn unwrap_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();

    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the optional language tag on the opening fence line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };

    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Parse a model reply into a canonical [`Extraction`].
///
/// The reply may be fenced; it must otherwise be a single JSON object with
/// `name`, `type.user`, `type.ai_classified`, and `summary`. Anything else
/// is a hard error — nothing is persisted from an unparseable reply.
pub fn parse_extraction(raw: &str) -> Result<Extraction> {
    let body = unwrap_code_fence(raw);
    serde_json::from_str(body)
        .with_context(|| format!("model returned invalid extraction JSON: {}", truncate(body, 120)))
}

/// Synthesize an extraction for a transcribed audio clip.
///
/// `name` is the first [`TRANSCRIPT_NAME_CHARS`] characters of the
/// transcript, `summary` is the full transcript, and the classification is
/// fixed to [`AUDIO_CLASSIFICATION`].
pub fn transcript_extraction(transcript: &str, declared_category: Option<&str>) -> Extraction {
    let transcript = transcript.trim();
    let name: String = transcript.chars().take(TRANSCRIPT_NAME_CHARS).collect();

    Extraction {
        name,
        kind: Classification {
            user: declared_category.unwrap_or("Audio").to_string(),
            ai_classified: AUDIO_CLASSIFICATION.to_string(),
        },
        summary: transcript.to_string(),
        extra: serde_json::Map::new(),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{}…", head)
    }
}
