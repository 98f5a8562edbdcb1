//! Core data models used throughout Recall.
//!
//! These types represent the credentials, documents, task records, and chat
//! messages that flow through the capture and retrieval pipeline.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// An access code provisioned out-of-band.
///
/// Credentials are read-only to the rest of the system: they are looked up
/// once per session and compared for equality against user input. The
/// secret doubles as the tenant-isolation key on every stored document.
#[derive(Debug, Clone)]
pub struct Credential {
    pub secret: String,
    pub created_at: i64,
}

/// The `type` sub-object of an extraction: what the user declared the
/// capture to be, and what the model classified it as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub user: String,
    pub ai_classified: String,
}

/// Structured extraction produced by the model from captured media.
///
/// The canonical schema requires `name`, `type` (with `user` and
/// `ai_classified`), and `summary`; any additional top-level fields the
/// model emits are preserved verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Classification,
    pub summary: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Extraction {
    /// The text that gets embedded for similarity search: name and summary,
    /// newline-joined. Every capture path uses the same input.
    pub fn embedding_text(&self) -> String {
        format!("{}\n{}", self.name, self.summary)
    }

    /// Serialize to a compact JSON string (stored form, chat context form).
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A persisted capture: media payload, extraction, embedding, owner.
///
/// Documents are created once by the ingestion commit and never mutated
/// except for appends to their task history.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub owner: String,
    /// Original captured media, base64-encoded. Absent for captures whose
    /// media was not retained (none of the current paths drop it).
    pub media_b64: Option<String>,
    pub media_mime: Option<String>,
    /// SHA-256 hex digest of the raw media bytes (or transcript for audio).
    pub content_hash: String,
    pub extraction: Extraction,
    pub embedding: Vec<f32>,
    pub embedding_model: String,
    pub created_at: i64,
}

impl Document {
    /// Assemble a fresh document at commit time: generates the ID and
    /// timestamp, everything else is supplied by the ingestion pipeline.
    pub fn new(
        owner: impl Into<String>,
        extraction: Extraction,
        embedding: Vec<f32>,
        embedding_model: impl Into<String>,
        media_b64: Option<String>,
        media_mime: Option<String>,
        content_hash: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner: owner.into(),
            media_b64,
            media_mime,
            content_hash,
            extraction,
            embedding,
            embedding_model: embedding_model.into(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// SHA-256 hex digest of captured media bytes, used to report duplicate
/// captures of the same artifact.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// One entry in a document's append-only AI task history.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    /// Insertion order within the document, starting at 0.
    pub seq: i64,
    pub prompt: String,
    pub result: String,
    pub created_at: i64,
}

/// Speaker of a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single turn in the per-session conversation log.
///
/// The log lives in memory for the lifetime of a chat session and is never
/// persisted; an explicit reset empties it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_round_trip_preserves_extra_fields() {
        let json = r#"{
            "name": "Pasta",
            "type": {"user": "Recipe", "ai_classified": "Recipe"},
            "summary": "a pasta recipe",
            "ingredients": ["flour", "eggs"],
            "servings": 4
        }"#;

        let extraction: Extraction = serde_json::from_str(json).unwrap();
        assert_eq!(extraction.name, "Pasta");
        assert_eq!(extraction.kind.user, "Recipe");
        assert_eq!(extraction.extra["servings"], serde_json::json!(4));

        let back: Extraction = serde_json::from_str(&extraction.to_json()).unwrap();
        assert_eq!(back, extraction);
    }

    #[test]
    fn test_embedding_text_joins_name_and_summary() {
        let extraction = Extraction {
            name: "Pasta".to_string(),
            kind: Classification {
                user: "Recipe".to_string(),
                ai_classified: "Recipe".to_string(),
            },
            summary: "a pasta recipe".to_string(),
            extra: serde_json::Map::new(),
        };
        assert_eq!(extraction.embedding_text(), "Pasta\na pasta recipe");
    }

    #[test]
    fn test_content_hash_is_stable_hex() {
        let a = content_hash(b"the same bytes");
        let b = content_hash(b"the same bytes");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, content_hash(b"different bytes"));
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }
}
