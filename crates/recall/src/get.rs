//! Document retrieval by ID.
//!
//! Fetches a full owned document, prints its extraction and task history,
//! and can write the original captured media back to disk.

use std::path::Path;

use anyhow::{bail, Context, Result};
use base64::Engine;

use recall_core::store::Store;

use crate::auth::Session;

pub async fn run_get(
    store: &dyn Store,
    session: &Session,
    id: &str,
    media_out: Option<&Path>,
) -> Result<()> {
    let Some(doc) = store.get_document(session.owner(), id).await? else {
        bail!("document not found: {}", id);
    };

    let created = chrono::DateTime::from_timestamp(doc.created_at, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| doc.created_at.to_string());

    println!("--- Document ---");
    println!("id:         {}", doc.id);
    println!("name:       {}", doc.extraction.name);
    println!(
        "type:       {} / {}",
        doc.extraction.kind.user, doc.extraction.kind.ai_classified
    );
    println!("created:    {}", created);
    if let Some(ref mime) = doc.media_mime {
        println!("media:      {}", mime);
    }
    println!();

    println!("--- Extraction ---");
    println!(
        "{}",
        serde_json::to_string_pretty(&doc.extraction).unwrap_or_else(|_| doc.extraction.to_json())
    );
    println!();

    let tasks = store.list_tasks(session.owner(), id).await?;
    println!("--- Task history ({}) ---", tasks.len());
    for task in &tasks {
        println!("[{}] {}", task.seq, task.prompt);
        println!("{}", task.result);
        println!();
    }

    if let Some(out) = media_out {
        let Some(ref b64) = doc.media_b64 else {
            bail!("document {} has no stored media", id);
        };
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(b64)
            .context("stored media is not valid base64")?;
        std::fs::write(out, bytes)
            .with_context(|| format!("Failed to write media to {}", out.display()))?;
        println!("media written to {}", out.display());
    }

    Ok(())
}
