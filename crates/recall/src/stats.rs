//! Vault statistics for the authenticated owner.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::auth::Session;

pub async fn run_stats(pool: &SqlitePool, session: &Session) -> Result<()> {
    let documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE owner = ?")
        .bind(session.owner())
        .fetch_one(pool)
        .await?;

    let tasks: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM document_tasks t
        JOIN documents d ON d.id = t.document_id
        WHERE d.owner = ?
        "#,
    )
    .bind(session.owner())
    .fetch_one(pool)
    .await?;

    let audio: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM documents WHERE owner = ? AND kind_ai = 'audio_transcription'",
    )
    .bind(session.owner())
    .fetch_one(pool)
    .await?;

    println!("documents:       {}", documents);
    println!("  from audio:    {}", audio);
    println!("task records:    {}", tasks);

    Ok(())
}
