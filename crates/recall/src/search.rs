//! Search CLI: keyword and vector retrieval plus plain listing.
//!
//! Thin frontend over [`recall_core::retrieval::search`]. Vector mode
//! embeds the query with the same model used at ingestion; keyword mode
//! and listing need no model service at all.

use anyhow::{bail, Result};

use recall_core::retrieval::{search, RetrievalParams};
use recall_core::store::{DocumentHit, Store};

use crate::auth::Session;
use crate::config::Config;
use crate::model::ModelService;

pub fn params_from(config: &Config, limit: Option<i64>) -> RetrievalParams {
    RetrievalParams {
        final_limit: limit.unwrap_or(config.retrieval.final_limit),
        vector_pool_factor: config.retrieval.vector_pool_factor,
    }
}

pub async fn run_search(
    config: &Config,
    store: &dyn Store,
    model: Option<&dyn ModelService>,
    session: &Session,
    query: &str,
    mode: &str,
    limit: Option<i64>,
) -> Result<()> {
    let params = params_from(config, limit);

    let query_vec = if mode == "vector" && !query.trim().is_empty() {
        let Some(model) = model else {
            bail!("vector mode requires the model service");
        };
        Some(model.embed(query).await?)
    } else {
        None
    };

    let hits = search(
        store,
        session.owner(),
        query,
        mode,
        query_vec.as_deref(),
        &params,
    )
    .await?;

    print_hits(&hits, query.trim().is_empty());
    Ok(())
}

/// List every owned document, newest first.
pub async fn run_list(store: &dyn Store, session: &Session) -> Result<()> {
    let hits = store.list_documents(session.owner()).await?;
    print_hits(&hits, true);
    Ok(())
}

fn print_hits(hits: &[DocumentHit], listing: bool) {
    if hits.is_empty() {
        if listing {
            println!("No documents.");
        } else {
            println!("No results.");
        }
        return;
    }

    for (i, hit) in hits.iter().enumerate() {
        let date = chrono::DateTime::from_timestamp(hit.created_at, 0)
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_default();

        if listing {
            println!("{}. {} '{}'", i + 1, hit.kind_user, hit.name);
        } else {
            println!("{}. [{:.2}] {} '{}'", i + 1, hit.score, hit.kind_user, hit.name);
        }
        println!("    classified: {}", hit.kind_ai);
        println!("    summary: \"{}\"", hit.summary.replace('\n', " ").trim());
        println!("    created: {}", date);
        println!("    id: {}", hit.id);
        println!();
    }
}
