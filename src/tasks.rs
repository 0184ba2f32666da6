//! Ingestion orchestration: scrape the catalog, project the items,
//! persist the batches. Shared by the CLI, the manual HTTP trigger, and
//! the serve-mode interval loop.

use crate::catalog::client::TalkPageSource;
use crate::catalog::scraper::scrape_talks;
use crate::config::Config;
use crate::db::upsert::persist_batch;
use crate::db::Database;
use crate::error::Result;
use crate::projector::project_items;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct IngestSummary {
    pub fetched_items: usize,
    pub talks: usize,
    pub instructors: usize,
    pub tags: usize,
}

pub async fn run_ingest(
    source: &dyn TalkPageSource,
    db: &Database,
    config: &Config,
) -> Result<IngestSummary> {
    let items = scrape_talks(
        source,
        config.api.page_limit,
        Duration::from_millis(config.api.delay_ms),
    )
    .await?;

    let batch = project_items(&items);
    let summary = persist_batch(db, &batch)?;

    info!(
        fetched_items = items.len(),
        talks = summary.talks,
        instructors = summary.instructors,
        tags = summary.tags,
        "ingest complete"
    );

    Ok(IngestSummary {
        fetched_items: items.len(),
        talks: summary.talks,
        instructors: summary.instructors,
        tags: summary.tags,
    })
}
