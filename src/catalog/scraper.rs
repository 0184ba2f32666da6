use crate::catalog::client::TalkPageSource;
use crate::catalog::schema::TalkItem;
use crate::error::Result;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

/// Walks every page of the catalog in source order. Page 1 decides the
/// page count, so a failure there aborts the scrape; a failed later page
/// is logged and skipped.
pub async fn scrape_talks(
    source: &dyn TalkPageSource,
    limit: u32,
    delay: Duration,
) -> Result<Vec<TalkItem>> {
    let first = source.fetch_page(1, limit).await?;
    let total_pages = first.metadata.pages.max(0) as u32;
    let mut items = first.items;

    info!(
        total_pages,
        items_on_page = items.len(),
        "starting catalog scrape"
    );

    for page in 2..=total_pages {
        sleep(delay).await;

        match source.fetch_page(page, limit).await {
            Ok(data) => {
                items.extend(data.items);
                info!(
                    page,
                    total_pages,
                    total_items = items.len(),
                    "fetched catalog page"
                );
            }
            Err(e) => {
                error!(page, error = %e, "failed to fetch catalog page, skipping");
            }
        }
    }

    info!(total_items = items.len(), "catalog scrape complete");
    Ok(items)
}
