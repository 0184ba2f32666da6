use crate::catalog::schema::CatalogPage;
use crate::constants::FEATURED_TAG_SLUG;
use crate::error::{Result, ScraperError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

/// One page of the upstream catalog. Production uses the HTTP client
/// below; tests script this with canned pages.
#[async_trait]
pub trait TalkPageSource: Send + Sync {
    async fn fetch_page(&self, page: u32, limit: u32) -> Result<CatalogPage>;
}

pub struct CatalogClient {
    client: reqwest::Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl TalkPageSource for CatalogClient {
    #[instrument(skip(self))]
    async fn fetch_page(&self, page: u32, limit: u32) -> Result<CatalogPage> {
        debug!("fetching catalog page");

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("tag_slug", String::new()),
                ("page", page.to_string()),
                ("limit", limit.to_string()),
                ("featured_tag_slug", FEATURED_TAG_SLUG.to_string()),
            ])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::Fetch {
                page,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ScraperError::Schema {
            page,
            detail: e.to_string(),
        })
    }
}
