use crate::catalog::client::TalkPageSource;
use crate::config::Config;
use crate::constants::DEFAULT_QUERY_LIMIT;
use crate::db::query::{filter_options, query_talks, SortBy, SortOrder, TalkFilters, TalkStatus};
use crate::db::Database;
use crate::error::{Result, ScraperError};
use crate::export::{csv, rss};
use crate::tasks::run_ingest;
use axum::{
    extract::Query,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

pub struct AppState {
    pub db: Arc<Database>,
    pub source: Arc<dyn TalkPageSource>,
    pub config: Config,
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "talks-scraper",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Manual scrape trigger; mirrors what the interval loop runs.
async fn trigger(Extension(state): Extension<Arc<AppState>>) -> Response {
    info!("manual scrape triggered");
    match run_ingest(state.source.as_ref(), &state.db, &state.config).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => {
            error!(error = %e, "scrape failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("scrape failed: {e}")).into_response()
        }
    }
}

/// Raw query-string shape for the talk list. Validation happens in
/// `into_filters`; nothing malformed reaches the query engine.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TalksQuery {
    page: Option<u32>,
    limit: Option<u32>,
    sort_by: Option<String>,
    sort_order: Option<String>,
    search: Option<String>,
    tags: Option<String>,
    instructors: Option<String>,
    status: Option<String>,
}

fn parse_list<T>(raw: Option<&str>, parse: impl Fn(&str) -> Result<T>) -> Result<Vec<T>> {
    let mut out = Vec::new();
    if let Some(raw) = raw {
        for part in raw.split(',') {
            let part = part.trim();
            if !part.is_empty() {
                out.push(parse(part)?);
            }
        }
    }
    Ok(out)
}

impl TalksQuery {
    fn into_filters(self) -> Result<TalkFilters> {
        let page = self.page.unwrap_or(1);
        if page == 0 {
            return Err(ScraperError::InvalidFilter("page must be positive".into()));
        }
        let limit = self.limit.unwrap_or(DEFAULT_QUERY_LIMIT);
        if limit == 0 {
            return Err(ScraperError::InvalidFilter("limit must be positive".into()));
        }

        let sort_by = match self.sort_by.as_deref() {
            None | Some("") => SortBy::default(),
            Some(s) => s.parse()?,
        };
        let sort_order = match self.sort_order.as_deref() {
            None | Some("") => SortOrder::default(),
            Some(s) => s.parse()?,
        };

        let tags = parse_list(self.tags.as_deref(), |s| {
            s.parse::<i64>()
                .map_err(|_| ScraperError::InvalidFilter(format!("invalid tag id '{s}'")))
        })?;
        let instructors = parse_list(self.instructors.as_deref(), |s| Ok(s.to_string()))?;
        let status = parse_list(self.status.as_deref(), |s| s.parse::<TalkStatus>())?;

        Ok(TalkFilters {
            search: self.search.unwrap_or_default(),
            tags,
            instructors,
            status,
            sort_by,
            sort_order,
            page,
            limit,
        })
    }
}

fn bad_request(e: ScraperError) -> Response {
    (StatusCode::BAD_REQUEST, e.to_string()).into_response()
}

fn query_failed(e: ScraperError) -> Response {
    error!(error = %e, "talk query failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "query failed".to_string()).into_response()
}

async fn talks(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<TalksQuery>,
) -> Response {
    let filters = match params.into_filters() {
        Ok(f) => f,
        Err(e) => return bad_request(e),
    };
    match query_talks(&state.db, &filters, Utc::now()) {
        Ok(page) => Json(page).into_response(),
        Err(e) => query_failed(e),
    }
}

async fn talks_csv(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<TalksQuery>,
) -> Response {
    let filters = match params.into_filters() {
        Ok(f) => f,
        Err(e) => return bad_request(e),
    };
    match query_talks(&state.db, &filters, Utc::now()) {
        Ok(page) => (
            [
                (header::CONTENT_TYPE, "text/csv"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"talks.csv\"",
                ),
            ],
            csv::talks_to_csv(&page.talks),
        )
            .into_response(),
        Err(e) => query_failed(e),
    }
}

async fn talks_rss(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<TalksQuery>,
) -> Response {
    let filters = match params.into_filters() {
        Ok(f) => f,
        Err(e) => return bad_request(e),
    };
    let now = Utc::now();
    match query_talks(&state.db, &filters, now) {
        Ok(page) => (
            [(header::CONTENT_TYPE, "application/rss+xml")],
            rss::talks_to_rss(&page.talks, now, &state.config.site_url),
        )
            .into_response(),
        Err(e) => query_failed(e),
    }
}

async fn filters(Extension(state): Extension<Arc<AppState>>) -> Response {
    match filter_options(&state.db) {
        Ok(options) => Json(options).into_response(),
        Err(e) => query_failed(e),
    }
}

/// Create the HTTP server with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/trigger", post(trigger))
        .route("/talks", get(talks))
        .route("/talks.csv", get(talks_csv))
        .route("/rss.xml", get(talks_rss))
        .route("/filters", get(filters))
        .layer(ServiceBuilder::new().layer(cors).layer(Extension(state)))
}

/// Background scrape cadence for serve mode. The first tick fires at
/// startup so a fresh deployment populates itself.
async fn scrape_loop(state: Arc<AppState>) {
    let hours = state.config.server.scrape_interval_hours;
    let mut interval = tokio::time::interval(Duration::from_secs(hours * 3600));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        info!("scheduled scrape triggered");
        if let Err(e) = run_ingest(state.source.as_ref(), &state.db, &state.config).await {
            error!(error = %e, "scheduled scrape failed");
        }
    }
}

pub async fn run_server(state: Arc<AppState>, port: u16) -> Result<()> {
    if state.config.server.scrape_interval_hours > 0 {
        tokio::spawn(scrape_loop(state.clone()));
    }

    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting talks server");
    hyper::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_no_params_given() {
        let filters = TalksQuery::default().into_filters().unwrap();
        assert_eq!(filters.page, 1);
        assert_eq!(filters.limit, DEFAULT_QUERY_LIMIT);
        assert_eq!(filters.sort_by, SortBy::StartTime);
        assert_eq!(filters.sort_order, SortOrder::Desc);
        assert!(filters.tags.is_empty());
    }

    #[test]
    fn list_params_split_on_commas() {
        let query = TalksQuery {
            tags: Some("1, 2,3".into()),
            status: Some("live,recorded".into()),
            ..TalksQuery::default()
        };
        let filters = query.into_filters().unwrap();
        assert_eq!(filters.tags, vec![1, 2, 3]);
        assert_eq!(filters.status, vec![TalkStatus::Live, TalkStatus::Recorded]);
    }

    #[test]
    fn malformed_params_are_rejected() {
        let bad_tag = TalksQuery {
            tags: Some("1,x".into()),
            ..TalksQuery::default()
        };
        assert!(bad_tag.into_filters().is_err());

        let bad_status = TalksQuery {
            status: Some("archived".into()),
            ..TalksQuery::default()
        };
        assert!(bad_status.into_filters().is_err());

        let zero_page = TalksQuery {
            page: Some(0),
            ..TalksQuery::default()
        };
        assert!(zero_page.into_filters().is_err());
    }
}
