/// Upstream catalog endpoint and scrape tuning shared across the crate.

pub const API_BASE_URL: &str = "https://api.maven.com/workshops/discoverable/by_tags";

/// Tag slug the platform uses to mark featured talks.
pub const FEATURED_TAG_SLUG: &str = "featured-ll";

/// Items requested per catalog page.
pub const DEFAULT_PAGE_LIMIT: u32 = 24;

/// Pause between page fetches so we don't hammer the upstream API.
pub const REQUEST_DELAY_MS: u64 = 50;

/// Public permalink prefix for a talk slug.
pub const TALK_URL_BASE: &str = "https://maven.com/p/";

/// SQLite's default SQLITE_MAX_VARIABLE_NUMBER. Batch chunk sizes are
/// derived from this so multi-row statements never exceed the cap.
pub const MAX_BOUND_PARAMS: usize = 999;

/// Default page size on the read side.
pub const DEFAULT_QUERY_LIMIT: u32 = 10;
