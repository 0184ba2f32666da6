//! Read-side query engine. Filters are modeled as a small predicate AST
//! so the count query and the page query compile from the same WHERE
//! clause, and the clock is always an explicit parameter.

use crate::db::Database;
use crate::error::{Result, ScraperError};
use chrono::{DateTime, Utc};
use rusqlite::{params_from_iter, types::Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TalkStatus {
    Scheduled,
    Live,
    Recorded,
}

impl TalkStatus {
    /// Boundary instants count as Live: a talk starting or ending
    /// exactly now is in progress.
    pub fn classify(start: i64, end: i64, now: i64) -> Self {
        if now < start {
            TalkStatus::Scheduled
        } else if now <= end {
            TalkStatus::Live
        } else {
            TalkStatus::Recorded
        }
    }
}

impl fmt::Display for TalkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TalkStatus::Scheduled => "Scheduled",
            TalkStatus::Live => "Live",
            TalkStatus::Recorded => "Recorded",
        };
        f.write_str(label)
    }
}

impl FromStr for TalkStatus {
    type Err = ScraperError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scheduled" => Ok(TalkStatus::Scheduled),
            "live" => Ok(TalkStatus::Live),
            "recorded" => Ok(TalkStatus::Recorded),
            other => Err(ScraperError::InvalidFilter(format!(
                "unknown status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    StartTime,
    Duration,
}

impl SortBy {
    fn column(self) -> &'static str {
        match self {
            SortBy::StartTime => "t.start_timestamp",
            SortBy::Duration => "t.duration_min",
        }
    }
}

impl FromStr for SortBy {
    type Err = ScraperError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "startTime" => Ok(SortBy::StartTime),
            "duration" => Ok(SortBy::Duration),
            other => Err(ScraperError::InvalidFilter(format!(
                "unknown sort field '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = ScraperError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(ScraperError::InvalidFilter(format!(
                "unknown sort order '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TalkFilters {
    pub search: String,
    pub tags: Vec<i64>,
    pub instructors: Vec<String>,
    pub status: Vec<TalkStatus>,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub page: u32,
    pub limit: u32,
}

impl Default for TalkFilters {
    fn default() -> Self {
        Self {
            search: String::new(),
            tags: Vec::new(),
            instructors: Vec::new(),
            status: Vec::new(),
            sort_by: SortBy::default(),
            sort_order: SortOrder::default(),
            page: 1,
            limit: crate::constants::DEFAULT_QUERY_LIMIT,
        }
    }
}

/// Conditions the engine knows how to compile. Junction filters are
/// EXISTS predicates so joins never multiply the row count.
enum Predicate {
    NotCanceled,
    TextMatch(String),
    HasAnyTag(Vec<i64>),
    HasAnyInstructor(Vec<String>),
    StatusAny(Vec<TalkStatus>, i64),
}

impl Predicate {
    fn push_sql(&self, sql: &mut String, params: &mut Vec<Value>) {
        match self {
            Predicate::NotCanceled => sql.push_str("t.is_canceled = 0"),
            Predicate::TextMatch(needle) => {
                sql.push_str("(lower(t.title) LIKE ? OR lower(t.description) LIKE ?)");
                let pattern = format!("%{}%", needle.to_lowercase());
                params.push(Value::from(pattern.clone()));
                params.push(Value::from(pattern));
            }
            Predicate::HasAnyTag(ids) => {
                sql.push_str(
                    "EXISTS (SELECT 1 FROM talk_tag tt \
                     WHERE tt.talk_id = t.id AND tt.tag_id IN (",
                );
                push_placeholders(sql, ids.len());
                sql.push_str("))");
                params.extend(ids.iter().map(|id| Value::from(*id)));
            }
            Predicate::HasAnyInstructor(ids) => {
                sql.push_str(
                    "EXISTS (SELECT 1 FROM talk_instructor ti \
                     WHERE ti.talk_id = t.id AND ti.instructor_id IN (",
                );
                push_placeholders(sql, ids.len());
                sql.push_str("))");
                params.extend(ids.iter().map(|id| Value::from(id.clone())));
            }
            Predicate::StatusAny(statuses, now) => {
                sql.push('(');
                for (i, status) in statuses.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(" OR ");
                    }
                    match status {
                        TalkStatus::Scheduled => {
                            sql.push_str("t.start_timestamp > ?");
                            params.push(Value::from(*now));
                        }
                        TalkStatus::Live => {
                            sql.push_str("(t.start_timestamp <= ? AND t.end_timestamp >= ?)");
                            params.push(Value::from(*now));
                            params.push(Value::from(*now));
                        }
                        TalkStatus::Recorded => {
                            sql.push_str("t.end_timestamp < ?");
                            params.push(Value::from(*now));
                        }
                    }
                }
                sql.push(')');
            }
        }
    }
}

fn push_placeholders(sql: &mut String, count: usize) {
    for i in 0..count {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push('?');
    }
}

fn predicates(filters: &TalkFilters, now_ts: i64) -> Vec<Predicate> {
    let mut preds = vec![Predicate::NotCanceled];
    if !filters.search.is_empty() {
        preds.push(Predicate::TextMatch(filters.search.clone()));
    }
    if !filters.tags.is_empty() {
        preds.push(Predicate::HasAnyTag(filters.tags.clone()));
    }
    if !filters.instructors.is_empty() {
        preds.push(Predicate::HasAnyInstructor(filters.instructors.clone()));
    }
    if !filters.status.is_empty() {
        preds.push(Predicate::StatusAny(filters.status.clone(), now_ts));
    }
    preds
}

fn compile_where(preds: &[Predicate]) -> (String, Vec<Value>) {
    let mut sql = String::from(" WHERE ");
    let mut params = Vec::new();
    for (i, pred) in preds.iter().enumerate() {
        if i > 0 {
            sql.push_str(" AND ");
        }
        pred.push_sql(&mut sql, &mut params);
    }
    (sql, params)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructorRef {
    pub id: String,
    pub name: String,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Talk {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub is_featured: bool,
    pub status: TalkStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_min: i64,
    pub num_signups: i64,
    pub tags: Vec<TagRef>,
    pub instructors: Vec<InstructorRef>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TalksPage {
    pub talks: Vec<Talk>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

struct RawTalkRow {
    id: i64,
    slug: String,
    title: String,
    description: String,
    is_featured: bool,
    start_timestamp: i64,
    end_timestamp: i64,
    duration_min: i64,
    num_signups: i64,
    tags_json: Option<String>,
    instructors_json: Option<String>,
}

/// Runs the filtered, sorted, paginated talk query. `total` reflects the
/// whole filtered set; each row aggregates its tags and instructors.
/// Row status and status filters both use the injected `now`.
pub fn query_talks(db: &Database, filters: &TalkFilters, now: DateTime<Utc>) -> Result<TalksPage> {
    let now_ts = now.timestamp();
    let preds = predicates(filters, now_ts);
    let (where_sql, where_params) = compile_where(&preds);

    let conn = db.lock();

    let count_sql = format!("SELECT COUNT(*) FROM talk t{where_sql}");
    let total: i64 = conn.query_row(
        &count_sql,
        params_from_iter(where_params.iter().cloned()),
        |r| r.get(0),
    )?;

    let offset = (filters.page.saturating_sub(1) as i64) * filters.limit as i64;
    let page_sql = format!(
        "SELECT t.id, t.slug, t.title, t.description, t.is_featured, \
                t.start_timestamp, t.end_timestamp, t.duration_min, t.num_signups, \
                json_group_array(DISTINCT json_object('id', tg.id, 'name', tg.name)) \
                    FILTER (WHERE tg.id IS NOT NULL) AS tags, \
                json_group_array(DISTINCT json_object('id', i.id, 'name', i.name, 'imageUrl', i.image_url)) \
                    FILTER (WHERE i.id IS NOT NULL) AS instructors \
         FROM talk t \
         LEFT JOIN talk_tag tt ON tt.talk_id = t.id \
         LEFT JOIN tag tg ON tg.id = tt.tag_id \
         LEFT JOIN talk_instructor ti ON ti.talk_id = t.id \
         LEFT JOIN instructor i ON i.id = ti.instructor_id\
         {where_sql} \
         GROUP BY t.id \
         ORDER BY {order_col} {order_dir}, t.id ASC \
         LIMIT ? OFFSET ?",
        order_col = filters.sort_by.column(),
        order_dir = filters.sort_order.keyword(),
    );

    let mut params = where_params;
    params.push(Value::from(filters.limit as i64));
    params.push(Value::from(offset));

    let mut stmt = conn.prepare(&page_sql)?;
    let rows = stmt.query_map(params_from_iter(params.into_iter()), |row| {
        Ok(RawTalkRow {
            id: row.get(0)?,
            slug: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            is_featured: row.get(4)?,
            start_timestamp: row.get(5)?,
            end_timestamp: row.get(6)?,
            duration_min: row.get(7)?,
            num_signups: row.get(8)?,
            tags_json: row.get(9)?,
            instructors_json: row.get(10)?,
        })
    })?;

    let mut talks = Vec::new();
    for row in rows {
        let raw = row?;
        let tags: Vec<TagRef> = serde_json::from_str(raw.tags_json.as_deref().unwrap_or("[]"))?;
        let instructors: Vec<InstructorRef> =
            serde_json::from_str(raw.instructors_json.as_deref().unwrap_or("[]"))?;

        talks.push(Talk {
            id: raw.id,
            slug: raw.slug,
            title: raw.title,
            description: raw.description,
            is_featured: raw.is_featured,
            status: TalkStatus::classify(raw.start_timestamp, raw.end_timestamp, now_ts),
            start_time: epoch_to_datetime(raw.start_timestamp),
            end_time: epoch_to_datetime(raw.end_timestamp),
            duration_min: raw.duration_min,
            num_signups: raw.num_signups,
            tags,
            instructors,
        });
    }

    let total_pages = if total == 0 {
        0
    } else {
        ((total + filters.limit as i64 - 1) / filters.limit as i64) as u32
    };

    Ok(TalksPage {
        talks,
        total,
        page: filters.page,
        limit: filters.limit,
        total_pages,
    })
}

/// All known tags and instructors, alphabetically, for filter pickers.
pub fn filter_options(db: &Database) -> Result<FilterOptions> {
    let conn = db.lock();

    let mut stmt = conn.prepare("SELECT id, name FROM tag ORDER BY name")?;
    let tags = stmt
        .query_map([], |row| {
            Ok(TagRef {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare("SELECT id, name, image_url FROM instructor ORDER BY name")?;
    let instructors = stmt
        .query_map([], |row| {
            Ok(InstructorRef {
                id: row.get(0)?,
                name: row.get(1)?,
                image_url: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(FilterOptions { tags, instructors })
}

#[derive(Debug, Serialize)]
pub struct FilterOptions {
    pub tags: Vec<TagRef>,
    pub instructors: Vec<InstructorRef>,
}

fn epoch_to_datetime(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}
