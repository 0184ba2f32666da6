//! Chunked, idempotent batch writes. Entities are full-replace upserts;
//! junction rows are insert-or-ignore. Write order respects foreign
//! keys: instructors and tags, then talks, then junctions. Each chunk
//! commits in its own transaction.

use crate::constants::MAX_BOUND_PARAMS;
use crate::db::Database;
use crate::error::Result;
use crate::projector::ProjectedBatch;
use rusqlite::{params_from_iter, types::Value, Connection};
use tracing::info;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PersistSummary {
    pub talks: usize,
    pub instructors: usize,
    pub tags: usize,
    pub talk_instructor_links: usize,
    pub talk_tag_links: usize,
}

/// Rows per multi-row statement so `columns * rows` stays under the
/// bound-parameter cap.
const fn rows_per_chunk(columns: usize) -> usize {
    MAX_BOUND_PARAMS / columns
}

fn multi_row_sql(head: &str, columns: usize, rows: usize, tail: &str) -> String {
    let row = format!("({})", vec!["?"; columns].join(", "));
    let values = vec![row; rows].join(", ");
    format!("{head} VALUES {values} {tail}")
}

fn write_chunked(
    conn: &mut Connection,
    head: &str,
    tail: &str,
    columns: usize,
    rows: &[Vec<Value>],
) -> Result<()> {
    for chunk in rows.chunks(rows_per_chunk(columns)) {
        let sql = multi_row_sql(head, columns, chunk.len(), tail);
        let tx = conn.transaction()?;
        tx.execute(&sql, params_from_iter(chunk.iter().flatten().cloned()))?;
        tx.commit()?;
    }
    Ok(())
}

pub fn persist_batch(db: &Database, batch: &ProjectedBatch) -> Result<PersistSummary> {
    let mut conn = db.lock();

    let instructor_rows: Vec<Vec<Value>> = batch
        .instructors
        .iter()
        .map(|i| {
            vec![
                Value::from(i.id.clone()),
                Value::from(i.name.clone()),
                Value::from(i.image_url.clone()),
            ]
        })
        .collect();
    write_chunked(
        &mut conn,
        "INSERT INTO instructor (id, name, image_url)",
        "ON CONFLICT(id) DO UPDATE SET name = excluded.name, image_url = excluded.image_url",
        3,
        &instructor_rows,
    )?;

    let tag_rows: Vec<Vec<Value>> = batch
        .tags
        .iter()
        .map(|t| {
            vec![
                Value::from(t.id),
                Value::from(t.slug.clone()),
                Value::from(t.name.clone()),
            ]
        })
        .collect();
    write_chunked(
        &mut conn,
        "INSERT INTO tag (id, slug, name)",
        "ON CONFLICT(id) DO UPDATE SET slug = excluded.slug, name = excluded.name",
        3,
        &tag_rows,
    )?;

    let talk_rows: Vec<Vec<Value>> = batch
        .talks
        .iter()
        .map(|t| {
            vec![
                Value::from(t.id),
                Value::from(t.slug.clone()),
                Value::from(t.title.clone()),
                Value::from(t.description.clone()),
                Value::from(t.image_url.clone()),
                Value::from(t.is_canceled),
                Value::from(t.is_delisted),
                Value::from(t.is_featured),
                Value::from(t.start_timestamp),
                Value::from(t.end_timestamp),
                Value::from(t.duration_min),
                Value::from(t.timezone.clone()),
                Value::from(t.has_internal_recording),
                Value::from(t.is_recording_public),
                Value::from(t.num_signups),
            ]
        })
        .collect();
    write_chunked(
        &mut conn,
        "INSERT INTO talk (id, slug, title, description, image_url, is_canceled, is_delisted, \
         is_featured, start_timestamp, end_timestamp, duration_min, timezone, \
         has_internal_recording, is_recording_public, num_signups)",
        "ON CONFLICT(id) DO UPDATE SET slug = excluded.slug, title = excluded.title, \
         description = excluded.description, image_url = excluded.image_url, \
         is_canceled = excluded.is_canceled, is_delisted = excluded.is_delisted, \
         is_featured = excluded.is_featured, start_timestamp = excluded.start_timestamp, \
         end_timestamp = excluded.end_timestamp, duration_min = excluded.duration_min, \
         timezone = excluded.timezone, has_internal_recording = excluded.has_internal_recording, \
         is_recording_public = excluded.is_recording_public, num_signups = excluded.num_signups",
        15,
        &talk_rows,
    )?;

    let instructor_links: Vec<Vec<Value>> = batch
        .talk_instructors
        .iter()
        .map(|(talk_id, instructor_id)| {
            vec![Value::from(*talk_id), Value::from(instructor_id.clone())]
        })
        .collect();
    write_chunked(
        &mut conn,
        "INSERT INTO talk_instructor (talk_id, instructor_id)",
        "ON CONFLICT DO NOTHING",
        2,
        &instructor_links,
    )?;

    let tag_links: Vec<Vec<Value>> = batch
        .talk_tags
        .iter()
        .map(|(talk_id, tag_id)| vec![Value::from(*talk_id), Value::from(*tag_id)])
        .collect();
    write_chunked(
        &mut conn,
        "INSERT INTO talk_tag (talk_id, tag_id)",
        "ON CONFLICT DO NOTHING",
        2,
        &tag_links,
    )?;

    let summary = PersistSummary {
        talks: batch.talks.len(),
        instructors: batch.instructors.len(),
        tags: batch.tags.len(),
        talk_instructor_links: batch.talk_instructors.len(),
        talk_tag_links: batch.talk_tags.len(),
    };

    info!(
        talks = summary.talks,
        instructors = summary.instructors,
        tags = summary.tags,
        "talks saved to database"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_sizes_respect_the_parameter_cap() {
        for columns in [2, 3, 15] {
            assert!(rows_per_chunk(columns) * columns <= MAX_BOUND_PARAMS);
            assert!((rows_per_chunk(columns) + 1) * columns > MAX_BOUND_PARAMS);
        }
    }

    #[test]
    fn multi_row_sql_emits_one_placeholder_group_per_row() {
        let sql = multi_row_sql("INSERT INTO t (a, b)", 2, 3, "ON CONFLICT DO NOTHING");
        assert_eq!(
            sql,
            "INSERT INTO t (a, b) VALUES (?, ?), (?, ?), (?, ?) ON CONFLICT DO NOTHING"
        );
    }
}
