use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashSet;
use talks_scraper::db::query::{
    filter_options, query_talks, SortBy, SortOrder, TalkFilters, TalkStatus,
};
use talks_scraper::db::upsert::persist_batch;
use talks_scraper::db::Database;
use talks_scraper::export::{csv::talks_to_csv, rss::talks_to_rss};
use talks_scraper::identity::instructor_identity;
use talks_scraper::projector::{InstructorRow, ProjectedBatch, TagRow, TalkRow};

const NOW_TS: i64 = 1_800_000_000;

fn now() -> DateTime<Utc> {
    Utc.timestamp_opt(NOW_TS, 0).unwrap()
}

fn talk(id: i64, title: &str, start: i64, end: i64) -> TalkRow {
    TalkRow {
        id,
        slug: format!("talk-{id}"),
        title: title.to_string(),
        description: format!("About {title}"),
        image_url: "https://img.example/cover.png".to_string(),
        is_canceled: false,
        is_delisted: false,
        is_featured: false,
        start_timestamp: start,
        end_timestamp: end,
        duration_min: 60,
        timezone: None,
        has_internal_recording: false,
        is_recording_public: true,
        num_signups: 0,
    }
}

fn alice_id() -> String {
    instructor_identity("Alice Smith")
}

fn bob_id() -> String {
    instructor_identity("Bob Jones")
}

/// Six talks around a fixed instant: one scheduled, one live, one
/// recorded, one canceled, and two sitting exactly on the window edges.
fn seeded_db() -> Result<Database> {
    let db = Database::open_in_memory()?;

    let mut canceled = talk(4, "Canceled Talk", NOW_TS + 500, NOW_TS + 1000);
    canceled.is_canceled = true;

    let mut scheduled = talk(1, "Intro to Rust", NOW_TS + 1000, NOW_TS + 4600);
    scheduled.duration_min = 45;
    let mut live = talk(2, "Live Session", NOW_TS - 100, NOW_TS + 100);
    live.duration_min = 30;
    let mut recorded = talk(3, "Old Recording", NOW_TS - 10_000, NOW_TS - 6400);
    recorded.duration_min = 90;

    let batch = ProjectedBatch {
        talks: vec![
            scheduled,
            live,
            recorded,
            canceled,
            talk(5, "Starts Right Now", NOW_TS, NOW_TS + 50),
            talk(6, "Ends Right Now", NOW_TS - 50, NOW_TS),
        ],
        instructors: vec![
            InstructorRow {
                id: alice_id(),
                name: "Alice Smith".to_string(),
                image_url: "https://img.example/alice.png".to_string(),
            },
            InstructorRow {
                id: bob_id(),
                name: "Bob Jones".to_string(),
                image_url: "https://img.example/bob.png".to_string(),
            },
        ],
        tags: vec![
            TagRow {
                id: 1,
                slug: "ai".to_string(),
                name: "AI".to_string(),
            },
            TagRow {
                id: 2,
                slug: "web".to_string(),
                name: "Web".to_string(),
            },
        ],
        talk_instructors: vec![(1, alice_id()), (3, alice_id()), (3, bob_id())],
        talk_tags: vec![(1, 1), (2, 2), (3, 1), (3, 2)],
    };
    persist_batch(&db, &batch)?;
    Ok(db)
}

fn ids(page: &talks_scraper::db::query::TalksPage) -> Vec<i64> {
    page.talks.iter().map(|t| t.id).collect()
}

#[test]
fn canceled_talks_are_always_excluded() -> Result<()> {
    let db = seeded_db()?;
    let page = query_talks(&db, &TalkFilters::default(), now())?;
    assert_eq!(page.total, 5);
    assert!(!ids(&page).contains(&4));
    Ok(())
}

#[test]
fn tag_filter_includes_any_match_and_excludes_the_rest() -> Result<()> {
    let db = seeded_db()?;

    let with_ai = query_talks(
        &db,
        &TalkFilters {
            tags: vec![1],
            ..TalkFilters::default()
        },
        now(),
    )?;
    let mut matched = ids(&with_ai);
    matched.sort();
    assert_eq!(matched, vec![1, 3]);

    let unknown_tag = query_talks(
        &db,
        &TalkFilters {
            tags: vec![99],
            ..TalkFilters::default()
        },
        now(),
    )?;
    assert_eq!(unknown_tag.total, 0);

    // OR semantics: either tag matches
    let either = query_talks(
        &db,
        &TalkFilters {
            tags: vec![1, 2],
            ..TalkFilters::default()
        },
        now(),
    )?;
    let mut matched = ids(&either);
    matched.sort();
    assert_eq!(matched, vec![1, 2, 3]);
    Ok(())
}

#[test]
fn instructor_filter_matches_through_the_junction_table() -> Result<()> {
    let db = seeded_db()?;
    let page = query_talks(
        &db,
        &TalkFilters {
            instructors: vec![bob_id()],
            ..TalkFilters::default()
        },
        now(),
    )?;
    assert_eq!(ids(&page), vec![3]);
    Ok(())
}

#[test]
fn search_is_a_case_insensitive_substring_over_title_and_description() -> Result<()> {
    let db = seeded_db()?;

    let by_title = query_talks(
        &db,
        &TalkFilters {
            search: "RUST".to_string(),
            ..TalkFilters::default()
        },
        now(),
    )?;
    assert_eq!(ids(&by_title), vec![1]);

    // descriptions are "About <title>"
    let by_description = query_talks(
        &db,
        &TalkFilters {
            search: "about old".to_string(),
            ..TalkFilters::default()
        },
        now(),
    )?;
    assert_eq!(ids(&by_description), vec![3]);
    Ok(())
}

#[test]
fn status_filters_respect_window_boundaries() -> Result<()> {
    let db = seeded_db()?;

    let scheduled = query_talks(
        &db,
        &TalkFilters {
            status: vec![TalkStatus::Scheduled],
            ..TalkFilters::default()
        },
        now(),
    )?;
    assert_eq!(ids(&scheduled), vec![1]);

    // start == now and end == now both count as live
    let live = query_talks(
        &db,
        &TalkFilters {
            status: vec![TalkStatus::Live],
            ..TalkFilters::default()
        },
        now(),
    )?;
    let mut matched = ids(&live);
    matched.sort();
    assert_eq!(matched, vec![2, 5, 6]);

    let recorded = query_talks(
        &db,
        &TalkFilters {
            status: vec![TalkStatus::Recorded],
            ..TalkFilters::default()
        },
        now(),
    )?;
    assert_eq!(ids(&recorded), vec![3]);

    let combined = query_talks(
        &db,
        &TalkFilters {
            status: vec![TalkStatus::Scheduled, TalkStatus::Recorded],
            ..TalkFilters::default()
        },
        now(),
    )?;
    let mut matched = ids(&combined);
    matched.sort();
    assert_eq!(matched, vec![1, 3]);
    Ok(())
}

#[test]
fn row_status_agrees_with_the_filter_clock() -> Result<()> {
    let db = seeded_db()?;
    let page = query_talks(&db, &TalkFilters::default(), now())?;
    for talk in &page.talks {
        let expected = TalkStatus::classify(
            talk.start_time.timestamp(),
            talk.end_time.timestamp(),
            NOW_TS,
        );
        assert_eq!(talk.status, expected, "talk {}", talk.id);
    }
    Ok(())
}

#[test]
fn pagination_covers_the_filtered_set_exactly_once() -> Result<()> {
    let db = seeded_db()?;
    let mut seen = HashSet::new();
    let mut fetched = 0;

    let mut page_no = 1;
    loop {
        let page = query_talks(
            &db,
            &TalkFilters {
                limit: 2,
                page: page_no,
                ..TalkFilters::default()
            },
            now(),
        )?;
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 3);
        fetched += page.talks.len();
        for talk in &page.talks {
            assert!(seen.insert(talk.id), "talk {} repeated", talk.id);
        }
        if page_no >= page.total_pages {
            break;
        }
        page_no += 1;
    }

    assert_eq!(fetched as i64, 5);
    Ok(())
}

#[test]
fn sorting_by_duration_orders_rows_and_breaks_ties_by_id() -> Result<()> {
    let db = seeded_db()?;
    let page = query_talks(
        &db,
        &TalkFilters {
            sort_by: SortBy::Duration,
            sort_order: SortOrder::Asc,
            ..TalkFilters::default()
        },
        now(),
    )?;
    let durations: Vec<i64> = page.talks.iter().map(|t| t.duration_min).collect();
    assert_eq!(durations, vec![30, 45, 60, 60, 90]);
    // talks 5 and 6 share duration 60; id breaks the tie
    assert_eq!(ids(&page)[2..4], [5, 6]);
    Ok(())
}

#[test]
fn rows_aggregate_tags_and_instructors_without_multiplying() -> Result<()> {
    let db = seeded_db()?;
    let page = query_talks(
        &db,
        &TalkFilters {
            search: "Old Recording".to_string(),
            ..TalkFilters::default()
        },
        now(),
    )?;

    assert_eq!(page.talks.len(), 1);
    let talk = &page.talks[0];
    let tag_names: HashSet<&str> = talk.tags.iter().map(|t| t.name.as_str()).collect();
    let instructor_names: HashSet<&str> =
        talk.instructors.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(tag_names, HashSet::from(["AI", "Web"]));
    assert_eq!(instructor_names, HashSet::from(["Alice Smith", "Bob Jones"]));
    Ok(())
}

#[test]
fn filter_options_list_all_tags_and_instructors_alphabetically() -> Result<()> {
    let db = seeded_db()?;
    let options = filter_options(&db)?;
    let tag_names: Vec<&str> = options.tags.iter().map(|t| t.name.as_str()).collect();
    let instructor_names: Vec<&str> =
        options.instructors.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(tag_names, vec!["AI", "Web"]);
    assert_eq!(instructor_names, vec!["Alice Smith", "Bob Jones"]);
    Ok(())
}

#[test]
fn csv_export_escapes_embedded_commas_and_quotes() -> Result<()> {
    let db = Database::open_in_memory()?;
    let batch = ProjectedBatch {
        talks: vec![talk(7, "Intro, \"React\"", NOW_TS - 200, NOW_TS - 100)],
        ..ProjectedBatch::default()
    };
    persist_batch(&db, &batch)?;

    let page = query_talks(&db, &TalkFilters::default(), now())?;
    let csv = talks_to_csv(&page.talks);
    let mut lines = csv.lines();

    assert_eq!(
        lines.next(),
        Some("Title,Description,Start Time,Duration (min),Tags,Instructors,Status,Link")
    );
    let row = lines.next().unwrap();
    assert!(row.starts_with("\"Intro, \"\"React\"\"\","), "row: {row}");
    assert!(row.contains("Recorded"));
    assert!(row.contains("https://maven.com/p/talk-7/"));
    Ok(())
}

#[test]
fn rss_export_emits_one_item_per_talk_with_permalink_guid() -> Result<()> {
    let db = seeded_db()?;
    let page = query_talks(&db, &TalkFilters::default(), now())?;
    let rss = talks_to_rss(&page.talks, now(), "https://maven.com");

    assert!(rss.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(rss.contains("<rss version=\"2.0\">"));
    assert_eq!(rss.matches("<item>").count(), page.talks.len());
    assert!(rss.contains("<title><![CDATA[Intro to Rust]]></title>"));
    assert!(rss.contains("<guid isPermaLink=\"true\">https://maven.com/p/talk-1/</guid>"));
    Ok(())
}
