//! Projects validated catalog items into the persisted entity shapes.
//! Items without a main section or with unparseable event times are
//! recorded omissions, not errors.

use crate::catalog::schema::{PageSection, TalkItem, MAIN_SECTION_TYPE};
use crate::constants::FEATURED_TAG_SLUG;
use crate::identity::{instructor_identity, normalize_instructor_name};
use chrono::DateTime;
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct TalkRow {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub is_canceled: bool,
    pub is_delisted: bool,
    pub is_featured: bool,
    pub start_timestamp: i64,
    pub end_timestamp: i64,
    pub duration_min: i64,
    pub timezone: Option<String>,
    pub has_internal_recording: bool,
    pub is_recording_public: bool,
    pub num_signups: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructorRow {
    pub id: String,
    pub name: String,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRow {
    pub id: i64,
    pub slug: String,
    pub name: String,
}

/// Entity batches ready for persistence. Instructors and tags are
/// deduplicated across the whole batch; junction pairs are unique.
#[derive(Debug, Default)]
pub struct ProjectedBatch {
    pub talks: Vec<TalkRow>,
    pub instructors: Vec<InstructorRow>,
    pub tags: Vec<TagRow>,
    pub talk_instructors: Vec<(i64, String)>,
    pub talk_tags: Vec<(i64, i64)>,
}

fn format_description(main: &PageSection) -> String {
    let outcomes = main
        .learning_outcomes
        .iter()
        .map(|o| format!("- {}: {}", o.title, o.description))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\n\n{}", main.topic_desc, outcomes)
}

fn parse_epoch_seconds(raw: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.timestamp())
}

pub fn project_items(items: &[TalkItem]) -> ProjectedBatch {
    let mut talks = Vec::new();
    let mut instructors: BTreeMap<String, InstructorRow> = BTreeMap::new();
    let mut tags: BTreeMap<i64, TagRow> = BTreeMap::new();
    let mut talk_instructors = Vec::new();
    let mut talk_tags = Vec::new();
    let mut seen_instructor_links: HashSet<(i64, String)> = HashSet::new();
    let mut seen_tag_links: HashSet<(i64, i64)> = HashSet::new();

    for item in items {
        let page = &item.content_page;
        let event = &page.school_event;

        let Some(main) = page
            .sections
            .iter()
            .find(|s| s.section_type == MAIN_SECTION_TYPE)
        else {
            warn!(talk_id = item.id, "talk missing main section, skipping");
            continue;
        };

        let (Some(start), Some(end)) = (
            parse_epoch_seconds(&event.start_datetime),
            parse_epoch_seconds(&event.end_datetime),
        ) else {
            warn!(
                talk_id = item.id,
                start = %event.start_datetime,
                end = %event.end_datetime,
                "talk has unparseable event times, skipping"
            );
            continue;
        };

        talks.push(TalkRow {
            id: item.id,
            slug: page.slug.clone(),
            title: main.title.clone(),
            description: format_description(main),
            image_url: main.image_url.clone(),
            is_canceled: item.is_canceled,
            is_delisted: item.is_delisted,
            is_featured: item.tags.iter().any(|t| t.slug == FEATURED_TAG_SLUG),
            start_timestamp: start,
            end_timestamp: end,
            duration_min: event.duration_min,
            timezone: event.timezone.clone(),
            has_internal_recording: event.has_internal_recording,
            is_recording_public: event.is_recording_public,
            num_signups: page.num_signups,
        });

        for info in &main.instructor_infos {
            let name = normalize_instructor_name(&info.name);
            let id = instructor_identity(&name);
            instructors.insert(
                id.clone(),
                InstructorRow {
                    id: id.clone(),
                    name,
                    image_url: info.image_url.clone(),
                },
            );
            if seen_instructor_links.insert((item.id, id.clone())) {
                talk_instructors.push((item.id, id));
            }
        }

        for tag in &item.tags {
            tags.insert(
                tag.id,
                TagRow {
                    id: tag.id,
                    slug: tag.slug.clone(),
                    name: tag.label.clone(),
                },
            );
            if seen_tag_links.insert((item.id, tag.id)) {
                talk_tags.push((item.id, tag.id));
            }
        }
    }

    ProjectedBatch {
        talks,
        instructors: instructors.into_values().collect(),
        tags: tags.into_values().collect(),
        talk_instructors,
        talk_tags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::schema::TalkItem;
    use serde_json::{json, Value};

    fn item_json(id: i64, section_type: &str) -> Value {
        json!({
            "id": id,
            "school_id": 1,
            "is_visible_on_discovery_page": true,
            "is_canceled": false,
            "is_delisted": false,
            "connected_course_id": null,
            "workshop_tags": [
                { "id": 7, "label": "AI", "slug": "ai", "description": null, "parent_tag_id": null },
                { "id": 9, "label": "Featured", "slug": "featured-ll", "description": null, "parent_tag_id": null }
            ],
            "published_content_page": {
                "id": id * 10,
                "slug": format!("talk-{id}"),
                "sections": [{
                    "title": "Intro to Scraping",
                    "image_url": "https://img.example/cover.png",
                    "topic_desc": "All about scraping.",
                    "section_type": section_type,
                    "instructor_infos": [
                        { "name": "jane doe", "image_url": "https://img.example/jane.png" },
                        { "name": "Jane   Doe!", "image_url": "https://img.example/jane2.png" }
                    ],
                    "learning_outcomes": [
                        { "title": "Fetch", "description": "pull pages" },
                        { "title": "Store", "description": "persist rows" }
                    ]
                }],
                "school_event": {
                    "start_datetime": "2026-01-05T17:00:30Z",
                    "end_datetime": "2026-01-05T18:00:30Z",
                    "duration_min": 60,
                    "timezone": "America/Los_Angeles",
                    "has_internal_recording": true,
                    "is_recording_public": false
                },
                "num_signups": 42
            }
        })
    }

    fn item(id: i64, section_type: &str) -> TalkItem {
        serde_json::from_value(item_json(id, section_type)).unwrap()
    }

    #[test]
    fn projects_talk_fields_and_description() {
        let batch = project_items(&[item(1, "main")]);
        assert_eq!(batch.talks.len(), 1);

        let talk = &batch.talks[0];
        assert_eq!(talk.id, 1);
        assert_eq!(talk.slug, "talk-1");
        assert_eq!(
            talk.description,
            "All about scraping.\n\n- Fetch: pull pages\n- Store: persist rows"
        );
        assert!(talk.is_featured);
        assert_eq!(talk.start_timestamp, 1767632430);
        assert_eq!(talk.end_timestamp, 1767636030);
        assert_eq!(talk.timezone.as_deref(), Some("America/Los_Angeles"));
    }

    #[test]
    fn skips_items_without_a_main_section() {
        let batch = project_items(&[item(1, "hero"), item(2, "main")]);
        assert_eq!(batch.talks.len(), 1);
        assert_eq!(batch.talks[0].id, 2);
        // no links for the skipped item
        assert!(batch.talk_tags.iter().all(|(talk_id, _)| *talk_id == 2));
    }

    #[test]
    fn skips_items_with_unparseable_times() {
        let mut raw = item_json(3, "main");
        raw["published_content_page"]["school_event"]["start_datetime"] = json!("not a date");
        let bad: TalkItem = serde_json::from_value(raw).unwrap();

        let batch = project_items(&[bad, item(4, "main")]);
        assert_eq!(batch.talks.len(), 1);
        assert_eq!(batch.talks[0].id, 4);
    }

    #[test]
    fn dedupes_instructors_that_normalize_identically() {
        let batch = project_items(&[item(1, "main")]);
        // both raw spellings normalize to "Jane Doe"
        assert_eq!(batch.instructors.len(), 1);
        assert_eq!(batch.instructors[0].name, "Jane Doe");
        assert_eq!(batch.talk_instructors.len(), 1);
    }

    #[test]
    fn shared_entities_dedupe_across_items_but_links_do_not() {
        let batch = project_items(&[item(1, "main"), item(2, "main")]);
        assert_eq!(batch.instructors.len(), 1);
        assert_eq!(batch.tags.len(), 2);
        assert_eq!(batch.talk_instructors.len(), 2);
        assert_eq!(batch.talk_tags.len(), 4);
    }

    #[test]
    fn not_featured_without_the_featured_slug() {
        let mut raw = item_json(5, "main");
        raw["workshop_tags"] = json!([
            { "id": 7, "label": "AI", "slug": "ai", "description": null, "parent_tag_id": null }
        ]);
        let plain: TalkItem = serde_json::from_value(raw).unwrap();
        let batch = project_items(&[plain]);
        assert!(!batch.talks[0].is_featured);
    }
}
