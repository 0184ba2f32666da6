//! Typed model of the upstream catalog response. Decoding is the
//! validation boundary: a body that doesn't fit these shapes is a
//! schema error, not a partial result.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogPage {
    pub items: Vec<TalkItem>,
    pub metadata: PageMetadata,
    #[serde(default)]
    pub tag_id: Option<i64>,
    #[serde(default)]
    pub tag_slug: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageMetadata {
    pub total: i64,
    pub page: i64,
    pub pages: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TalkItem {
    pub id: i64,
    pub is_canceled: bool,
    pub is_delisted: bool,
    #[serde(rename = "workshop_tags")]
    pub tags: Vec<TagInfo>,
    #[serde(rename = "published_content_page")]
    pub content_page: ContentPage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagInfo {
    pub id: i64,
    pub label: String,
    pub slug: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentPage {
    pub id: i64,
    pub slug: String,
    pub sections: Vec<PageSection>,
    pub school_event: SchoolEvent,
    pub num_signups: i64,
}

/// One section of a talk's content page. Only the section whose
/// `section_type` is `"main"` carries the fields we project.
#[derive(Debug, Clone, Deserialize)]
pub struct PageSection {
    pub title: String,
    pub image_url: String,
    pub topic_desc: String,
    pub section_type: String,
    pub instructor_infos: Vec<InstructorInfo>,
    pub learning_outcomes: Vec<LearningOutcome>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstructorInfo {
    pub name: String,
    pub image_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LearningOutcome {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchoolEvent {
    pub start_datetime: String,
    pub end_datetime: String,
    pub duration_min: i64,
    #[serde(default)]
    pub timezone: Option<String>,
    pub has_internal_recording: bool,
    pub is_recording_public: bool,
}

pub const MAIN_SECTION_TYPE: &str = "main";
