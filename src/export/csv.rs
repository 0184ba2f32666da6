//! CSV rendering of query results. Pure transformation, no I/O.

use crate::constants::TALK_URL_BASE;
use crate::db::query::Talk;
use chrono::SecondsFormat;

const HEADER: [&str; 8] = [
    "Title",
    "Description",
    "Start Time",
    "Duration (min)",
    "Tags",
    "Instructors",
    "Status",
    "Link",
];

/// Quotes a field if it contains a comma, quote, or newline, doubling
/// any internal quotes.
fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn talks_to_csv(talks: &[Talk]) -> String {
    let mut lines = Vec::with_capacity(talks.len() + 1);
    lines.push(HEADER.join(","));

    for talk in talks {
        let fields = [
            talk.title.clone(),
            talk.description.clone(),
            talk.start_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            talk.duration_min.to_string(),
            talk.tags
                .iter()
                .map(|t| t.name.as_str())
                .collect::<Vec<_>>()
                .join("; "),
            talk.instructors
                .iter()
                .map(|i| i.name.as_str())
                .collect::<Vec<_>>()
                .join("; "),
            talk.status.to_string(),
            format!("{TALK_URL_BASE}{}/", talk.slug),
        ];
        lines.push(
            fields
                .iter()
                .map(|f| escape_csv(f))
                .collect::<Vec<_>>()
                .join(","),
        );
    }

    lines.join("\n")
}
