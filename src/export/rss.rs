//! RSS 2.0 rendering of query results. One item per talk; the permalink
//! doubles as the guid.

use crate::constants::TALK_URL_BASE;
use crate::db::query::Talk;
use chrono::{DateTime, Utc};

/// A literal `]]>` inside CDATA would end the section early; split it
/// across two sections.
fn cdata_safe(text: &str) -> String {
    text.replace("]]>", "]]]]><![CDATA[>")
}

pub fn talks_to_rss(talks: &[Talk], now: DateTime<Utc>, site_link: &str) -> String {
    let items = talks
        .iter()
        .map(|talk| {
            let link = format!("{TALK_URL_BASE}{}/", talk.slug);
            format!(
                "\n    <item>\n      <title><![CDATA[{title}]]></title>\n      \
                 <description><![CDATA[{description}]]></description>\n      \
                 <link>{link}</link>\n      <pubDate>{pub_date}</pubDate>\n      \
                 <guid isPermaLink=\"true\">{link}</guid>\n    </item>",
                title = cdata_safe(&talk.title),
                description = cdata_safe(&talk.description),
                link = link,
                pub_date = talk.start_time.to_rfc2822(),
            )
        })
        .collect::<String>();

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <rss version=\"2.0\">\n  <channel>\n    \
         <title>Maven Lightning Lessons</title>\n    \
         <description>Maven Lightning Lessons Search Results</description>\n    \
         <link>{site_link}</link>\n    \
         <lastBuildDate>{build_date}</lastBuildDate>{items}\n  </channel>\n</rss>",
        site_link = site_link,
        build_date = now.to_rfc2822(),
        items = items,
    )
}
