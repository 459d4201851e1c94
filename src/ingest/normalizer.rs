//! Payload normalization into canonical events.
//!
//! One function per payload shape:
//! - RSS/Atom feeds (parsed with feed-rs)
//! - watched HTML pages (see [`super::page`])
//! - Horizons ephemeris tables
//! - USNO moon phase JSON
//!
//! Individual bad entries are skipped with a warning. A payload that cannot
//! be read at all is a [`NormalizeError`].

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;
use scraper::{Html, Node};
use serde::Deserialize;
use thiserror::Error;

use super::fetcher::RawPayload;
use super::page::{detect_page_change, PageHashStore};
use super::source::{CycleContext, SourceDescriptor, SourceKind};
use crate::domain::{Category, Event, EventType};

/// Elements whose text never counts as content
pub const IGNORED_ELEMENTS: [&str; 5] = ["script", "style", "nav", "footer", "header"];

const ELLIPSIS: char = '…';

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Payload is not a feed: {0}")]
    NotAFeed(String),

    #[error("Invalid JSON payload: {0}")]
    InvalidJson(String),

    #[error("Ephemeris payload has no $$SOE/$$EOE block")]
    MissingEphemerisBlock,
}

/// Turn one fetched payload into events according to the source kind
pub fn normalize(
    payload: &RawPayload,
    source: &SourceDescriptor,
    ctx: &CycleContext,
    pages: &PageHashStore,
) -> Result<Vec<Event>, NormalizeError> {
    match source.kind {
        SourceKind::Rss => normalize_feed(&payload.body, source, ctx),
        SourceKind::Page => Ok(detect_page_change(&payload.body, source, ctx, pages)
            .into_iter()
            .collect()),
        SourceKind::Ephemeris => normalize_ephemeris(&payload.body, source, ctx),
        SourceKind::MoonPhases => normalize_moon_phases(&payload.body, source, ctx),
    }
}

// ─── RSS / Atom ──────────────────────────────────────────────────────────────

/// Parse an RSS or Atom document, taking at most `max_items` entries
pub fn normalize_feed(
    body: &str,
    source: &SourceDescriptor,
    ctx: &CycleContext,
) -> Result<Vec<Event>, NormalizeError> {
    let mut feed = feed_rs::parser::parse(body.as_bytes())
        .map_err(|e| NormalizeError::NotAFeed(e.to_string()))?;

    // Newest first; undated entries keep document order after dated ones
    feed.entries
        .sort_by_key(|entry| std::cmp::Reverse(entry.published.or(entry.updated)));

    let limit = source.item_limit(ctx.max_items);
    let mut events = Vec::new();

    for (index, entry) in feed.entries.into_iter().take(limit).enumerate() {
        let title = entry
            .title
            .as_ref()
            .map(|t| collapse_whitespace(&t.content))
            .filter(|t| !t.is_empty());
        let link = entry
            .links
            .first()
            .map(|l| l.href.trim().to_string())
            .filter(|l| !l.is_empty());

        let (title, link) = match (title, link) {
            (Some(title), Some(link)) => (title, link),
            (title, link) => {
                tracing::warn!(
                    source = %source.id,
                    entry = index,
                    has_title = title.is_some(),
                    has_link = link.is_some(),
                    "Skipping malformed feed entry"
                );
                continue;
            }
        };

        let raw_summary = entry
            .summary
            .as_ref()
            .map(|t| t.content.clone())
            .filter(|s| !s.trim().is_empty())
            .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()))
            .unwrap_or_default();
        let summary = truncate_summary(&strip_markup(&raw_summary), ctx.summary_chars);

        let published = entry.published.or(entry.updated).unwrap_or(ctx.now);

        let image_url = entry.media.iter().find_map(|media| {
            media
                .content
                .iter()
                .filter(|c| {
                    c.content_type
                        .as_ref()
                        .map_or(true, |ct| ct.to_string().starts_with("image/"))
                })
                .find_map(|c| c.url.as_ref().map(|u| u.to_string()))
                .or_else(|| media.thumbnails.first().map(|t| t.image.uri.clone()))
        });

        let category = classify(source.category, &title, &summary);

        events.push(
            Event::new(&source.name, category, EventType::Rss, title, link, published)
                .with_source_url(&source.url)
                .with_summary(summary)
                .with_image_url(image_url)
                .with_created_at(ctx.now),
        );
    }

    Ok(events)
}

/// Source category, promoted to Artemis when the text mentions it
pub fn classify(default: Category, title: &str, summary: &str) -> Category {
    if mentions_artemis(title) || mentions_artemis(summary) {
        Category::Artemis
    } else {
        default
    }
}

fn mentions_artemis(text: &str) -> bool {
    text.to_lowercase().contains("artemis")
}

// ─── Markup helpers ──────────────────────────────────────────────────────────

/// Plain text of an HTML fragment, entities decoded and whitespace collapsed
pub fn strip_markup(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    collapse_whitespace(&text_outside_ignored(&fragment))
}

/// Visible text of a whole HTML document, ignoring chrome and scripts
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    collapse_whitespace(&text_outside_ignored(&document))
}

fn text_outside_ignored(html: &Html) -> String {
    let mut out = String::new();

    for node in html.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let ignored = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .map_or(false, |e| IGNORED_ELEMENTS.contains(&e.name()))
        });
        if ignored {
            continue;
        }

        out.push_str(text);
        out.push(' ');
    }

    out
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut to at most `max_chars` characters, ending in `…` when shortened
pub fn truncate_summary(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }

    let mut cut: String = text.chars().take(max_chars - 1).collect();
    let trimmed_len = cut.trim_end().len();
    cut.truncate(trimmed_len);
    cut.push(ELLIPSIS);
    cut
}

// ─── Horizons ephemeris ──────────────────────────────────────────────────────

#[derive(Deserialize)]
struct HorizonsResponse {
    result: String,
}

fn horizons_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:[AB]\.D\.\s+)?(\d{4}-[A-Za-z]{3}-\d{2}\s+\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?)")
            .expect("valid regex")
    })
}

/// Rows between `$$SOE` and `$$EOE`, as text or wrapped in JSON `result`
pub fn normalize_ephemeris(
    body: &str,
    source: &SourceDescriptor,
    ctx: &CycleContext,
) -> Result<Vec<Event>, NormalizeError> {
    let text = if body.trim_start().starts_with('{') {
        serde_json::from_str::<HorizonsResponse>(body)
            .map_err(|e| NormalizeError::InvalidJson(e.to_string()))?
            .result
    } else {
        body.to_string()
    };

    let start = text.find("$$SOE").ok_or(NormalizeError::MissingEphemerisBlock)?;
    let end = text[start..]
        .find("$$EOE")
        .map(|i| start + i)
        .ok_or(NormalizeError::MissingEphemerisBlock)?;
    let block = &text[start + "$$SOE".len()..end];

    let limit = source.item_limit(ctx.max_items);
    let mut events = Vec::new();

    for row in block.lines().map(str::trim).filter(|r| !r.is_empty()) {
        if events.len() >= limit {
            break;
        }

        let mut columns = row.split(',').map(str::trim);
        let first = columns.next().unwrap_or_default();

        let Some(when) = parse_horizons_time(first) else {
            tracing::debug!(source = %source.id, row, "Skipping unparseable ephemeris row");
            continue;
        };

        let details: Vec<&str> = columns.filter(|c| !c.is_empty()).collect();
        let title = format!("{} ephemeris {}", source.name, when.format("%Y-%m-%d %H:%M UTC"));
        let summary = truncate_summary(&details.join(", "), ctx.summary_chars);

        events.push(
            Event::new(&source.name, Category::SkyEvent, EventType::Ephemeris, title, "", when)
                .with_source_url(&source.url)
                .with_summary(summary)
                .with_created_at(ctx.now),
        );
    }

    Ok(events)
}

/// `2026-Jan-15 06:00` (optionally `A.D. ` prefixed, optionally with seconds)
pub fn parse_horizons_time(column: &str) -> Option<DateTime<Utc>> {
    let captured = horizons_date_re().captures(column.trim())?.get(1)?.as_str();
    let normalized = collapse_whitespace(captured);

    ["%Y-%b-%d %H:%M:%S%.f", "%Y-%b-%d %H:%M:%S", "%Y-%b-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&normalized, fmt).ok())
        .map(|naive| naive.and_utc())
}

// ─── USNO moon phases ────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct MoonPhaseResponse {
    #[serde(default)]
    phasedata: Vec<MoonPhase>,
}

#[derive(Deserialize)]
struct MoonPhase {
    phase: String,
    year: i32,
    month: u32,
    day: u32,
    time: String,
}

pub fn normalize_moon_phases(
    body: &str,
    source: &SourceDescriptor,
    ctx: &CycleContext,
) -> Result<Vec<Event>, NormalizeError> {
    let response: MoonPhaseResponse =
        serde_json::from_str(body).map_err(|e| NormalizeError::InvalidJson(e.to_string()))?;

    let limit = source.item_limit(ctx.max_items);
    let mut events = Vec::new();

    for phase in response.phasedata.into_iter().take(limit) {
        let date = NaiveDate::from_ymd_opt(phase.year, phase.month, phase.day);
        let time = NaiveTime::parse_from_str(phase.time.trim(), "%H:%M").ok();

        let (Some(date), Some(time)) = (date, time) else {
            tracing::warn!(source = %source.id, phase = %phase.phase, "Skipping moon phase with bad date");
            continue;
        };

        let when = date.and_time(time).and_utc();
        let summary = format!(
            "{} on {} at {} UTC.",
            phase.phase,
            date.format("%Y-%m-%d"),
            time.format("%H:%M")
        );

        events.push(
            Event::new(&source.name, Category::SkyEvent, EventType::Ephemeris, phase.phase, "", when)
                .with_source_url(&source.url)
                .with_summary(summary)
                .with_created_at(ctx.now),
        );
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ctx() -> CycleContext {
        CycleContext::new(Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap())
    }

    fn rss_source() -> SourceDescriptor {
        SourceDescriptor::new(
            "test-feed",
            "Test Feed",
            "https://example.com/feed",
            SourceKind::Rss,
            Category::Official,
        )
    }

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>T</title>
<item>
  <title>Artemis II crew trains</title>
  <link>https://example.com/a</link>
  <description><![CDATA[<p>The <b>crew</b> &amp; team</p><script>x()</script>]]></description>
  <pubDate>Mon, 12 Jan 2026 10:00:00 GMT</pubDate>
</item>
<item>
  <link>https://example.com/no-title</link>
  <description>missing title</description>
</item>
<item>
  <title>Rover update</title>
  <link>https://example.com/b</link>
</item>
</channel></rss>"#;

    #[test]
    fn test_feed_skips_malformed_entries() {
        let events = normalize_feed(RSS, &rss_source(), &ctx()).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].title, "Artemis II crew trains");
        assert_eq!(events[0].category, Category::Artemis);
        assert_eq!(events[0].summary, "The crew & team");
        assert_eq!(
            events[0].published_at,
            Utc.with_ymd_and_hms(2026, 1, 12, 10, 0, 0).unwrap()
        );

        // Undated entry falls back to cycle time
        assert_eq!(events[1].category, Category::Official);
        assert_eq!(events[1].published_at, ctx().now);
    }

    #[test]
    fn test_feed_respects_item_limit() {
        let mut source = rss_source();
        source.max_items = Some(1);
        let events = normalize_feed(RSS, &source, &ctx()).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_feed_keeps_most_recent_entries() {
        let oldest_first = r#"<rss version="2.0"><channel><title>T</title>
<item><title>Old</title><link>https://example.com/old</link>
<pubDate>Sat, 10 Jan 2026 10:00:00 GMT</pubDate></item>
<item><title>Undated</title><link>https://example.com/undated</link></item>
<item><title>Middle</title><link>https://example.com/middle</link>
<pubDate>Sun, 11 Jan 2026 10:00:00 GMT</pubDate></item>
<item><title>Newest</title><link>https://example.com/newest</link>
<pubDate>Mon, 12 Jan 2026 10:00:00 GMT</pubDate></item>
</channel></rss>"#;

        let mut source = rss_source();
        source.max_items = Some(2);
        let events = normalize_feed(oldest_first, &source, &ctx()).unwrap();
        let titles: Vec<&str> = events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Newest", "Middle"]);

        source.max_items = Some(4);
        let events = normalize_feed(oldest_first, &source, &ctx()).unwrap();
        assert_eq!(events[3].title, "Undated");
    }

    #[test]
    fn test_not_a_feed() {
        let result = normalize_feed("<html><body>nope</body></html>", &rss_source(), &ctx());
        assert!(matches!(result, Err(NormalizeError::NotAFeed(_))));
    }

    #[test]
    fn test_atom_feed() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom</title><id>urn:x</id><updated>2026-01-05T00:00:00Z</updated>
  <entry>
    <title>Station reboost</title>
    <link href="https://example.com/atom-1"/>
    <id>urn:x:1</id>
    <updated>2026-01-05T08:30:00Z</updated>
    <summary>Short burn raised the orbit.</summary>
  </entry>
</feed>"#;
        let events = normalize_feed(atom, &rss_source(), &ctx()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].url, "https://example.com/atom-1");
        assert_eq!(events[0].summary, "Short burn raised the orbit.");
    }

    #[test]
    fn test_truncate_summary() {
        assert_eq!(truncate_summary("short", 10), "short");
        let cut = truncate_summary("abcdefghij klm", 10);
        assert_eq!(cut, "abcdefghi…");
        assert_eq!(cut.chars().count(), 10);
        // Multibyte input cuts on char boundaries
        assert_eq!(truncate_summary("ééééé", 3), "éé…");
    }

    #[test]
    fn test_visible_text_ignores_chrome() {
        let html = "<html><head><style>p{}</style></head><body><header>Menu</header>\
                    <p>Launch   update</p><footer>(c)</footer><script>t()</script></body></html>";
        assert_eq!(visible_text(html), "Launch update");
    }

    #[test]
    fn test_ephemeris_text_and_json() {
        let text = "header\n$$SOE\n 2026-Jan-15 00:00, , , 123.4, -5.6\n garbage row\nA.D. 2026-Jan-15 06:00:00.000, , , 124.0, -5.1\n$$EOE\nfooter";
        let source = SourceDescriptor::new(
            "horizons",
            "JPL Horizons",
            "https://ssd.jpl.nasa.gov/api/horizons.api",
            SourceKind::Ephemeris,
            Category::SkyEvent,
        );

        let events = normalize_ephemeris(text, &source, &ctx()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].summary, "123.4, -5.6");
        assert_eq!(
            events[1].published_at,
            Utc.with_ymd_and_hms(2026, 1, 15, 6, 0, 0).unwrap()
        );
        assert!(events.iter().all(|e| e.event_type == EventType::Ephemeris));

        let json = serde_json::json!({ "result": text }).to_string();
        assert_eq!(normalize_ephemeris(&json, &source, &ctx()).unwrap(), events);

        assert!(matches!(
            normalize_ephemeris("no block", &source, &ctx()),
            Err(NormalizeError::MissingEphemerisBlock)
        ));
    }

    #[test]
    fn test_moon_phases() {
        let body = r#"{"apiversion":"4.0.1","numphases":2,"phasedata":[
            {"day":3,"month":1,"phase":"Full Moon","time":"10:03","year":2026},
            {"day":10,"month":1,"phase":"Last Quarter","time":"15:48","year":2026}]}"#;
        let source = SourceDescriptor::new(
            "usno",
            "USNO Moon Phases",
            "https://aa.usno.navy.mil/api/moon/phases/date",
            SourceKind::MoonPhases,
            Category::SkyEvent,
        );

        let events = normalize_moon_phases(body, &source, &ctx()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].title, "Full Moon");
        assert_eq!(events[0].summary, "Full Moon on 2026-01-03 at 10:03 UTC.");
        assert_eq!(events[0].category, Category::SkyEvent);
    }
}
