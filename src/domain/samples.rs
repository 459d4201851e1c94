//! Fixed sample events served while the real store is empty.
//!
//! These are never inserted into an event store. Responses that contain them
//! carry `usingCache: true` so callers can tell them apart from live data.

use chrono::{DateTime, TimeZone, Utc};

use super::event::{Category, Event, EventType};

/// The documented fallback list, newest first.
///
/// | id | category | title |
/// |----|----------|-------|
/// | sample-1 | artemis | SLS Rocket Preparations Advance |
/// | sample-2 | official | NASA Selects Instruments for Lunar Surface Science |
/// | sample-3 | launch | Crew Rotation Mission Launch Window Opens |
/// | sample-4 | sky_event | Full Moon |
pub fn sample_events() -> Vec<Event> {
    let created = at(2026, 1, 1, 0, 0, 0);

    vec![
        Event::new(
            "NASA Artemis Blog",
            Category::Artemis,
            EventType::Rss,
            "SLS Rocket Preparations Advance",
            "https://www.nasa.gov/blogs/missions/2026/01/15/sls-rocket-preparations-advance/",
            at(2026, 1, 15, 14, 0, 0),
        )
        .with_id("sample-1")
        .with_source_url("https://www.nasa.gov/blogs/missions/feed/")
        .with_summary(
            "Teams at Kennedy Space Center continue stacking operations on the Space Launch \
             System rocket ahead of the Artemis II crewed lunar flyby mission NET 2026.",
        )
        .with_created_at(created),
        Event::new(
            "NASA News Releases",
            Category::Official,
            EventType::Rss,
            "NASA Selects Instruments for Lunar Surface Science",
            "https://www.nasa.gov/news-release/nasa-selects-instruments-for-lunar-surface-science/",
            at(2026, 1, 12, 18, 30, 0),
        )
        .with_id("sample-2")
        .with_source_url("https://www.nasa.gov/news-release/feed/")
        .with_summary(
            "The agency selected three science instruments to fly to the lunar south pole \
             region on future commercial deliveries.",
        )
        .with_created_at(created),
        Event::new(
            "Spaceflight Now",
            Category::Launch,
            EventType::Rss,
            "Crew Rotation Mission Launch Window Opens",
            "https://spaceflightnow.com/2026/01/10/crew-rotation-launch-window/",
            at(2026, 1, 10, 9, 15, 0),
        )
        .with_id("sample-3")
        .with_source_url("https://spaceflightnow.com/feed/")
        .with_summary(
            "The launch window for the next crew rotation flight to the International Space \
             Station opens next week, subject to change pending weather.",
        )
        .with_created_at(created),
        Event::new(
            "USNO Moon Phases",
            Category::SkyEvent,
            EventType::Ephemeris,
            "Full Moon",
            "",
            at(2026, 1, 3, 10, 3, 0),
        )
        .with_id("sample-4")
        .with_source_url("https://aa.usno.navy.mil/api/moon/phases/date")
        .with_summary("Full Moon on 2026-01-03 at 10:03 UTC.")
        .with_created_at(created),
    ]
}

/// Fixed UTC timestamp; the literals below are all valid
fn at(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
        .single()
        .unwrap_or_default()
}

/// Look up one sample event by id
pub fn sample_event(id: &str) -> Option<Event> {
    sample_events().into_iter().find(|e| e.id == id)
}
