//! Safety Policy Integration Tests
//!
//! Tests for draft validation and repair against real-looking events.

use chrono::{TimeZone, Utc};
use skywatch::core::safety::PROVISIONAL_NOTICE;
use skywatch::core::{repair, validate, PolicyViolation};
use skywatch::domain::{sample_event, sample_events, Category, Event, EventType, Variant};

fn launch_event(summary: &str) -> Event {
    Event::new(
        "Spaceflight Now",
        Category::Launch,
        EventType::Rss,
        "Falcon 9 to launch Starlink batch",
        "https://spaceflightnow.com/2026/02/02/falcon-9-starlink/",
        Utc.with_ymd_and_hms(2026, 2, 2, 8, 0, 0).unwrap(),
    )
    .with_summary(summary)
}

#[test]
fn test_net_propagation() {
    let event = sample_event("sample-1").unwrap();
    let draft = "Big week for the launch team: the launch pad is busy. #Artemis";

    let report = validate(draft, Variant::Medium, &event);
    assert!(report.issues.contains(&PolicyViolation::MissingProvisionalLanguage));

    let fixed = repair(draft, Variant::Medium, &event);

    // Every "launch" carries the marker
    assert_eq!(fixed.matches("launch").count(), fixed.matches("launch (NET)").count());
    assert!(fixed.contains("launch (NET) team"));
    assert!(fixed.contains("launch (NET) pad"));
    assert!(validate(&fixed, Variant::Medium, &event).valid);
}

#[test]
fn test_net_notice_without_launch_word() {
    let event = sample_event("sample-1").unwrap();
    let fixed = repair("Stacking continues in the VAB.", Variant::ShipVoice, &event);

    assert!(fixed.contains(PROVISIONAL_NOTICE));
    assert!(validate(&fixed, Variant::ShipVoice, &event).valid);
}

#[test]
fn test_confirmation_claim_rejected() {
    let event = launch_event("Liftoff is planned for Tuesday morning.");
    let draft = "Launch confirmed for Tuesday";

    let report = validate(draft, Variant::Short, &event);
    assert_eq!(
        report.issues,
        vec![
            PolicyViolation::MissingSourceAttribution,
            PolicyViolation::UnverifiedConfirmation,
        ]
    );

    let fixed = repair(draft, Variant::Short, &event);
    assert!(fixed.starts_with("Launch reported for Tuesday"));
    assert!(validate(&fixed, Variant::Short, &event).valid);
}

#[test]
fn test_official_claim_softened() {
    let event = launch_event("Liftoff is planned for Tuesday morning.");
    let fixed = repair("It's official: Starlink flies Tuesday.", Variant::Short, &event);

    assert!(fixed.starts_with("It's announced: Starlink flies Tuesday."));
    assert!(!validate(&fixed, Variant::Short, &event)
        .issues
        .contains(&PolicyViolation::UnverifiedConfirmation));
}

#[test]
fn test_repair_is_sound_and_idempotent() {
    let drafts = [
        "",
        "Launch confirmed!",
        "Official news from orbit #Space",
        "The launch window is open. Source: somewhere",
        "Nothing to see here",
        "CONFIRMED: the official launch happens now #Launch #Space",
    ];

    let mut events = sample_events();
    events.push(launch_event("Window opens at 08:00 UTC."));

    for event in &events {
        for variant in Variant::ALL {
            for draft in drafts {
                let once = repair(draft, variant, event);
                let report = validate(&once, variant, event);
                assert!(
                    report.valid,
                    "repair of {:?} for {} ({}) still fails: {:?}\n{}",
                    draft,
                    event.id,
                    variant.as_str(),
                    report.messages(),
                    once
                );

                let twice = repair(&once, variant, event);
                assert_eq!(once, twice, "repair not idempotent for {:?} on {}", draft, event.id);
            }
        }
    }
}

const SOURCES: &[&str] = &[
    "NASA",
    "Spaceflight Now",
    "Launch Window Weekly",
    "Net News",
    "Confirmed Space",
    "#Space Daily",
    "",
    "Fi",
    "to",
    "A",
    "Subject",
];

const TITLES: &[&str] = &[
    "Falcon 9 launch window opens",
    "Crew confirmed for Artemis II",
    "Official rollout date set",
    "Full moon tonight",
    "Starship NET March",
];

const URLS: &[&str] = &[
    "",
    "https://spaceflightnow.com/a",
    "https://example.com/official-launch-window",
];

const FRAGMENTS: &[&str] = &[
    "Launch confirmed for Tuesday.",
    "It is official!",
    "CONFIRMED: crew named.",
    "The launch window opens at 08:00 UTC.",
    "Liftoff NET Friday.",
    "Rocket rolls out.",
    "Source: somewhere",
    "https://other.example/launch-confirmed",
    "#Space #Launch",
    "",
];

fn pick<'a>(rng: &mut fastrand::Rng, items: &[&'a str]) -> &'a str {
    items[rng.usize(..items.len())]
}

#[test]
fn test_repair_sound_for_random_combinations() {
    let mut rng = fastrand::Rng::with_seed(0x5eed_2026);

    for case in 0..3000 {
        let source = pick(&mut rng, SOURCES);
        let url = pick(&mut rng, URLS);
        let event = Event::new(
            source,
            Category::Launch,
            EventType::Rss,
            pick(&mut rng, TITLES),
            url,
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        )
        .with_summary(pick(&mut rng, TITLES));

        let mut parts: Vec<String> = (0..rng.usize(1..=4))
            .map(|_| pick(&mut rng, FRAGMENTS).to_string())
            .collect();
        if rng.bool() {
            parts.push(format!("via {}", source));
        }
        if rng.bool() && !url.is_empty() {
            parts.push(url.to_string());
        }
        let draft = parts.join(" ");

        for variant in Variant::ALL {
            let once = repair(&draft, variant, &event);
            let report = validate(&once, variant, &event);
            assert!(
                report.valid,
                "case {}: {:?} from {:?} ({}) still fails: {:?}\n{}",
                case,
                draft,
                source,
                variant.as_str(),
                report.messages(),
                once
            );
            assert_eq!(once, repair(&once, variant, &event), "case {} not idempotent", case);
        }
    }
}

#[test]
fn test_short_source_names_match_whole_words() {
    let event = launch_event("Liftoff is planned for Tuesday.");
    let fi = Event { source: "Fi".to_string(), ..event.clone() };
    let report = validate("It is official: launch Tuesday via Fi", Variant::Short, &fi);
    assert!(report.issues.contains(&PolicyViolation::UnverifiedConfirmation));

    let to = Event { source: "to".to_string(), ..launch_event("Launch window opens Friday.") };
    let fixed = repair("Rocket rolls out", Variant::Short, &to);
    assert_eq!(fixed, format!("Rocket rolls out\n\n{}", PROVISIONAL_NOTICE));
    assert!(validate(&fixed, Variant::Short, &to).valid);
}

#[test]
fn test_valid_draft_untouched() {
    let event = launch_event("Liftoff is planned for Tuesday morning.");
    let draft = format!(
        "Falcon 9 lifts another Starlink batch Tuesday. Source: Spaceflight Now\n{}",
        event.url
    );

    assert!(validate(&draft, Variant::Medium, &event).valid);
    assert_eq!(repair(&draft, Variant::Medium, &event), draft);
}
