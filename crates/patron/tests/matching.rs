use rand::rngs::StdRng;
use rand::SeedableRng;

use patron::donor::read_donors;
use patron::event::read_events_json;
use patron::matcher::match_event;
use patron::PatronError;

const DONORS: &str = "\
name,age,primary_cause,preferred_channel
First,30,Education,Email
Second,31,Health,SMS
Third,32,Education,Phone
Fourth,33,EDUCATION,Email
Fifth,34,Arts,Email
";

const EVENTS: &str = r#"[
  {"event_id": "edu", "title": "Scholarship Dinner", "cause": "education"},
  {"event_id": "art", "title": "Gallery Night", "cause": "Arts"}
]"#;

fn names(picked: &[&patron::donor::Donor]) -> Vec<String> {
    picked.iter().map(|d| d.name.clone()).collect()
}

#[test]
fn test_exact_matches_without_fill() {
    let donors = read_donors(DONORS.as_bytes(), "donors.csv").unwrap();
    let events = read_events_json(EVENTS.as_bytes(), "events.json").unwrap();
    let mut rng = StdRng::seed_from_u64(0);

    let (event, picked) = match_event(&events, "edu", &donors, 2, &mut rng).unwrap();
    assert_eq!(event.title, "Scholarship Dinner");
    assert_eq!(names(&picked), vec!["First", "Third"]);

    let (_, picked) = match_event(&events, "edu", &donors, 3, &mut rng).unwrap();
    assert_eq!(names(&picked), vec!["First", "Third", "Fourth"]);
}

#[test]
fn test_fill_comes_after_matches_and_never_repeats() {
    let donors = read_donors(DONORS.as_bytes(), "donors.csv").unwrap();
    let events = read_events_json(EVENTS.as_bytes(), "events.json").unwrap();

    for seed in 0..20 {
        let mut rng = StdRng::seed_from_u64(seed);
        let (_, picked) = match_event(&events, "art", &donors, 4, &mut rng).unwrap();

        assert_eq!(picked.len(), 4);
        assert_eq!(picked[0].name, "Fifth");
        let mut ids: Vec<u64> = picked.iter().map(|d| d.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }
}

#[test]
fn test_same_seed_same_selection() {
    let donors = read_donors(DONORS.as_bytes(), "donors.csv").unwrap();
    let events = read_events_json(EVENTS.as_bytes(), "events.json").unwrap();

    let (_, a) = match_event(&events, "art", &donors, 3, &mut StdRng::seed_from_u64(99)).unwrap();
    let (_, b) = match_event(&events, "art", &donors, 3, &mut StdRng::seed_from_u64(99)).unwrap();
    assert_eq!(names(&a), names(&b));
}

#[test]
fn test_unknown_event() {
    let donors = read_donors(DONORS.as_bytes(), "donors.csv").unwrap();
    let events = read_events_json(EVENTS.as_bytes(), "events.json").unwrap();
    let mut rng = StdRng::seed_from_u64(0);

    let err = match_event(&events, "missing", &donors, 2, &mut rng).unwrap_err();
    assert_eq!(err.to_string(), "Event id missing not found");
    assert!(matches!(err, PatronError::EventNotFound { .. }));
}
