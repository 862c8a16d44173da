// dropscout-core/tests/differ_tests.rs

use dropscout_core::differ::diff;
use dropscout_core::models::CampaignRecord;
use dropscout_core::stores::{Snapshot, SnapshotEntry};

fn campaign(id: &str, status: &str) -> CampaignRecord {
    CampaignRecord {
        id: id.to_string(),
        name: format!("Campaign {id}"),
        status: status.to_string(),
        game_name: None,
        game_slug: None,
        game_box_art: None,
        starts_at: None,
        ends_at: None,
        benefits: vec![],
    }
}

fn snapshot(entries: &[(&str, &str)]) -> Snapshot {
    entries
        .iter()
        .map(|(id, status)| {
            (
                id.to_string(),
                SnapshotEntry {
                    id: id.to_string(),
                    status: status.to_string(),
                    ..Default::default()
                },
            )
        })
        .collect()
}

#[test]
fn cold_start_produces_no_activations() {
    let prev = Snapshot::new();
    let curr = vec![campaign("a", "ACTIVE"), campaign("b", "ACTIVE")];
    assert!(diff(&prev, &curr).activated.is_empty());
}

#[test]
fn only_known_non_active_campaigns_activate() {
    let prev = snapshot(&[("a", "UPCOMING")]);
    let curr = vec![campaign("a", "ACTIVE"), campaign("b", "ACTIVE")];
    let result = diff(&prev, &curr);
    assert_eq!(result.activated.len(), 1);
    assert_eq!(result.activated[0].id, "a");
}

#[test]
fn already_active_campaigns_do_not_reactivate() {
    let prev = snapshot(&[("a", "ACTIVE")]);
    let curr = vec![campaign("a", "ACTIVE")];
    assert!(diff(&prev, &curr).activated.is_empty());
}

#[test]
fn non_active_current_status_never_activates() {
    let prev = snapshot(&[("a", "UPCOMING")]);
    let curr = vec![campaign("a", "EXPIRED")];
    assert!(diff(&prev, &curr).activated.is_empty());
}

#[test]
fn blank_previous_status_does_not_activate() {
    let prev = snapshot(&[("a", "")]);
    let curr = vec![campaign("a", "ACTIVE")];
    assert!(diff(&prev, &curr).activated.is_empty());
}

#[test]
fn diff_is_deterministic_and_preserves_input_order() {
    let prev = snapshot(&[("a", "UPCOMING"), ("b", "EXPIRED"), ("c", "ACTIVE")]);
    let curr = vec![
        campaign("b", "ACTIVE"),
        campaign("c", "ACTIVE"),
        campaign("a", "ACTIVE"),
    ];
    let first = diff(&prev, &curr);
    let second = diff(&prev, &curr);
    let ids: Vec<&str> = first.activated.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
    assert_eq!(first.activated, second.activated);
}
