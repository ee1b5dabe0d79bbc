//! End-to-end query scenario: retrieval ranking and reinforcement.

mod common;

use common::harness;
use hsg_core::metadata::MetadataStore;
use hsg_core::{AddMemoryRequest, QueryOptions};
use std::collections::BTreeSet;

#[test]
fn s4_retrieval_ranks_alice_above_bob_and_reinforces_on_read() {
    let h = harness();

    let alice_1 = h
        .engine
        .add_memory("yesterday I met Alice at 10:00", AddMemoryRequest::default())
        .unwrap();
    let alice_2 = h
        .engine
        .add_memory("today I saw Alice in the cafe", AddMemoryRequest::default())
        .unwrap();
    let bob = h
        .engine
        .add_memory("Bob taught me soldering", AddMemoryRequest::default())
        .unwrap();

    let bob_feedback_before = h.store.get_memory(bob.id).unwrap().unwrap().feedback_score;

    let all_hits = h
        .engine
        .query(QueryOptions {
            text: "meeting with Alice".into(),
            k: 3,
            ..Default::default()
        })
        .unwrap();
    let alice_1_score = all_hits.iter().find(|hit| hit.id == alice_1.id).unwrap().score;
    let alice_2_score = all_hits.iter().find(|hit| hit.id == alice_2.id).unwrap().score;
    let bob_score = all_hits.iter().find(|hit| hit.id == bob.id).unwrap().score;
    assert!(alice_1_score > bob_score);
    assert!(alice_2_score > bob_score);

    let hits = h
        .engine
        .query(QueryOptions {
            text: "meeting with Alice".into(),
            k: 2,
            namespaces: BTreeSet::new(),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(hits.len(), 2);
    let returned: BTreeSet<_> = hits.iter().map(|hit| hit.id).collect();
    assert!(returned.contains(&alice_1.id));
    assert!(returned.contains(&alice_2.id));

    let now = chrono::Utc::now();
    for hit in &hits {
        let stored = h.store.get_memory(hit.id).unwrap().unwrap();
        assert!((now - stored.last_seen_at).num_seconds().abs() < 5);
    }

    let bob_feedback_after = h.store.get_memory(bob.id).unwrap().unwrap().feedback_score;
    assert_ne!(bob_feedback_before, bob_feedback_after);
}
