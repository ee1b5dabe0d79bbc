//! End-to-end decay scenario: salience decay, vector/summary compression.

mod common;

use common::harness;
use chrono::{Duration as ChronoDuration, Utc};
use hsg_core::metadata::MetadataStore;
use hsg_core::AddMemoryRequest;

#[test]
fn s5_cold_memory_decays_salience_and_fingerprints() {
    let h = harness();

    let outcome = h
        .engine
        .add_memory(
            "The annual budget meeting covered revenue, staffing, and the new product line.",
            AddMemoryRequest::default(),
        )
        .unwrap();

    let mut memory = h.store.get_memory(outcome.id).unwrap().unwrap();
    memory.last_seen_at = Utc::now() - ChronoDuration::days(400);
    memory.salience = 0.5;
    h.store.replace_memory(&memory).unwrap();

    let outcome = h.engine.run_decay().unwrap();
    assert_eq!(outcome.processed, 1);
    assert_eq!(outcome.decayed, 1);

    let decayed = h.store.get_memory(memory.id).unwrap().unwrap();
    assert!(decayed.salience < 0.5);
    assert_eq!(decayed.mean_dim, Some(32));
    assert_eq!(decayed.mean_vec.as_ref().map(Vec::len), Some(32));

    let words: Vec<&str> = decayed.essence.split_whitespace().collect();
    assert!(!words.is_empty() && words.len() <= 3);
}
