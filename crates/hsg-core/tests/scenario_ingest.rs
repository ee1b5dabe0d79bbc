//! End-to-end ingest scenarios: dedup, classification, waypoint anchoring.

mod common;

use common::harness;
use hsg_core::metadata::MetadataStore;
use hsg_core::model::{cosine_similarity, Sector};
use hsg_core::AddMemoryRequest;
use std::collections::BTreeSet;

#[test]
fn s1_near_duplicate_reinforces_salience_and_dedupes() {
    let h = harness();

    let first = h
        .engine
        .add_memory(
            "The mitochondrion is the powerhouse of the cell.",
            AddMemoryRequest::default(),
        )
        .unwrap();
    let first_salience = h.store.get_memory(first.id).unwrap().unwrap().salience;

    let second = h
        .engine
        .add_memory(
            "The mitochondrion is the powerhouse of the cell!",
            AddMemoryRequest::default(),
        )
        .unwrap();

    assert_eq!(second.id, first.id);
    assert!(second.deduplicated);

    let reinforced_salience = h.store.get_memory(first.id).unwrap().unwrap().salience;
    assert!(reinforced_salience >= (first_salience + 0.15).min(1.0) - 1e-9);

    let ns: BTreeSet<String> = BTreeSet::from(["global".to_string()]);
    let all = h.store.all_memory_mean_vecs(&ns).unwrap();
    assert_eq!(all.len(), 1);
}

#[test]
fn s2_procedural_content_classifies_as_procedural() {
    let h = harness();

    let outcome = h
        .engine
        .add_memory("Step 1: install. Step 2: configure. Step 3: run.", AddMemoryRequest::default())
        .unwrap();

    let memory = h.store.get_memory(outcome.id).unwrap().unwrap();
    assert_eq!(memory.primary_sector, Sector::Procedural);
    assert!(!memory.additional_sectors.contains(&Sector::Emotional));
}

#[test]
fn s3_unrelated_memories_each_get_a_self_loop_no_cross_edge() {
    let h = harness();

    let a = h
        .engine
        .add_memory(
            "The quarterly revenue report showed growth across every region.",
            AddMemoryRequest::default(),
        )
        .unwrap();
    let b = h
        .engine
        .add_memory("Bob taught me how to solder a circuit board.", AddMemoryRequest::default())
        .unwrap();
    assert_ne!(a.id, b.id);

    let mem_a = h.store.get_memory(a.id).unwrap().unwrap();
    let mem_b = h.store.get_memory(b.id).unwrap().unwrap();
    let similarity = cosine_similarity(
        mem_a.mean_vec.as_deref().unwrap_or(&[]),
        mem_b.mean_vec.as_deref().unwrap_or(&[]),
    );
    assert!((similarity as f64) < 0.75);

    let edges_a = h.store.outgoing_waypoints(a.id).unwrap();
    assert_eq!(edges_a.len(), 1);
    assert!(edges_a[0].is_self_loop());
    assert!((edges_a[0].weight - 1.0).abs() < 1e-9);

    let edges_b = h.store.outgoing_waypoints(b.id).unwrap();
    assert_eq!(edges_b.len(), 1);
    assert!(edges_b[0].is_self_loop());

    let ns: BTreeSet<String> = BTreeSet::from(["global".to_string()]);
    assert!(h.store.get_waypoint(a.id.min(b.id), a.id.max(b.id), &ns).unwrap().is_none());
}
