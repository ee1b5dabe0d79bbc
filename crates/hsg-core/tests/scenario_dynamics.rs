//! End-to-end co-activation scenario: a query over three memories drains
//! into a fully-connected triangle of waypoint edges.

use hsg_core::metadata::sqlite::SqliteMetadataStore;
use hsg_core::metadata::MetadataStore;
use hsg_core::vector_repo::embedded::EmbeddedVectorRepository;
use hsg_core::{AddMemoryRequest, Config, HsgEngine, QueryOptions};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn s6_query_coactivation_drains_into_pairwise_edges() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteMetadataStore::open(&dir.path().join("db.sqlite3")).unwrap());
    let vectors = Arc::new(EmbeddedVectorRepository::new());
    let engine = Arc::new(HsgEngine::new(Config::default(), store.clone(), vectors).unwrap());

    let m1 = engine
        .add_memory("Alice discussed the quarterly roadmap with the team.", AddMemoryRequest::default())
        .unwrap();
    let m2 = engine
        .add_memory(
            "The quarterly roadmap review happened in the main office.",
            AddMemoryRequest::default(),
        )
        .unwrap();
    let m3 = engine
        .add_memory("Quarterly roadmap planning continued into the evening.", AddMemoryRequest::default())
        .unwrap();

    let _handles = Arc::clone(&engine).spawn_background_tasks();

    let hits = engine
        .query(QueryOptions {
            text: "quarterly roadmap".into(),
            k: 3,
            ..Default::default()
        })
        .unwrap();
    let returned: BTreeSet<_> = hits.iter().map(|hit| hit.id).collect();
    assert!(returned.contains(&m1.id));
    assert!(returned.contains(&m2.id));
    assert!(returned.contains(&m3.id));

    // The drain task ticks once a second; give it a full cycle to run.
    tokio::time::sleep(Duration::from_millis(1200)).await;

    let ns: BTreeSet<String> = BTreeSet::from(["global".to_string()]);
    for (x, y) in [(m1.id, m2.id), (m1.id, m3.id), (m2.id, m3.id)] {
        let (lo, hi) = if x <= y { (x, y) } else { (y, x) };
        let edge = store.get_waypoint(lo, hi, &ns).unwrap().unwrap();
        assert!(edge.weight > 0.0 && edge.weight <= 1.0);
    }
}
