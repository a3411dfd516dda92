//! End-to-end alignment runs against the in-memory gateway: cascade
//! behavior, review-row ordering, flag transitions, and seeding.

use serde_json::json;

use gazetteer::align::{run_external, run_merged, ExternalRunSpec, MergedRunSpec};
use gazetteer::index::{AtomicSeedAllocator, MemoryGateway};
use gazetteer::models::{Place, PlaceLink, PlaceName, ReviewState};
use gazetteer::review::MemoryReviewSink;

fn place(id: i64, title: &str, links: Vec<(&str, &str)>) -> Place {
    Place {
        id,
        title: title.to_string(),
        src_id: format!("src{id}"),
        dataset: "demo".to_string(),
        ccodes: vec!["EG".to_string()],
        fclasses: vec!["P".to_string()],
        names: vec![PlaceName { toponym: title.to_string(), lang: Some("en".to_string()) }],
        types: vec![],
        links: links
            .into_iter()
            .map(|(a, i)| PlaceLink { authority: a.to_string(), identifier: i.to_string() })
            .collect(),
        geoms: vec![],
        minmax: None,
    }
}

fn external_spec() -> ExternalRunSpec {
    ExternalRunSpec {
        authority: "wd".to_string(),
        index: "combined".to_string(),
        exclude_contributor: None,
        lang: "en".to_string(),
        default_lang: "en".to_string(),
        area_hull: None,
    }
}

#[tokio::test]
async fn external_run_writes_rows_in_place_iteration_order() {
    let gw = MemoryGateway::new();
    for (doc_id, title, link) in [
        ("d1", "Abydos", "wd:Q1"),
        ("d2", "Memphis", "wd:Q2"),
        ("d3", "Thebes", "wd:Q3"),
    ] {
        gw.insert(
            "combined",
            doc_id,
            json!({
                "authrecord_id": doc_id,
                "dataset": "wd",
                "names": [{"toponym": title, "lang": "en"}],
                "links": [link],
                "ccodes": ["EG"]
            }),
        );
    }
    let sink = MemoryReviewSink::new();
    let places = vec![
        place(1, "Abydos", vec![("wd", "Q1")]),
        place(2, "Memphis", vec![("wd", "Q2")]),
        place(3, "Thebes", vec![("wd", "Q3")]),
    ];

    let summary = run_external(&gw, &sink, "demo", &places, &external_spec())
        .await
        .unwrap();

    assert_eq!(summary.matched, 3);
    assert_eq!(summary.rows_written, 3);
    let rows = sink.rows.lock().unwrap();
    let order: Vec<i64> = rows.iter().map(|r| r.place_id).collect();
    assert_eq!(order, vec![1, 2, 3]);
    assert!(rows.iter().all(|r| r.query_pass == "pass0"));

    let states = sink.states.lock().unwrap();
    assert_eq!(states.len(), 3);
    assert!(states
        .iter()
        .all(|(_, auth, s)| auth == "wd" && *s == ReviewState::Unreviewed));
}

#[tokio::test]
async fn external_run_skips_places_with_no_candidates() {
    let gw = MemoryGateway::new();
    let sink = MemoryReviewSink::new();
    let places = vec![place(1, "Nowhere", vec![])];

    let summary = run_external(&gw, &sink, "demo", &places, &external_spec())
        .await
        .unwrap();
    assert_eq!(summary.matched, 0);
    assert_eq!(sink.row_count(), 0);
    // no hits means no flag transition either
    assert!(sink.states.lock().unwrap().is_empty());
}

#[tokio::test]
async fn merged_run_seeds_unmatched_and_reviews_matched() {
    let gw = MemoryGateway::new();
    // one parent with a child, matched via links by place 1
    gw.insert(
        "places",
        "900",
        json!({
            "whg_id": 900,
            "title": "Abydos",
            "dataset": "whg",
            "links": ["wd:Q1"],
            "relation": {"name": "parent"},
            "children": ["901"],
            "ccodes": ["EG"]
        }),
    );
    gw.insert(
        "places",
        "901",
        json!({
            "title": "Abdju",
            "dataset": "idai",
            "links": [],
            "relation": {"name": "child", "parent": "900"}
        }),
    );

    let sink = MemoryReviewSink::new();
    let alloc = AtomicSeedAllocator::starting_at(1000);
    let places = vec![
        place(1, "Abydos", vec![("wd", "Q1")]),
        place(2, "Unmatchable", vec![]),
    ];
    let spec = MergedRunSpec { index: "places".to_string(), area_hull: None };

    let summary = run_merged(&gw, &alloc, &sink, "demo", &places, &spec)
        .await
        .unwrap();

    assert_eq!(summary.matched, 1);
    assert_eq!(summary.seeded, 1);
    assert_eq!(summary.missed.len(), 1);
    assert_eq!(summary.missed[0].place_id, 2);
    assert_eq!(summary.missed[0].title, "Unmatchable");

    // one review row for the matched place's single parent cluster
    let rows = sink.rows.lock().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].place_id, 1);
    assert_eq!(rows[0].authrecord_id, "900");
    assert_eq!(rows[0].authority, "whg");

    // the unmatched place was promoted under the allocated id and marked
    // indexed, bypassing review
    let indexed = sink.indexed.lock().unwrap();
    assert_eq!(indexed.as_slice(), &[(2, 1000)]);
    let seed = gw.get("places", "1000").unwrap();
    assert_eq!(seed["relation"]["name"], "parent");
    assert_eq!(seed["place_id"], 2);

    // only the matched place flipped to unreviewed
    let states = sink.states.lock().unwrap();
    assert_eq!(states.len(), 1);
    assert_eq!(states[0], (1, "whg".to_string(), ReviewState::Unreviewed));
}

#[tokio::test]
async fn merged_cluster_row_score_sums_parent_and_children() {
    let gw = MemoryGateway::new();
    gw.insert_scored(
        "places",
        "10",
        json!({
            "title": "Abydos",
            "dataset": "whg",
            "links": ["wd:Q1"],
            "relation": {"name": "parent"},
            "children": ["11"]
        }),
        5.0,
    );
    gw.insert_scored(
        "places",
        "11",
        json!({
            "title": "Abdju",
            "dataset": "idai",
            "links": ["wd:Q1"],
            "relation": {"name": "child", "parent": "10"}
        }),
        2.0,
    );

    let sink = MemoryReviewSink::new();
    let alloc = AtomicSeedAllocator::starting_at(1);
    let places = vec![place(1, "Abydos", vec![("wd", "Q1")])];
    let spec = MergedRunSpec { index: "places".to_string(), area_hull: None };

    run_merged(&gw, &alloc, &sink, "demo", &places, &spec)
        .await
        .unwrap();

    let rows = sink.rows.lock().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].score, 7.0);
    let cluster = &rows[0].json;
    assert_eq!(cluster["titles"], json!(["Abydos", "Abdju"]));
    assert_eq!(cluster["sources"].as_array().unwrap().len(), 2);
}
