//! Reconciliation protocol behavior: batch ceiling, scoring, exact-match
//! flagging, and per-query error isolation.

use serde_json::{json, Map};

use gazetteer::index::MemoryGateway;
use gazetteer::recon::run_batch;

fn abydos_gateway() -> MemoryGateway {
    let gw = MemoryGateway::new();
    gw.insert_scored(
        "places",
        "1",
        json!({
            "title": "Abydos",
            "dataset": "idai",
            "names": [{"toponym": "Abydos", "lang": "en"}],
            "searchy": ["Abydos"],
            "ccodes": ["EG"]
        }),
        12.0,
    );
    gw.insert_scored(
        "places",
        "2",
        json!({
            "title": "Abidos",
            "dataset": "idai",
            "names": [{"toponym": "Abidos", "lang": "en"}],
            "searchy": ["Abydos", "Abidos"],
            "ccodes": ["EG"]
        }),
        8.0,
    );
    gw
}

#[tokio::test]
async fn exact_hit_scores_100_and_flags_match() {
    let gw = abydos_gateway();
    let mut queries = Map::new();
    queries.insert("q0".to_string(), json!({"query": "Abydos"}));

    let out = run_batch(&gw, "places", "en", &queries, 50).await;
    let result = out["q0"]["result"].as_array().unwrap();
    assert_eq!(result.len(), 2);

    assert_eq!(result[0]["name"], "Abydos");
    assert_eq!(result[0]["score"], 100);
    assert_eq!(result[0]["match"], true);

    assert_eq!(result[1]["name"], "Abidos");
    assert_eq!(result[1]["score"], 67);
    assert_eq!(result[1]["match"], false);
}

#[tokio::test]
async fn dropped_top_hit_still_anchors_the_batch_maximum() {
    let gw = abydos_gateway();
    // Highest-scoring document carries neither a title nor a name list,
    // so it drops during normalization — but its raw score remains the
    // batch maximum.
    gw.insert_scored(
        "places",
        "broken",
        json!({"dataset": "idai", "searchy": ["Abydos"]}),
        16.0,
    );

    let mut queries = Map::new();
    queries.insert("q0".to_string(), json!({"query": "Abydos"}));
    let out = run_batch(&gw, "places", "en", &queries, 50).await;

    let result = out["q0"]["result"].as_array().unwrap();
    assert_eq!(result.len(), 2);
    // best survivor scores against the dropped hit's 16.0, not itself
    assert_eq!(result[0]["name"], "Abydos");
    assert_eq!(result[0]["score"], 75);
    assert_eq!(result[1]["score"], 50);
}

#[tokio::test]
async fn match_flag_is_unicode_case_insensitive() {
    let gw = MemoryGateway::new();
    gw.insert_scored(
        "places",
        "1",
        json!({
            "title": "Köln",
            "dataset": "idai",
            "names": [{"toponym": "Köln", "lang": "de"}],
            "searchy": ["köln"]
        }),
        9.0,
    );

    let mut queries = Map::new();
    queries.insert("q0".to_string(), json!({"query": "köln"}));
    let out = run_batch(&gw, "places", "en", &queries, 50).await;

    let result = out["q0"]["result"].as_array().unwrap();
    assert_eq!(result[0]["name"], "Köln");
    assert_eq!(result[0]["match"], true);
}

#[tokio::test]
async fn batch_over_ceiling_processes_first_fifty_with_message() {
    let gw = abydos_gateway();
    let mut queries = Map::new();
    for i in 0..60 {
        queries.insert(format!("q{i}"), json!({"query": "Abydos"}));
    }

    let out = run_batch(&gw, "places", "en", &queries, 50).await;
    let obj = out.as_object().unwrap();

    for i in 0..50 {
        assert!(obj.contains_key(&format!("q{i}")), "q{i} missing");
        assert!(obj[&format!("q{i}")].get("error").is_none());
    }
    for i in 50..60 {
        assert!(!obj.contains_key(&format!("q{i}")), "q{i} should be dropped");
    }
    let message = obj["message"].as_str().unwrap();
    assert!(message.contains("60"));
    assert!(message.contains("50"));
}

#[tokio::test]
async fn invalid_query_fails_alone_without_aborting_the_batch() {
    let gw = abydos_gateway();
    let mut queries = Map::new();
    queries.insert("good".to_string(), json!({"query": "Abydos"}));
    queries.insert("empty".to_string(), json!({}));
    queries.insert("badclass".to_string(), json!({"query": "Abydos", "fclasses": ["Q"]}));
    queries.insert("also_good".to_string(), json!({"query": "Abidos"}));

    let out = run_batch(&gw, "places", "en", &queries, 50).await;

    assert!(!out["good"]["result"].as_array().unwrap().is_empty());
    assert!(!out["also_good"]["result"].as_array().unwrap().is_empty());

    assert!(out["empty"]["result"].as_array().unwrap().is_empty());
    assert!(out["empty"]["error"]
        .as_str()
        .unwrap()
        .contains("free text"));

    let class_err = out["badclass"]["error"].as_str().unwrap();
    assert!(class_err.contains('Q'));
    assert!(class_err.contains("allowed"));
}

#[tokio::test]
async fn dataset_filter_restricts_results() {
    let gw = abydos_gateway();
    gw.insert_scored(
        "places",
        "3",
        json!({
            "title": "Abydos",
            "dataset": "other",
            "names": [{"toponym": "Abydos", "lang": "en"}],
            "searchy": ["Abydos"]
        }),
        10.0,
    );
    let mut queries = Map::new();
    queries.insert(
        "q0".to_string(),
        json!({"query": "Abydos", "dataset": "other"}),
    );

    let out = run_batch(&gw, "places", "en", &queries, 50).await;
    let result = out["q0"]["result"].as_array().unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0]["id"], "3");
}

#[tokio::test]
async fn nearby_circle_limits_to_documents_with_geometry() {
    let gw = MemoryGateway::new();
    gw.insert(
        "places",
        "with-geom",
        json!({
            "title": "Abydos",
            "names": [{"toponym": "Abydos", "lang": "en"}],
            "geom": {"type": "Point", "coordinates": [31.9, 26.2]}
        }),
    );
    gw.insert(
        "places",
        "without-geom",
        json!({
            "title": "Abydos",
            "names": [{"toponym": "Abydos", "lang": "en"}]
        }),
    );

    let mut queries = Map::new();
    queries.insert(
        "q0".to_string(),
        json!({"query": "Abydos", "nearby": {"lat": 26.2, "lng": 31.9, "radius_km": 25.0}}),
    );
    let out = run_batch(&gw, "places", "en", &queries, 50).await;
    let result = out["q0"]["result"].as_array().unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0]["id"], "with-geom");
}
