//! Batch query processing: ceiling enforcement, per-query execution,
//! score scaling, and exact-match flagging.

use serde_json::{json, Map, Value};
use tracing::warn;

use crate::index::SearchIndexGateway;
use crate::normalize::SourceVariant;

use super::validate::{to_index_query, validate, ReconQuery};

/// Scale a raw index score against the batch maximum to an integer
/// 0–100. A zero (or absent) maximum scores everything 0.
pub fn scale_score(raw: f64, max: f64) -> i64 {
    if max <= 0.0 {
        0
    } else {
        (raw / max * 100.0).round() as i64
    }
}

/// Process one batch of independently keyed queries.
///
/// At most `ceiling` queries are processed, in insertion order; any
/// excess is silently dropped from processing and reported through an
/// explanatory `message` on the response — not an error. A failure
/// inside one query yields a structured error payload for that key and
/// never aborts the batch.
pub async fn run_batch(
    gateway: &dyn SearchIndexGateway,
    index: &str,
    default_lang: &str,
    queries: &Map<String, Value>,
    ceiling: usize,
) -> Value {
    let mut response = Map::new();

    for (key, raw) in queries.iter().take(ceiling) {
        let result = run_one(gateway, index, default_lang, raw).await;
        response.insert(key.clone(), result);
    }

    if queries.len() > ceiling {
        warn!(
            submitted = queries.len(),
            ceiling, "batch over ceiling; excess queries dropped"
        );
        response.insert(
            "message".to_string(),
            json!(format!(
                "batch of {} exceeded the {} query ceiling; only the first {} were processed",
                queries.len(),
                ceiling,
                ceiling
            )),
        );
    }

    Value::Object(response)
}

async fn run_one(
    gateway: &dyn SearchIndexGateway,
    index: &str,
    default_lang: &str,
    raw: &Value,
) -> Value {
    let parsed: ReconQuery = match serde_json::from_value(raw.clone()) {
        Ok(q) => q,
        Err(e) => return error_payload(&format!("malformed query payload: {e}")),
    };
    let validated = match validate(&parsed) {
        Ok(v) => v,
        Err(e) => return error_payload(&e.to_string()),
    };

    let resp = match gateway.search(index, &to_index_query(&validated)).await {
        Ok(r) => r,
        Err(e) => return error_payload(&e.to_string()),
    };

    let variant = SourceVariant::ExternalCombined {
        lang: default_lang.to_string(),
        default_lang: default_lang.to_string(),
    };
    // the batch maximum is the top raw hit's score, fixed before
    // normalization so a dropped top hit still anchors the scale
    let max = resp.hits.first().map(|h| h.score).unwrap_or(0.0);
    // recon serves merged-index documents; fall back to the merged shape
    // for documents without a name list
    let records: Vec<_> = resp
        .hits
        .iter()
        .take(validated.limit)
        .filter_map(|h| {
            variant
                .normalize(h)
                .or_else(|_| SourceVariant::MergedIndex.normalize(h))
                .ok()
                .map(|r| (h.id.clone(), r))
        })
        .collect();
    let result: Vec<Value> = records
        .iter()
        .map(|(doc_id, record)| {
            let exact = validated
                .text
                .as_deref()
                .map(|t| t.to_lowercase() == record.title.to_lowercase())
                .unwrap_or(false);
            json!({
                "id": doc_id,
                "name": record.title,
                "score": scale_score(record.score, max),
                "match": exact,
                "type": record.types.iter().map(|t| json!({"id": t, "name": t})).collect::<Vec<_>>(),
            })
        })
        .collect();

    json!({"result": result})
}

fn error_payload(message: &str) -> Value {
    json!({"result": [], "error": message})
}
