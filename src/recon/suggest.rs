//! Prefix/typeahead lookups for entities and extendable properties.
//!
//! Both share the cursor+limit pagination contract. Entity-suggest
//! scores the full unsliced candidate set from the index first and then
//! applies the cursor as a client-side slice — the index query itself
//! carries no offset. Property-suggest filters the in-memory vocabulary
//! by prefix against display name or qualified identifier, with or
//! without the namespace.

use serde_json::{json, Value};

use crate::error::ReconError;
use crate::index::SearchIndexGateway;

use super::batch::scale_score;
use super::extend::EXTEND_PROPERTIES;

/// Default page size for suggest responses.
pub const SUGGEST_LIMIT: usize = 10;

/// Typeahead over indexed entities.
pub async fn suggest_entity(
    gateway: &dyn SearchIndexGateway,
    index: &str,
    prefix: &str,
    cursor: usize,
    limit: usize,
) -> Result<Value, ReconError> {
    let query = json!({
        "query": {
            "bool": {
                "should": [
                    {"match_phrase_prefix": {"title": prefix}},
                    {"match_phrase_prefix": {"names": prefix}}
                ],
                "minimum_should_match": 1
            }
        }
    });
    let resp = gateway
        .search(index, &query)
        .await
        .map_err(|e| ReconError::Malformed(e.to_string()))?;

    // score everything, then slice
    let max = resp.hits.first().map(|h| h.score).unwrap_or(0.0);
    let scored: Vec<Value> = resp
        .hits
        .iter()
        .map(|h| {
            json!({
                "id": h.id,
                "name": h.source.get("title").cloned().unwrap_or(Value::Null),
                "score": scale_score(h.score, max),
            })
        })
        .collect();

    let page: Vec<Value> = scored.into_iter().skip(cursor).take(limit).collect();
    Ok(json!({"result": page}))
}

/// Typeahead over the extend property vocabulary.
pub fn suggest_property(prefix: &str, cursor: usize, limit: usize) -> Value {
    let needle = prefix.trim().to_lowercase();
    let matches: Vec<Value> = EXTEND_PROPERTIES
        .iter()
        .filter(|p| {
            let bare = p.id.split_once(':').map(|(_, rest)| rest).unwrap_or(p.id);
            needle.is_empty()
                || p.name.to_lowercase().starts_with(&needle)
                || p.id.to_lowercase().starts_with(&needle)
                || bare.to_lowercase().starts_with(&needle)
        })
        .map(|p| json!({"id": p.id, "name": p.name}))
        .skip(cursor)
        .take(limit)
        .collect();
    json!({"result": matches})
}
