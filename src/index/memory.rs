//! In-memory search gateway for tests and local development.
//!
//! Interprets the subset of the query language the builders emit (`bool`,
//! `term`, `terms`, `match_phrase_prefix`, `geo_shape`, `match_all`) over
//! documents held in memory, and records every issued query so tests can
//! assert on the cascade behavior. Geo-shape filters match any document
//! that carries a `geom` field; real spatial evaluation belongs to the
//! production index.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AlignError;
use crate::models::{Pass, SearchHit, SearchResponse};

use super::gateway::SearchIndexGateway;

struct StoredDoc {
    id: String,
    source: Value,
    score: f64,
}

/// In-memory [`SearchIndexGateway`] with query recording.
#[derive(Default)]
pub struct MemoryGateway {
    docs: Mutex<HashMap<String, Vec<StoredDoc>>>,
    queries: Mutex<Vec<(String, Value)>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document with the default score 1.0.
    pub fn insert(&self, index: &str, id: &str, source: Value) {
        self.insert_scored(index, id, source, 1.0);
    }

    /// Insert a document with an explicit raw score to be reported when
    /// it matches.
    pub fn insert_scored(&self, index: &str, id: &str, source: Value, score: f64) {
        let mut docs = self.docs.lock().expect("gateway lock poisoned");
        let entry = docs.entry(index.to_string()).or_default();
        entry.retain(|d| d.id != id);
        entry.push(StoredDoc { id: id.to_string(), source, score });
    }

    /// Every `(index, query)` pair issued so far, in order.
    pub fn recorded_queries(&self) -> Vec<(String, Value)> {
        self.queries.lock().expect("gateway lock poisoned").clone()
    }

    /// Number of queries issued against one index.
    pub fn query_count(&self, index: &str) -> usize {
        self.queries
            .lock()
            .expect("gateway lock poisoned")
            .iter()
            .filter(|(i, _)| i == index)
            .count()
    }

    /// Fetch one stored document by id.
    pub fn get(&self, index: &str, id: &str) -> Option<Value> {
        self.docs
            .lock()
            .expect("gateway lock poisoned")
            .get(index)?
            .iter()
            .find(|d| d.id == id)
            .map(|d| d.source.clone())
    }
}

#[async_trait]
impl SearchIndexGateway for MemoryGateway {
    async fn search(&self, index: &str, query: &Value) -> Result<SearchResponse, AlignError> {
        self.queries
            .lock()
            .expect("gateway lock poisoned")
            .push((index.to_string(), query.clone()));

        let clause = query.get("query").cloned().unwrap_or(Value::Null);
        let docs = self.docs.lock().expect("gateway lock poisoned");
        let mut hits: Vec<SearchHit> = docs
            .get(index)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|d| eval(&clause, &d.id, &d.source))
                    .map(|d| SearchHit {
                        id: d.id.clone(),
                        score: d.score,
                        source: d.source.clone(),
                        pass: Pass::External0,
                    })
                    .collect()
            })
            .unwrap_or_default();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        let total = hits.len() as u64;
        Ok(SearchResponse { hits, total })
    }

    async fn index_document(&self, index: &str, id: &str, doc: &Value) -> Result<(), AlignError> {
        self.insert(index, id, doc.clone());
        Ok(())
    }

    async fn max_numeric_id(&self, index: &str, field: &str) -> Result<i64, AlignError> {
        let docs = self.docs.lock().expect("gateway lock poisoned");
        Ok(docs
            .get(index)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|d| d.source.get(field).and_then(Value::as_i64))
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0))
    }
}

/// Evaluate one query clause against a document.
fn eval(clause: &Value, id: &str, doc: &Value) -> bool {
    if clause.is_null() || clause.get("match_all").is_some() {
        return true;
    }
    if let Some(b) = clause.get("bool") {
        return eval_bool(b, id, doc);
    }
    if let Some(ids) = clause.get("ids") {
        return ids["values"]
            .as_array()
            .map(|vs| vs.iter().filter_map(Value::as_str).any(|v| v == id))
            .unwrap_or(false);
    }
    if let Some(m) = clause.get("multi_match") {
        let needle = m["query"].as_str().unwrap_or_default().to_lowercase();
        let fields = m["fields"]
            .as_array()
            .map(|fs| fs.iter().filter_map(Value::as_str).collect::<Vec<_>>())
            .unwrap_or_default();
        return fields.iter().any(|f| {
            field_strings(doc, f)
                .iter()
                .any(|s| s.to_lowercase() == needle)
        });
    }
    if let Some(t) = clause.get("terms") {
        return t
            .as_object()
            .and_then(|o| o.iter().next())
            .map(|(field, values)| {
                values
                    .as_array()
                    .map(|vs| vs.iter().any(|v| field_contains(doc, field, v)))
                    .unwrap_or(false)
            })
            .unwrap_or(false);
    }
    if let Some(t) = clause.get("term") {
        return t
            .as_object()
            .and_then(|o| o.iter().next())
            .map(|(field, v)| field_contains(doc, field, v))
            .unwrap_or(false);
    }
    if let Some(m) = clause.get("match_phrase_prefix") {
        return m
            .as_object()
            .and_then(|o| o.iter().next())
            .map(|(field, v)| {
                let prefix = v.as_str().unwrap_or_default().to_lowercase();
                field_strings(doc, field)
                    .iter()
                    .any(|s| s.to_lowercase().starts_with(&prefix))
            })
            .unwrap_or(false);
    }
    if clause.get("geo_shape").is_some() {
        return doc.get("geom").map(|g| !g.is_null()).unwrap_or(false);
    }
    false
}

fn eval_bool(b: &Value, id: &str, doc: &Value) -> bool {
    let all = |key: &str| -> bool {
        b.get(key)
            .and_then(Value::as_array)
            .map(|cs| cs.iter().all(|c| eval(c, id, doc)))
            .unwrap_or(true)
    };
    if !all("must") || !all("filter") {
        return false;
    }
    if let Some(nots) = b.get("must_not").and_then(Value::as_array) {
        if nots.iter().any(|c| eval(c, id, doc)) {
            return false;
        }
    }
    if let Some(shoulds) = b.get("should").and_then(Value::as_array) {
        let needed = b
            .get("minimum_should_match")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;
        if needed > 0 {
            let matched = shoulds.iter().filter(|c| eval(c, id, doc)).count();
            if matched < needed {
                return false;
            }
        }
    }
    true
}

/// Whether a document field (scalar or array) contains the given value.
fn field_contains(doc: &Value, field: &str, value: &Value) -> bool {
    match doc.get(field) {
        Some(Value::Array(items)) => items.iter().any(|i| i == value),
        Some(v) => v == value,
        None => false,
    }
}

fn field_strings(doc: &Value, field: &str) -> Vec<String> {
    match doc.get(field) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn terms_match_scalar_and_array_fields() {
        let gw = MemoryGateway::new();
        gw.insert("idx", "1", json!({"title": "Abydos", "ccodes": ["EG"]}));
        gw.insert("idx", "2", json!({"title": "Paris", "ccodes": ["FR"]}));

        let q = json!({"query": {"terms": {"ccodes": ["EG"]}}});
        let resp = gw.search("idx", &q).await.unwrap();
        assert_eq!(resp.hits.len(), 1);
        assert_eq!(resp.hits[0].id, "1");
    }

    #[tokio::test]
    async fn bool_must_not_and_should_minimum() {
        let gw = MemoryGateway::new();
        gw.insert("idx", "1", json!({"title": "A", "dataset": "geonames"}));
        gw.insert("idx", "2", json!({"title": "A", "dataset": "tgn"}));

        let q = json!({"query": {"bool": {
            "must": [{"term": {"title": "A"}}],
            "must_not": [{"term": {"dataset": "geonames"}}]
        }}});
        let resp = gw.search("idx", &q).await.unwrap();
        assert_eq!(resp.hits.len(), 1);
        assert_eq!(resp.hits[0].id, "2");
    }

    #[tokio::test]
    async fn hits_sorted_by_score_and_queries_recorded() {
        let gw = MemoryGateway::new();
        gw.insert_scored("idx", "low", json!({"title": "X"}), 2.0);
        gw.insert_scored("idx", "high", json!({"title": "X"}), 9.0);

        let q = json!({"query": {"term": {"title": "X"}}});
        let resp = gw.search("idx", &q).await.unwrap();
        assert_eq!(resp.hits[0].id, "high");
        assert_eq!(gw.query_count("idx"), 1);
    }

    #[tokio::test]
    async fn max_numeric_id_scans_field() {
        let gw = MemoryGateway::new();
        gw.insert("idx", "a", json!({"place_id": 14995001}));
        gw.insert("idx", "b", json!({"place_id": 14995007}));
        assert_eq!(gw.max_numeric_id("idx", "place_id").await.unwrap(), 14995007);
        assert_eq!(gw.max_numeric_id("empty", "place_id").await.unwrap(), 0);
    }
}
