//! The search-index gateway seam and its HTTP-backed implementation.
//!
//! Lookup, clustering, and the reconciliation service all take a
//! `&dyn SearchIndexGateway` parameter rather than reaching for a
//! process-wide client, so every caller can be driven against the
//! in-memory gateway in tests.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::IndexConfig;
use crate::error::AlignError;
use crate::models::{Pass, SearchHit, SearchResponse};

/// Full-text + exact-term + geo-shape query capability.
///
/// The query engine is treated as opaque: queries are structured JSON
/// documents built by [`crate::index::query`], hits come back as raw
/// source documents with scores.
#[async_trait]
pub trait SearchIndexGateway: Send + Sync {
    /// Run a query against one index. Hits carry `Pass::External0` as a
    /// placeholder tag; callers re-tag with the pass that issued the
    /// query.
    async fn search(&self, index: &str, query: &Value) -> Result<SearchResponse, AlignError>;

    /// Index (upsert) one document under an explicit id.
    async fn index_document(&self, index: &str, id: &str, doc: &Value) -> Result<(), AlignError>;

    /// Current maximum value of a numeric field across an index; 0 when
    /// the index is empty. Used to seed the id allocator.
    async fn max_numeric_id(&self, index: &str, field: &str) -> Result<i64, AlignError>;
}

/// Elasticsearch-compatible HTTP gateway.
pub struct EsGateway {
    client: Client,
    base_url: String,
}

impl EsGateway {
    pub fn new(config: &IndexConfig) -> Result<Self, AlignError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SearchIndexGateway for EsGateway {
    async fn search(&self, index: &str, query: &Value) -> Result<SearchResponse, AlignError> {
        let url = format!("{}/{}/_search", self.base_url, index);
        debug!(%index, "index search");
        let resp = self.client.post(&url).json(query).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AlignError::Index(format!("{status}: {body}")));
        }
        let body: Value = resp.json().await?;
        parse_search_body(&body)
    }

    async fn index_document(&self, index: &str, id: &str, doc: &Value) -> Result<(), AlignError> {
        let url = format!("{}/{}/_doc/{}", self.base_url, index, id);
        let resp = self.client.put(&url).json(doc).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AlignError::Index(format!("{status}: {body}")));
        }
        Ok(())
    }

    async fn max_numeric_id(&self, index: &str, field: &str) -> Result<i64, AlignError> {
        let query = serde_json::json!({
            "size": 0,
            "aggs": { "max_id": { "max": { "field": field } } }
        });
        let url = format!("{}/{}/_search", self.base_url, index);
        let resp = self.client.post(&url).json(&query).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            return Err(AlignError::Index(format!("max_numeric_id: {status}")));
        }
        let body: Value = resp.json().await?;
        Ok(body["aggregations"]["max_id"]["value"]
            .as_f64()
            .map(|v| v as i64)
            .unwrap_or(0))
    }
}

/// Parse the standard `{"hits": {"total": .., "hits": [..]}}` envelope.
pub(crate) fn parse_search_body(body: &Value) -> Result<SearchResponse, AlignError> {
    let hits = body["hits"]["hits"]
        .as_array()
        .ok_or_else(|| AlignError::Index("malformed search response: no hits array".to_string()))?
        .iter()
        .map(|h| SearchHit {
            id: h["_id"].as_str().unwrap_or_default().to_string(),
            score: h["_score"].as_f64().unwrap_or(0.0),
            source: h["_source"].clone(),
            pass: Pass::External0,
        })
        .collect::<Vec<_>>();
    let total = body["hits"]["total"]["value"]
        .as_u64()
        .or_else(|| body["hits"]["total"].as_u64())
        .unwrap_or(hits.len() as u64);
    Ok(SearchResponse { hits, total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_standard_envelope() {
        let body = json!({
            "hits": {
                "total": {"value": 2},
                "hits": [
                    {"_id": "1", "_score": 12.0, "_source": {"title": "Abydos"}},
                    {"_id": "2", "_score": 8.0, "_source": {"title": "Abidos"}}
                ]
            }
        });
        let resp = parse_search_body(&body).unwrap();
        assert_eq!(resp.total, 2);
        assert_eq!(resp.hits[0].id, "1");
        assert_eq!(resp.hits[0].score, 12.0);
    }

    #[test]
    fn rejects_missing_hits() {
        assert!(parse_search_body(&json!({"took": 3})).is_err());
    }
}
