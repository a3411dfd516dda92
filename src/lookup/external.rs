//! External-authority lookup: pass 0 (exact identifiers), pass 1 (name +
//! type boost + spatial), pass 2 (feature-class relaxation). The first
//! non-empty tier wins and later passes are never issued.

use tracing::debug;

use crate::error::AlignError;
use crate::index::query::{external_ids, external_relaxed, QueryOptions};
use crate::index::SearchIndexGateway;
use crate::models::{CandidateQuery, Pass, SearchHit};

/// Parameters for one external-authority lookup.
#[derive(Debug, Clone)]
pub struct ExternalLookup {
    /// Index holding the authority's records.
    pub index: String,
    /// Authority slug (`wd`, `tgn`, …).
    pub authority: String,
    /// Dataset-level flag excluding one lower-quality source contributor
    /// from every pass.
    pub exclude_contributor: Option<String>,
}

impl ExternalLookup {
    fn query_options(&self) -> QueryOptions {
        QueryOptions {
            authority: self.authority.clone(),
            exclude_contributor: self.exclude_contributor.clone(),
        }
    }
}

/// Run the cascade for one place. Returns the hits of the first
/// non-empty tier, tagged with the pass that produced them; an empty
/// vector means all tiers came back empty.
pub async fn lookup_external(
    gateway: &dyn SearchIndexGateway,
    cq: &CandidateQuery,
    lookup: &ExternalLookup,
) -> Result<Vec<SearchHit>, AlignError> {
    let opts = lookup.query_options();

    if let Some(q) = external_ids(cq, &opts) {
        let resp = gateway.search(&lookup.index, &q).await?;
        if !resp.hits.is_empty() {
            debug!(authority = %lookup.authority, hits = resp.hits.len(), "pass0 identifier match");
            return Ok(tag(resp.hits, Pass::External0));
        }
    }

    for pass in [Pass::External1, Pass::External2] {
        let q = external_relaxed(cq, pass, &opts)?;
        let resp = gateway.search(&lookup.index, &q).await?;
        if !resp.hits.is_empty() {
            debug!(
                authority = %lookup.authority,
                pass = pass.tag(),
                hits = resp.hits.len(),
                "relaxed pass matched"
            );
            return Ok(tag(resp.hits, pass));
        }
    }

    Ok(Vec::new())
}

fn tag(mut hits: Vec<SearchHit>, pass: Pass) -> Vec<SearchHit> {
    for h in &mut hits {
        h.pass = pass;
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryGateway;
    use serde_json::json;

    fn lookup() -> ExternalLookup {
        ExternalLookup {
            index: "combined".to_string(),
            authority: "wd".to_string(),
            exclude_contributor: None,
        }
    }

    fn cq() -> CandidateQuery {
        CandidateQuery {
            variants: vec!["Abydos".to_string()],
            placetypes: vec![],
            countries: vec!["EG".to_string()],
            fclasses: vec!["S".to_string()],
            geom_hull: None,
            area_hull: None,
            links: vec!["wd:Q336422".to_string()],
        }
    }

    #[tokio::test]
    async fn pass0_short_circuits_later_passes() {
        let gw = MemoryGateway::new();
        gw.insert(
            "combined",
            "d1",
            json!({"links": ["wd:Q336422"], "title": "Abydos", "ccodes": ["EG"]}),
        );

        let hits = lookup_external(&gw, &cq(), &lookup()).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].pass, Pass::External0);
        // only the identifier query was issued
        assert_eq!(gw.query_count("combined"), 1);
    }

    #[tokio::test]
    async fn cascades_to_pass1_on_empty_pass0() {
        let gw = MemoryGateway::new();
        gw.insert(
            "combined",
            "d2",
            json!({"title": ["Abydos"], "ccodes": ["EG"], "links": []}),
        );

        let hits = lookup_external(&gw, &cq(), &lookup()).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].pass, Pass::External1);
        assert_eq!(gw.query_count("combined"), 2);
    }

    #[tokio::test]
    async fn third_query_issued_is_the_fclass_pass() {
        let gw = MemoryGateway::new();
        let _ = lookup_external(&gw, &cq(), &lookup()).await.unwrap();
        let recorded = gw.recorded_queries();
        assert_eq!(recorded.len(), 3);
        assert_eq!(
            recorded[2].1["query"]["bool"]["filter"][0]["terms"]["fclasses"][0],
            "S"
        );
    }

    #[tokio::test]
    async fn empty_everywhere_returns_no_hits_after_three_passes() {
        let gw = MemoryGateway::new();
        let hits = lookup_external(&gw, &cq(), &lookup()).await.unwrap();
        assert!(hits.is_empty());
        assert_eq!(gw.query_count("combined"), 3);
    }
}
