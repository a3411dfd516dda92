//! Parent/child cluster aggregation for the merged-index context, and
//! promotion of unmatched places as new seed parents.
//!
//! Every merged-index hit carries a relation role; parents list their own
//! children's document ids. A child attaches to a parent only when that
//! parent's own list names it — not merely by being present in the same
//! result batch — so a child listed by two parents contributes to both.

use std::collections::HashMap;

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::AlignError;
use crate::index::{IdAllocator, SearchIndexGateway};
use crate::models::{
    CandidateQuery, ClusterCandidate, HitRecord, HitRelation, Place, SearchHit, SourceProfile,
};

/// Aggregate a merged-index result batch into one candidate per parent.
///
/// `records` holds the normalized form of each hit, keyed by index
/// document id; hits that failed normalization are simply absent and
/// contribute nothing.
pub fn cluster_hits(hits: &[SearchHit], records: &HashMap<String, HitRecord>) -> Vec<ClusterCandidate> {
    let children_by_id: HashMap<&str, &SearchHit> = hits
        .iter()
        .filter(|h| matches!(h.relation(), HitRelation::Child { .. }))
        .map(|h| (h.id.as_str(), h))
        .collect();

    let mut clusters = Vec::new();
    for parent in hits {
        let child_ids = match parent.relation() {
            HitRelation::Parent { children } => children,
            HitRelation::Child { .. } => continue,
        };
        let Some(parent_record) = records.get(&parent.id) else {
            continue;
        };

        let mut candidate = ClusterCandidate {
            merged_id: parent.id.clone(),
            score: parent.score,
            titles: vec![parent_record.title.clone()],
            countries: parent_record.countries.clone(),
            geometries: parent_record.geometries.clone(),
            links: parent_record.links.clone(),
            sources: vec![profile(parent, parent_record)],
            passes: vec![parent.pass.coarse().to_string()],
        };

        // Only the children this parent itself lists, in list order.
        for child_id in &child_ids {
            let Some(child_hit) = children_by_id.get(child_id.as_str()) else {
                continue;
            };
            let Some(child_record) = records.get(child_id.as_str()) else {
                continue;
            };
            candidate.score += child_hit.score;
            push_unique(&mut candidate.titles, &child_record.title);
            for c in &child_record.countries {
                push_unique(&mut candidate.countries, c);
            }
            for g in &child_record.geometries {
                if !candidate
                    .geometries
                    .iter()
                    .any(|existing| existing.geom == g.geom)
                {
                    candidate.geometries.push(g.clone());
                }
            }
            for l in &child_record.links {
                push_unique(&mut candidate.links, l);
            }
            push_unique(&mut candidate.passes, child_hit.pass.coarse());
            candidate.sources.push(profile(child_hit, child_record));
        }

        debug!(
            merged_id = %candidate.merged_id,
            sources = candidate.sources.len(),
            score = candidate.score,
            "clustered parent"
        );
        clusters.push(candidate);
    }
    clusters
}

fn profile(hit: &SearchHit, record: &HitRecord) -> SourceProfile {
    SourceProfile {
        record_id: record.record_id.clone(),
        dataset: record.dataset.clone(),
        pass: hit.pass.coarse().to_string(),
        variants: record.variants.clone(),
        types: record.types.clone(),
        when: record.when.clone(),
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// Promote a place that matched nothing in the merged index: index a new
/// seed parent document under a freshly allocated sequential numeric id.
/// Bypasses human review entirely; returns the allocated id so the
/// caller can mark the place indexed.
pub async fn promote_unmatched(
    gateway: &dyn SearchIndexGateway,
    allocator: &dyn IdAllocator,
    index: &str,
    place: &Place,
    cq: &CandidateQuery,
) -> Result<i64, AlignError> {
    let whg_id = allocator.next_id().await?;
    let doc = seed_document(whg_id, place, cq);
    gateway.index_document(index, &whg_id.to_string(), &doc).await?;
    info!(place_id = place.id, %whg_id, "seeded new parent for unmatched place");
    Ok(whg_id)
}

/// Build the seed parent document for a newly promoted place.
pub fn seed_document(whg_id: i64, place: &Place, cq: &CandidateQuery) -> Value {
    json!({
        "whg_id": whg_id,
        "place_id": place.id,
        "title": place.title,
        "dataset": place.dataset,
        "src_id": place.src_id,
        "names": place.names.iter().map(|n| json!({
            "toponym": n.toponym,
            "lang": n.lang,
        })).collect::<Vec<_>>(),
        "searchy": cq.variants,
        "types": place.types.iter().map(|t| json!({
            "identifier": t.identifier,
            "label": t.label,
        })).collect::<Vec<_>>(),
        "fclasses": place.fclasses,
        "ccodes": place.ccodes,
        "links": cq.links,
        "geom": cq.geom_hull,
        "timespans": place.minmax.map(|mm| vec![vec![mm[0], mm[1]]]),
        "relation": {"name": "parent"},
        "children": [],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Pass;
    use serde_json::json;

    fn parent(id: &str, score: f64, children: Vec<&str>) -> SearchHit {
        SearchHit {
            id: id.to_string(),
            score,
            source: json!({
                "relation": {"name": "parent"},
                "children": children,
            }),
            pass: Pass::Merged0a,
        }
    }

    fn child(id: &str, score: f64, parent: &str) -> SearchHit {
        SearchHit {
            id: id.to_string(),
            score,
            source: json!({"relation": {"name": "child", "parent": parent}}),
            pass: Pass::Merged1,
        }
    }

    fn record(id: &str, title: &str) -> (String, HitRecord) {
        (
            id.to_string(),
            HitRecord {
                record_id: id.to_string(),
                title: title.to_string(),
                dataset: "demo".to_string(),
                score: 0.0,
                pass: "pass1".to_string(),
                variants: vec![title.to_string()],
                types: vec![],
                countries: vec![],
                parents: vec![],
                geometries: vec![],
                links: vec![],
                when: vec![],
            },
        )
    }

    #[test]
    fn aggregate_score_is_parent_plus_attached_children() {
        let hits = vec![
            parent("p1", 5.0, vec!["c1", "c2"]),
            child("c1", 2.0, "p1"),
            child("c2", 3.0, "p1"),
        ];
        let records: HashMap<_, _> =
            [record("p1", "Abydos"), record("c1", "Abdju"), record("c2", "Abidos")].into();
        let clusters = cluster_hits(&hits, &records);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].score, 10.0);
        assert_eq!(clusters[0].titles, vec!["Abydos", "Abdju", "Abidos"]);
        assert_eq!(clusters[0].sources.len(), 3);
    }

    #[test]
    fn zero_attached_children_means_parent_score() {
        let hits = vec![parent("p1", 5.0, vec![])];
        let records: HashMap<_, _> = [record("p1", "Abydos")].into();
        let clusters = cluster_hits(&hits, &records);
        assert_eq!(clusters[0].score, 5.0);
        assert_eq!(clusters[0].sources.len(), 1);
    }

    #[test]
    fn children_attach_only_when_listed_by_that_parent() {
        // c2 is present in the batch but p1 does not list it
        let hits = vec![
            parent("p1", 5.0, vec!["c1"]),
            child("c1", 2.0, "p1"),
            child("c2", 3.0, "p1"),
        ];
        let records: HashMap<_, _> =
            [record("p1", "Abydos"), record("c1", "Abdju"), record("c2", "Abidos")].into();
        let clusters = cluster_hits(&hits, &records);
        assert_eq!(clusters[0].score, 7.0);
        assert_eq!(clusters[0].sources.len(), 2);
    }

    #[test]
    fn a_child_listed_by_two_parents_joins_both() {
        let hits = vec![
            parent("p1", 5.0, vec!["c1"]),
            parent("p2", 4.0, vec!["c1"]),
            child("c1", 2.0, "p1"),
        ];
        let records: HashMap<_, _> =
            [record("p1", "Abydos"), record("p2", "Abydus"), record("c1", "Abdju")].into();
        let clusters = cluster_hits(&hits, &records);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].score, 7.0);
        assert_eq!(clusters[1].score, 6.0);
    }

    #[test]
    fn passes_are_coarse_and_deduplicated() {
        let hits = vec![parent("p1", 5.0, vec!["c1"]), child("c1", 2.0, "p1")];
        let records: HashMap<_, _> = [record("p1", "Abydos"), record("c1", "Abdju")].into();
        let clusters = cluster_hits(&hits, &records);
        // parent came from pass0a (coarse pass0), child from pass1
        assert_eq!(clusters[0].passes, vec!["pass0", "pass1"]);
        assert_eq!(clusters[0].sources[0].pass, "pass0");
    }

    #[test]
    fn unnormalizable_parent_is_skipped() {
        let hits = vec![parent("p1", 5.0, vec![])];
        let records: HashMap<String, HitRecord> = HashMap::new();
        assert!(cluster_hits(&hits, &records).is_empty());
    }

    #[tokio::test]
    async fn promotion_allocates_and_indexes_seed() {
        use crate::index::{AtomicSeedAllocator, MemoryGateway};
        use crate::models::{Place, PlaceName};

        let gw = MemoryGateway::new();
        let alloc = AtomicSeedAllocator::starting_at(9000001);
        let place = Place {
            id: 42,
            title: "Abydos".to_string(),
            src_id: "a1".to_string(),
            dataset: "demo".to_string(),
            ccodes: vec!["EG".to_string()],
            fclasses: vec!["S".to_string()],
            names: vec![PlaceName { toponym: "Abdju".to_string(), lang: None }],
            types: vec![],
            links: vec![],
            geoms: vec![],
            minmax: Some([-3000, -30]),
        };
        let cq = CandidateQuery::from_place(&place, None);
        let id = promote_unmatched(&gw, &alloc, "places", &place, &cq).await.unwrap();
        assert_eq!(id, 9000001);
        let doc = gw.get("places", "9000001").unwrap();
        assert_eq!(doc["relation"]["name"], "parent");
        assert_eq!(doc["place_id"], 42);
        assert_eq!(doc["timespans"][0][0], -3000);
    }
}
