//! Merged-index lookup: identifier pass, a single transitive identifier
//! hop, then the always-run name pass, accumulating hits deduplicated by
//! index document id.

use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use crate::error::AlignError;
use crate::index::query::{merged_ids, merged_name};
use crate::index::SearchIndexGateway;
use crate::models::{CandidateQuery, MissedMatch, Pass, Place, SearchHit};

/// Outcome of one merged-index lookup.
#[derive(Debug)]
pub enum MergedOutcome {
    /// Zero hits across every pass; the place is a candidate for seeding.
    Missed(MissedMatch),
    /// At least one hit; candidates go to clustering and human review.
    Matched(Vec<SearchHit>),
}

/// Run the merged-index passes for one place.
///
/// Pass 0a matches any already-linked external id. Pass 0b issues
/// exactly one additional identifier query using the *new* external ids
/// surfaced by 0a's hits — one hop only, catching transitively linked
/// concordances. Pass 1 always runs, regardless of the pass-0 outcome.
/// A hit already captured is never re-added.
pub async fn lookup_merged(
    gateway: &dyn SearchIndexGateway,
    cq: &CandidateQuery,
    index: &str,
    place: &Place,
) -> Result<MergedOutcome, AlignError> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut hits: Vec<SearchHit> = Vec::new();
    let absorb = |mut batch: Vec<SearchHit>, pass: Pass, seen: &mut HashSet<String>,
                      hits: &mut Vec<SearchHit>| {
        for hit in batch.drain(..) {
            if seen.insert(hit.id.clone()) {
                let mut h = hit;
                h.pass = pass;
                hits.push(h);
            }
        }
    };

    if !cq.links.is_empty() {
        let resp = gateway.search(index, &merged_ids(&cq.links)).await?;
        absorb(resp.hits, Pass::Merged0a, &mut seen, &mut hits);

        // One extra hop: new ids surfaced by 0a's hit documents.
        let new_ids = transitive_ids(&hits, &cq.links);
        if !new_ids.is_empty() {
            let resp = gateway.search(index, &merged_ids(&new_ids)).await?;
            absorb(resp.hits, Pass::Merged0b, &mut seen, &mut hits);
        }
    }

    let resp = gateway.search(index, &merged_name(cq)).await?;
    absorb(resp.hits, Pass::Merged1, &mut seen, &mut hits);

    if hits.is_empty() {
        debug!(place_id = place.id, title = %place.title, "no merged-index match");
        Ok(MergedOutcome::Missed(MissedMatch {
            place_id: place.id,
            title: place.title.clone(),
        }))
    } else {
        Ok(MergedOutcome::Matched(hits))
    }
}

/// External ids present on the given hits' documents but not already on
/// the place itself.
fn transitive_ids(hits: &[SearchHit], known: &[String]) -> Vec<String> {
    let known: HashSet<&str> = known.iter().map(String::as_str).collect();
    let mut out = Vec::new();
    for hit in hits {
        if let Some(links) = hit.source.get("links").and_then(Value::as_array) {
            for link in links.iter().filter_map(Value::as_str) {
                if !known.contains(link) && !out.iter().any(|o: &String| o == link) {
                    out.push(link.to_string());
                }
            }
        }
    }
    out
}
